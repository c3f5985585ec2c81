//! Validation system
//!
//! Declarative per-field rules evaluated record by record, aggregated over a
//! batch. A batch is written only if every record in it is valid.

pub mod batch;
pub mod engine;
pub mod rule;

pub use batch::{BatchOutcome, BatchValidator, FieldError, RecordValidation};
pub use engine::{RuleSet, ValidationEngine};
pub use rule::{Rule, StorePredicate};
