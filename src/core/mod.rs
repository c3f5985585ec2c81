//! Core module containing the query and validation engines
//!
//! - Read path: [`query`] parses raw parameters, [`query_builder`] turns them
//!   into SQL, [`paginator`] shapes the result.
//! - Write path: [`validation`] checks a batch against declarative rules
//!   before [`repository`] applies it in one transaction.
//! - [`service`] ties both paths to a store and returns an [`outcome`]
//!   envelope.

pub mod error;
pub mod field;
pub mod outcome;
pub mod paginator;
pub mod query;
pub mod query_builder;
pub mod repository;
pub mod resource;
pub mod service;
pub mod validation;

pub use error::{EngineError, FailureKind, StoreError};
pub use field::{FieldKind, FieldValue};
pub use outcome::OperationResult;
pub use paginator::{Nested, PageMeta, PageSpec, Paginated, Paginator};
pub use query::{
    FilterField, FilterSpec, Join, ListQuery, Predicate, QueryConfig, SortDirection, SortSpec,
};
pub use query_builder::QueryBuilder;
pub use repository::{Applied, Change, Lookup, Repository, Write};
pub use resource::{Column, ForeignKey, Resource, TableRef};
pub use service::ResourceService;
