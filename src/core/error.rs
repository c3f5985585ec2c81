//! Typed error handling for the data engine
//!
//! Two layers of errors live here:
//!
//! - [`StoreError`]: what a storage backend can report. Constraint and
//!   missing-row rejections are expected; backend and decode failures are not.
//! - [`EngineError`]: the engine taxonomy. Every variant except
//!   [`EngineError::Store`] is an *expected* condition that ends up as a
//!   failed [`OperationResult`](crate::core::outcome::OperationResult) rather
//!   than an `Err`.
//!
//! # Example
//!
//! ```rust,ignore
//! match service.delete(records).await? {
//!     result if result.is_success() => println!("{}", result.message()),
//!     result => match result.failure_kind() {
//!         Some(FailureKind::NotFound) => println!("nothing to delete"),
//!         _ => eprintln!("{}", result.message()),
//!     },
//! }
//! ```

use crate::core::validation::BatchOutcome;
use axum::http::StatusCode;
use std::fmt;
use thiserror::Error;

// =============================================================================
// Store Errors
// =============================================================================

/// Errors reported by a storage backend
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// A write in a batch targeted a row that does not exist
    #[error("No {table} record with id {id} exists")]
    NotFound {
        table: &'static str,
        id: i64,
        index: usize,
    },

    /// The store rejected a write (unique, foreign-key or check constraint)
    #[error("{table} write rejected by a store constraint: {message}")]
    Constraint {
        table: &'static str,
        message: String,
        index: usize,
    },

    /// A stored row could not be turned back into a record
    #[error("{table} row could not be decoded: {message}")]
    Corrupt {
        table: &'static str,
        message: String,
    },

    /// The backend failed (unreachable, lock poisoned, protocol error)
    #[error("store backend error: {0}")]
    Backend(String),
}

// =============================================================================
// Failure kinds
// =============================================================================

/// Category of an expected failure, used to pick a transport status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    InvalidInput,
    ValidationFailure,
    NotFound,
    ConstraintViolation,
}

impl FailureKind {
    /// Get the HTTP status code for this failure
    pub fn status_code(&self) -> StatusCode {
        match self {
            FailureKind::InvalidInput => StatusCode::BAD_REQUEST,
            FailureKind::ValidationFailure => StatusCode::UNPROCESSABLE_ENTITY,
            FailureKind::NotFound => StatusCode::NOT_FOUND,
            FailureKind::ConstraintViolation => StatusCode::CONFLICT,
        }
    }

    /// Get the error code for this failure
    pub fn error_code(&self) -> &'static str {
        match self {
            FailureKind::InvalidInput => "INVALID_INPUT",
            FailureKind::ValidationFailure => "VALIDATION_FAILED",
            FailureKind::NotFound => "NOT_FOUND",
            FailureKind::ConstraintViolation => "CONSTRAINT_VIOLATION",
        }
    }
}

// =============================================================================
// Engine Errors
// =============================================================================

/// The engine error taxonomy
#[derive(Debug)]
pub enum EngineError {
    /// Malformed or unknown query parameter, malformed pagination, empty batch
    InvalidInput { parameter: String, message: String },

    /// One or more rule violations across a batch; nothing was written
    Validation { message: String, outcome: BatchOutcome },

    /// The addressed row does not exist
    NotFound {
        resource: &'static str,
        id: i64,
        index: Option<usize>,
    },

    /// The store rejected a write that passed app-level validation
    Constraint {
        resource: &'static str,
        message: String,
        index: Option<usize>,
    },

    /// Unexpected storage failure
    Store(StoreError),
}

impl EngineError {
    /// Shorthand for [`EngineError::InvalidInput`]
    pub fn invalid_input(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::InvalidInput {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// The failure category, or `None` for unexpected storage failures
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            EngineError::InvalidInput { .. } => Some(FailureKind::InvalidInput),
            EngineError::Validation { .. } => Some(FailureKind::ValidationFailure),
            EngineError::NotFound { .. } => Some(FailureKind::NotFound),
            EngineError::Constraint { .. } => Some(FailureKind::ConstraintViolation),
            EngineError::Store(_) => None,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self.failure_kind() {
            Some(kind) => kind.error_code(),
            None => "STORAGE_ERROR",
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self.failure_kind() {
            Some(kind) => kind.status_code(),
            None => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::InvalidInput { parameter, message } => {
                write!(f, "Invalid '{}' parameter: {}", parameter, message)
            }
            EngineError::Validation { message, .. } => write!(f, "{}", message),
            EngineError::NotFound { resource, id, .. } => {
                write!(f, "No {} record with id {} exists", resource, id)
            }
            EngineError::Constraint {
                resource, message, ..
            } => {
                write!(f, "{} write conflicts with stored data: {}", resource, message)
            }
            EngineError::Store(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { table, id, index } => EngineError::NotFound {
                resource: table,
                id,
                index: Some(index),
            },
            StoreError::Constraint {
                table,
                message,
                index,
            } => EngineError::Constraint {
                resource: table,
                message,
                index: Some(index),
            },
            other => EngineError::Store(other),
        }
    }
}
