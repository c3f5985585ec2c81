//! The operation result envelope
//!
//! Every engine operation ends in an [`OperationResult`]: success with data,
//! or failure with a message and, for batch failures, the per-record errors.
//! Expected failures are values, not `Err`s.

use crate::core::error::{EngineError, FailureKind, StoreError};
use crate::core::validation::{BatchOutcome, FieldError};
use serde::Serialize;

/// `{"success", "message", "data", "errors"}`
#[derive(Debug, Clone, Serialize)]
pub struct OperationResult<T> {
    success: bool,
    message: String,
    data: Option<T>,
    errors: Option<BatchOutcome>,
    #[serde(skip)]
    kind: Option<FailureKind>,
}

impl<T> OperationResult<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            errors: None,
            kind: None,
        }
    }

    pub fn failure(
        kind: FailureKind,
        message: impl Into<String>,
        errors: Option<BatchOutcome>,
    ) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            errors,
            kind: Some(kind),
        }
    }

    /// Turn an engine result into an envelope.
    ///
    /// Expected failures become failed results; a `NotFound` or `Constraint`
    /// raised by write `index` of a batch of `records` is reported against
    /// that index. Unexpected storage failures are handed back as `Err`.
    pub fn settle(
        result: Result<T, EngineError>,
        message: impl Into<String>,
        records: usize,
    ) -> Result<Self, StoreError> {
        let err = match result {
            Ok(data) => return Ok(Self::success(message, data)),
            Err(err) => err,
        };

        let Some(kind) = err.failure_kind() else {
            return match err {
                EngineError::Store(e) => Err(e),
                other => Err(StoreError::Backend(other.to_string())),
            };
        };

        let text = err.to_string();
        let errors = match err {
            EngineError::Validation { outcome, .. } => Some(outcome),
            EngineError::NotFound {
                resource,
                index: Some(index),
                ..
            } => Some(BatchOutcome::single(
                records,
                index,
                FieldError::new(resource, "exists", text.clone()),
            )),
            EngineError::Constraint {
                resource,
                index: Some(index),
                ..
            } => Some(BatchOutcome::single(
                records,
                index,
                FieldError::new(resource, "constraint", text.clone()),
            )),
            _ => None,
        };

        Ok(Self::failure(kind, text, errors))
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn into_data(self) -> Option<T> {
        self.data
    }

    pub fn errors(&self) -> Option<&BatchOutcome> {
        self.errors.as_ref()
    }

    /// Failure category, `None` on success
    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.kind
    }
}
