//! Batch validation with all-or-nothing semantics

use super::engine::{RuleSet, ValidationEngine};
use crate::core::error::EngineError;
use crate::core::repository::Lookup;
use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};
use serde_json::Value;

/// One failed rule on one field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub rule: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, rule: &'static str, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            rule,
            message: message.into(),
        }
    }
}

/// Errors of the record at `index`; empty means valid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordValidation {
    pub index: usize,
    pub errors: Vec<FieldError>,
}

impl RecordValidation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validation results for every record of a batch, in input order
///
/// Serializes as `{"<index>": [FieldError, ...], ...}` with an entry for every
/// record, valid ones included.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchOutcome {
    records: Vec<RecordValidation>,
}

impl BatchOutcome {
    pub fn new(records: Vec<RecordValidation>) -> Self {
        Self { records }
    }

    /// An outcome for `len` records where only `index` failed
    pub fn single(len: usize, index: usize, error: FieldError) -> Self {
        let len = len.max(index + 1);
        Self {
            records: (0..len)
                .map(|i| RecordValidation {
                    index: i,
                    errors: if i == index {
                        vec![error.clone()]
                    } else {
                        Vec::new()
                    },
                })
                .collect(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.records.iter().all(RecordValidation::is_valid)
    }

    pub fn records(&self) -> &[RecordValidation] {
        &self.records
    }

    pub fn get(&self, index: usize) -> Option<&RecordValidation> {
        self.records.get(index)
    }

    pub fn invalid_count(&self) -> usize {
        self.records.iter().filter(|r| !r.is_valid()).count()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Serialize for BatchOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.records.len()))?;
        for record in &self.records {
            map.serialize_entry(&record.index.to_string(), &record.errors)?;
        }
        map.end()
    }
}

/// Runs the [`ValidationEngine`] over a whole batch.
///
/// Records are validated independently, one after another. Uniqueness is
/// checked against committed store state only, never against sibling
/// records of the same batch.
pub struct BatchValidator<'a, L: Lookup + ?Sized> {
    engine: ValidationEngine<'a, L>,
}

impl<'a, L: Lookup + ?Sized> BatchValidator<'a, L> {
    pub fn new(lookup: &'a L) -> Self {
        Self {
            engine: ValidationEngine::new(lookup),
        }
    }

    /// Validate every record and return the full outcome
    pub async fn evaluate(
        &self,
        rules: &RuleSet,
        records: &[Value],
    ) -> Result<BatchOutcome, EngineError> {
        if records.is_empty() {
            return Err(EngineError::invalid_input("records", "no records provided"));
        }

        let mut outcome = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            let errors = self.engine.validate(rules, record).await?;
            outcome.push(RecordValidation { index, errors });
        }
        Ok(BatchOutcome::new(outcome))
    }

    /// Validate every record and fail unless all of them are valid
    pub async fn enforce(&self, rules: &RuleSet, records: &[Value]) -> Result<(), EngineError> {
        let outcome = self.evaluate(rules, records).await?;
        if outcome.is_valid() {
            return Ok(());
        }
        Err(EngineError::Validation {
            message: format!(
                "Validation failed for {} of {} records; nothing was written",
                outcome.invalid_count(),
                outcome.len()
            ),
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::StoreError;
    use crate::core::field::{FieldKind, FieldValue};
    use crate::core::resource::TableRef;
    use crate::core::validation::Rule;
    use async_trait::async_trait;
    use serde_json::json;

    struct EmptyStore;

    #[async_trait]
    impl Lookup for EmptyStore {
        async fn exists_by_id(&self, _: TableRef, _: i64) -> Result<bool, StoreError> {
            Ok(false)
        }

        async fn exists_unique(
            &self,
            _: TableRef,
            _: &'static str,
            _: &FieldValue,
            _: Option<i64>,
        ) -> Result<bool, StoreError> {
            Ok(false)
        }
    }

    fn rules() -> RuleSet {
        RuleSet::new().field(
            "team_name",
            vec![Rule::Required, Rule::Type(FieldKind::Text)],
        )
    }

    #[tokio::test]
    async fn test_empty_batch_is_invalid_input() {
        let err = BatchValidator::new(&EmptyStore)
            .evaluate(&rules(), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput { .. }));
        assert!(err.to_string().contains("no records provided"));
    }

    #[tokio::test]
    async fn test_outcome_keeps_every_index() {
        let records = vec![
            json!({"team_name": "Leafs"}),
            json!({}),
            json!({"team_name": "Habs"}),
        ];
        let outcome = BatchValidator::new(&EmptyStore)
            .evaluate(&rules(), &records)
            .await
            .unwrap();
        assert!(!outcome.is_valid());
        assert!(outcome.get(0).unwrap().is_valid());
        assert!(!outcome.get(1).unwrap().is_valid());
        assert!(outcome.get(2).unwrap().is_valid());

        let body = serde_json::to_value(&outcome).unwrap();
        assert_eq!(body["0"], json!([]));
        assert_eq!(body["1"][0]["rule"], "required");
    }

    #[tokio::test]
    async fn test_enforce_reports_invalid_count() {
        let records = vec![json!({}), json!({"team_name": 3})];
        let err = BatchValidator::new(&EmptyStore)
            .enforce(&rules(), &records)
            .await
            .unwrap_err();
        match err {
            EngineError::Validation { message, outcome } => {
                assert!(message.contains("2 of 2"));
                assert_eq!(outcome.invalid_count(), 2);
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_single_failure_outcome() {
        let outcome = BatchOutcome::single(3, 1, FieldError::new("game_id", "exists", "gone"));
        assert_eq!(outcome.len(), 3);
        assert_eq!(outcome.invalid_count(), 1);
        assert!(!outcome.get(1).unwrap().is_valid());
    }
}
