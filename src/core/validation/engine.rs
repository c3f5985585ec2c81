//! Per-record rule evaluation

use super::batch::FieldError;
use super::rule::{Rule, StorePredicate, is_blank};
use crate::core::error::StoreError;
use crate::core::field::{FieldKind, FieldValue};
use crate::core::repository::Lookup;
use serde_json::Value;

/// Ordered field → rules configuration for one operation on one resource
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    fields: Vec<(&'static str, Vec<Rule>)>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field with its rules, in evaluation order
    pub fn field(mut self, name: &'static str, rules: Vec<Rule>) -> Self {
        self.fields.push((name, rules));
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &[Rule])> {
        self.fields.iter().map(|(name, rules)| (*name, rules.as_slice()))
    }

    pub fn knows(&self, name: &str) -> bool {
        self.fields.iter().any(|(n, _)| *n == name)
    }

    /// The kind declared by a field's `type` rule
    pub fn kind_of(&self, name: &str) -> Option<FieldKind> {
        self.fields
            .iter()
            .find(|(n, _)| *n == name)
            .and_then(|(_, rules)| declared_kind(rules))
    }
}

fn declared_kind(rules: &[Rule]) -> Option<FieldKind> {
    rules.iter().find_map(|r| match r {
        Rule::Type(kind) => Some(*kind),
        _ => None,
    })
}

/// Evaluates a [`RuleSet`] against one record.
///
/// Every configured field is evaluated; a failure on one field never hides
/// the errors of another. Within a field, `required` comes first and an
/// absent optional field skips its remaining rules. Static rules run in
/// declared order, predicates last and only if the field's static rules all
/// passed, so the store is only consulted for well-formed values.
///
/// Uniqueness predicates that exclude the record's own row are skipped when
/// the id field failed its static rules, since there is no row to exclude.
pub struct ValidationEngine<'a, L: Lookup + ?Sized> {
    lookup: &'a L,
}

impl<'a, L: Lookup + ?Sized> ValidationEngine<'a, L> {
    pub fn new(lookup: &'a L) -> Self {
        Self { lookup }
    }

    pub async fn validate(
        &self,
        rules: &RuleSet,
        record: &Value,
    ) -> Result<Vec<FieldError>, StoreError> {
        let Some(object) = record.as_object() else {
            return Ok(vec![FieldError::new(
                "record",
                "type",
                "record must be a JSON object",
            )]);
        };

        let mut fields: Vec<(&'static str, Vec<FieldError>)> = Vec::new();
        let mut pending = Vec::new();

        for (field, field_rules) in rules.fields() {
            let raw = object.get(field).unwrap_or(&Value::Null);
            let required = field_rules.iter().any(|r| matches!(r, Rule::Required));
            let mut errors = Vec::new();

            // Whitespace only counts as missing for required fields
            if raw.is_null() || (required && is_blank(raw)) {
                if required {
                    errors.push(FieldError::new(
                        field,
                        Rule::Required.name(),
                        format!("'{}' is required", field),
                    ));
                }
                fields.push((field, errors));
                continue;
            }

            let kind = declared_kind(field_rules);
            let value = kind
                .and_then(|k| k.coerce(raw))
                .unwrap_or_else(|| FieldValue::from_json(raw));

            for rule in field_rules.iter().filter(|r| !r.is_predicate()) {
                if let Err(message) = rule.check(field, raw, &value) {
                    errors.push(FieldError::new(field, rule.name(), message));
                }
            }
            if errors.is_empty() {
                pending.push((fields.len(), field_rules, value));
            }
            fields.push((field, errors));
        }

        let failed: Vec<&str> = fields
            .iter()
            .filter(|(_, errors)| !errors.is_empty())
            .map(|(field, _)| *field)
            .collect();

        for (slot, field_rules, value) in pending {
            let field = fields[slot].0;
            for rule in field_rules {
                let Rule::Predicate(predicate) = rule else {
                    continue;
                };
                if let StorePredicate::Unique { table, column } = predicate {
                    if *column != table.id_column && failed.contains(&table.id_column) {
                        continue;
                    }
                }
                if let Some(message) = self
                    .check_predicate(rules, predicate, field, &value, record)
                    .await?
                {
                    fields[slot]
                        .1
                        .push(FieldError::new(field, rule.name(), message));
                }
            }
        }

        let mut errors: Vec<FieldError> = fields
            .into_iter()
            .flat_map(|(_, errors)| errors)
            .collect();

        for key in object.keys().filter(|k| !rules.knows(k)) {
            errors.push(FieldError::new(
                key,
                "unknown_field",
                format!("'{}' is not a recognized field", key),
            ));
        }

        Ok(errors)
    }

    async fn check_predicate(
        &self,
        rules: &RuleSet,
        predicate: &StorePredicate,
        field: &str,
        value: &FieldValue,
        record: &Value,
    ) -> Result<Option<String>, StoreError> {
        match predicate {
            StorePredicate::Exists(table) => {
                let Some(id) = value.as_integer() else {
                    return Ok(None);
                };
                if self.lookup.exists_by_id(*table, id).await? {
                    Ok(None)
                } else {
                    Ok(Some(format!(
                        "'{}' refers to {} id {}, which has no matching record",
                        field, table.table, id
                    )))
                }
            }
            StorePredicate::Unique { table, column } => {
                // A record never collides with its own stored row
                let except = if *column == table.id_column {
                    None
                } else {
                    record
                        .get(table.id_column)
                        .and_then(|v| FieldKind::Integer.coerce(v))
                        .and_then(|v| v.as_integer())
                };
                if self
                    .lookup
                    .exists_unique(*table, column, value, except)
                    .await?
                {
                    Ok(Some(format!(
                        "'{}' must be unique; {} is already in use",
                        field,
                        value.to_json()
                    )))
                } else {
                    Ok(None)
                }
            }
            StorePredicate::DiffersFrom(other) => {
                let other_raw = record.get(*other).unwrap_or(&Value::Null);
                let other_value = rules
                    .kind_of(other)
                    .and_then(|k| k.coerce(other_raw))
                    .unwrap_or_else(|| FieldValue::from_json(other_raw));
                if value.collates_eq(&other_value) {
                    Ok(Some(format!("'{}' must differ from '{}'", field, other)))
                } else {
                    Ok(None)
                }
            }
        }
    }
}
