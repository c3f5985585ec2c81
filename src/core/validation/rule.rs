//! Validation rules
//!
//! A [`Rule`] is one named check on one field. Static rules look only at the
//! value; [`StorePredicate`] rules may also look at the rest of the record or
//! ask the store through [`Lookup`](crate::core::repository::Lookup).
//!
//! Rules that do not apply to a value's type pass: a `min` on a string is the
//! `type` rule's problem, not `min`'s.

use crate::core::field::{FieldKind, FieldValue};
use crate::core::resource::TableRef;
use regex::Regex;
use serde_json::Value;

/// Checks that may need the full record or the store
#[derive(Debug, Clone)]
pub enum StorePredicate {
    /// The value is the id of an existing row of `table`
    Exists(TableRef),
    /// No other row of `table` holds the value in `column`
    Unique {
        table: TableRef,
        column: &'static str,
    },
    /// The value differs from another field of the same record
    DiffersFrom(&'static str),
}

/// One named validation check
#[derive(Debug, Clone)]
pub enum Rule {
    Required,
    Type(FieldKind),
    Min(f64),
    Max(f64),
    Regex(Regex),
    Enum(&'static [&'static str]),
    LengthBetween(usize, usize),
    Predicate(StorePredicate),
}

impl Rule {
    /// Build a regex rule from a pattern known at compile time
    ///
    /// # Panics
    ///
    /// Panics if the pattern does not compile.
    pub fn pattern(pattern: &str) -> Self {
        Rule::Regex(Regex::new(pattern).unwrap())
    }

    pub fn exists(table: TableRef) -> Self {
        Rule::Predicate(StorePredicate::Exists(table))
    }

    pub fn unique(table: TableRef, column: &'static str) -> Self {
        Rule::Predicate(StorePredicate::Unique { table, column })
    }

    pub fn differs_from(other: &'static str) -> Self {
        Rule::Predicate(StorePredicate::DiffersFrom(other))
    }

    /// Rule name reported in field errors
    pub fn name(&self) -> &'static str {
        match self {
            Rule::Required => "required",
            Rule::Type(_) => "type",
            Rule::Min(_) => "min",
            Rule::Max(_) => "max",
            Rule::Regex(_) => "regex",
            Rule::Enum(_) => "enum",
            Rule::LengthBetween(..) => "length_between",
            Rule::Predicate(StorePredicate::Exists(_)) => "exists",
            Rule::Predicate(StorePredicate::Unique { .. }) => "unique",
            Rule::Predicate(StorePredicate::DiffersFrom(_)) => "differs_from",
        }
    }

    pub fn is_predicate(&self) -> bool {
        matches!(self, Rule::Predicate(_))
    }

    /// Run a static rule against a present value.
    ///
    /// `raw` is the value as received, `value` the same value coerced to the
    /// field's declared kind when that succeeded. Predicate rules always pass
    /// here; the engine evaluates them separately.
    pub fn check(&self, field: &str, raw: &Value, value: &FieldValue) -> Result<(), String> {
        match self {
            Rule::Required => {
                if is_blank(raw) {
                    Err(format!("'{}' is required", field))
                } else {
                    Ok(())
                }
            }
            Rule::Type(kind) => match kind.coerce(raw) {
                Some(v) if !v.is_null() => Ok(()),
                _ => Err(format!("'{}' must be a {}", field, kind.name())),
            },
            Rule::Min(min) => match numeric(value) {
                Some(n) if n < *min => Err(format!("'{}' must be at least {}", field, min)),
                _ => Ok(()),
            },
            Rule::Max(max) => match numeric(value) {
                Some(n) if n > *max => Err(format!("'{}' must not exceed {}", field, max)),
                _ => Ok(()),
            },
            Rule::Regex(regex) => match raw.as_str() {
                Some(s) if !regex.is_match(s) => {
                    Err(format!("'{}' has an invalid format", field))
                }
                _ => Ok(()),
            },
            Rule::Enum(allowed) => match raw.as_str() {
                Some(s) if !allowed.contains(&s) => Err(format!(
                    "'{}' must be one of: {}",
                    field,
                    allowed.join(", ")
                )),
                _ => Ok(()),
            },
            Rule::LengthBetween(min, max) => match raw.as_str() {
                Some(s) => {
                    let len = s.chars().count();
                    if len < *min || len > *max {
                        Err(format!(
                            "'{}' must be between {} and {} characters long (currently {})",
                            field, min, max, len
                        ))
                    } else {
                        Ok(())
                    }
                }
                None => Ok(()),
            },
            Rule::Predicate(_) => Ok(()),
        }
    }
}

/// Missing, null, or a string with nothing but whitespace
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn numeric(value: &FieldValue) -> Option<f64> {
    match value {
        FieldValue::Integer(i) => Some(*i as f64),
        FieldValue::Float(f) => Some(*f),
        _ => None,
    }
}
