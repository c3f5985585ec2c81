//! Field values and column kinds

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::OnceLock;

/// A polymorphic column value, used both for bound query parameters and for
/// comparing rows in memory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    String(String),
    Integer(i64),
    Float(f64),
    Date(NaiveDate),
    Null,
}

impl FieldValue {
    /// Get the value as a string if possible
    pub fn as_string(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the value as an integer if possible
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Read a JSON value without a declared kind; booleans and composites
    /// have no column representation and read as NULL
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::String(s) => FieldValue::String(s.clone()),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Integer(i),
                None => n.as_f64().map(FieldValue::Float).unwrap_or(FieldValue::Null),
            },
            _ => FieldValue::Null,
        }
    }

    /// Convert back into a JSON value
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::String(s) => Value::String(s.clone()),
            FieldValue::Integer(i) => Value::from(*i),
            FieldValue::Float(f) => Value::from(*f),
            FieldValue::Date(d) => Value::String(d.format(DATE_FORMAT).to_string()),
            FieldValue::Null => Value::Null,
        }
    }

    /// Compare two values the way the relational stores do with their
    /// default collation: text is compared ASCII case-insensitively, numbers
    /// numerically, dates chronologically. Mismatched kinds are unordered.
    pub fn collate(&self, other: &FieldValue) -> Option<Ordering> {
        match (self, other) {
            (FieldValue::String(a), FieldValue::String(b)) => {
                Some(a.to_ascii_lowercase().cmp(&b.to_ascii_lowercase()))
            }
            (FieldValue::Integer(a), FieldValue::Integer(b)) => Some(a.cmp(b)),
            (FieldValue::Float(a), FieldValue::Float(b)) => a.partial_cmp(b),
            (FieldValue::Integer(a), FieldValue::Float(b)) => (*a as f64).partial_cmp(b),
            (FieldValue::Float(a), FieldValue::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (FieldValue::Date(a), FieldValue::Date(b)) => Some(a.cmp(b)),
            (FieldValue::Null, FieldValue::Null) => Some(Ordering::Equal),
            // NULL sorts first, as in MySQL and SQLite
            (FieldValue::Null, _) => Some(Ordering::Less),
            (_, FieldValue::Null) => Some(Ordering::Greater),
            _ => None,
        }
    }

    /// Collated equality
    pub fn collates_eq(&self, other: &FieldValue) -> bool {
        !self.is_null() && self.collate(other) == Some(Ordering::Equal)
    }

    /// Anchored, case-insensitive prefix match (mirrors `LIKE 'x%'`)
    pub fn starts_with(&self, prefix: &str) -> bool {
        match self {
            FieldValue::String(s) => s
                .to_ascii_lowercase()
                .starts_with(&prefix.to_ascii_lowercase()),
            _ => false,
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

/// Calendar date format accepted on the wire
pub const DATE_FORMAT: &str = "%Y-%m-%d";

fn date_shape() -> &'static Regex {
    static DATE_REGEX: OnceLock<Regex> = OnceLock::new();
    DATE_REGEX.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap())
}

fn integer_shape() -> &'static Regex {
    static INTEGER_REGEX: OnceLock<Regex> = OnceLock::new();
    INTEGER_REGEX.get_or_init(|| Regex::new(r"^-?\d+$").unwrap())
}

/// Storage kind of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Float,
    Text,
    Date,
}

impl FieldKind {
    /// Human name used in validation messages
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Integer => "integer",
            FieldKind::Float => "number",
            FieldKind::Text => "string",
            FieldKind::Date => "date (YYYY-MM-DD)",
        }
    }

    /// Parse a raw query-string value
    pub fn parse_str(&self, raw: &str) -> Option<FieldValue> {
        match self {
            FieldKind::Integer => {
                if !integer_shape().is_match(raw) {
                    return None;
                }
                raw.parse().ok().map(FieldValue::Integer)
            }
            FieldKind::Float => raw
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(FieldValue::Float),
            FieldKind::Text => Some(FieldValue::String(raw.to_string())),
            FieldKind::Date => {
                if !date_shape().is_match(raw) {
                    return None;
                }
                NaiveDate::parse_from_str(raw, DATE_FORMAT)
                    .ok()
                    .map(FieldValue::Date)
            }
        }
    }

    /// Coerce a JSON record value into this kind.
    ///
    /// Integers also accept integral numeric strings (`"12"`), which is what
    /// form-encoded and hand-written payloads usually carry.
    pub fn coerce(&self, value: &Value) -> Option<FieldValue> {
        match (self, value) {
            (_, Value::Null) => Some(FieldValue::Null),
            (FieldKind::Integer, Value::Number(n)) => n.as_i64().map(FieldValue::Integer),
            (FieldKind::Float, Value::Number(n)) => n.as_f64().map(FieldValue::Float),
            (FieldKind::Text, Value::String(s)) => Some(FieldValue::String(s.clone())),
            (FieldKind::Integer | FieldKind::Float | FieldKind::Date, Value::String(s)) => {
                self.parse_str(s)
            }
            _ => None,
        }
    }
}
