//! The `Resource` trait: what the engine needs to know about a table-backed record

use crate::core::error::StoreError;
use crate::core::field::{FieldKind, FieldValue};
use crate::core::query::QueryConfig;
use crate::core::validation::RuleSet;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// A table and its integer primary-key column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub table: &'static str,
    pub id_column: &'static str,
}

impl TableRef {
    pub const fn new(table: &'static str, id_column: &'static str) -> Self {
        Self { table, id_column }
    }
}

/// A stored column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: FieldKind,
    pub nullable: bool,
}

impl Column {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            nullable: false,
        }
    }

    pub const fn nullable(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            nullable: true,
        }
    }
}

/// `column` references the primary key of `references`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKey {
    pub column: &'static str,
    pub references: TableRef,
}

/// A typed record stored in one table
///
/// Implementors are plain serde structs; the id field is optional so that a
/// create payload may leave it to the store.
pub trait Resource: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const TABLE: TableRef;

    /// Singular display name, used in messages ("team", "game")
    const SINGULAR: &'static str;

    /// Every stored column, id column first
    fn columns() -> &'static [Column];

    fn unique_columns() -> &'static [&'static str] {
        &[]
    }

    fn foreign_keys() -> &'static [ForeignKey] {
        &[]
    }

    fn query_config() -> &'static QueryConfig;

    fn create_rules() -> &'static RuleSet;

    fn update_rules() -> &'static RuleSet;

    fn delete_rules() -> &'static RuleSet;

    fn id(&self) -> Option<i64>;

    fn set_id(&mut self, id: i64);

    fn column(name: &str) -> Option<&'static Column> {
        Self::columns().iter().find(|c| c.name == name)
    }
}

/// Column values of a record in column order, typed by column kind
pub fn column_values<R: Resource>(record: &R) -> Result<Vec<(Column, FieldValue)>, StoreError> {
    let json = serde_json::to_value(record).map_err(|e| StoreError::Corrupt {
        table: R::TABLE.table,
        message: format!("failed to serialize record: {}", e),
    })?;
    Ok(row_values::<R>(&json))
}

/// Column values of a stored JSON row; absent or mistyped columns read as NULL
pub fn row_values<R: Resource>(row: &Value) -> Vec<(Column, FieldValue)> {
    R::columns()
        .iter()
        .map(|column| {
            let value = row
                .get(column.name)
                .and_then(|v| column.kind.coerce(v))
                .unwrap_or(FieldValue::Null);
            (*column, value)
        })
        .collect()
}

/// Rebuild a typed record from a validated raw JSON record.
///
/// Each known column is coerced to its kind first (`"12"` becomes `12`), so
/// payloads accepted by the rule set always deserialize.
pub fn normalize<R: Resource>(raw: &Value) -> Result<R, String> {
    let object = raw
        .as_object()
        .ok_or_else(|| "record must be a JSON object".to_string())?;

    let mut typed = Map::new();
    for (name, value) in object {
        let coerced = match R::column(name) {
            Some(column) => column
                .kind
                .coerce(value)
                .map(|v| v.to_json())
                .ok_or_else(|| format!("'{}' must be a {}", name, column.kind.name()))?,
            None => value.clone(),
        };
        typed.insert(name.clone(), coerced);
    }

    serde_json::from_value(Value::Object(typed)).map_err(|e| e.to_string())
}

/// Build a typed record from a stored row
pub fn from_row<R: Resource>(row: Value) -> Result<R, StoreError> {
    serde_json::from_value(row).map_err(|e| StoreError::Corrupt {
        table: R::TABLE.table,
        message: e.to_string(),
    })
}
