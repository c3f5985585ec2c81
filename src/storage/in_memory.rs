//! In-memory store for testing and development
//!
//! Rows are kept as JSON objects per table. The store enforces the same
//! constraints as the SQL schema (primary key, unique columns, foreign keys
//! with restricted deletes) and compares text the way the SQL collations do,
//! ASCII case-insensitively.
//!
//! A batch is applied to a copy of every table and swapped in only if every
//! write succeeded, so a failed batch leaves nothing behind.

use crate::core::error::StoreError;
use crate::core::field::FieldValue;
use crate::core::query::{Join, ListQuery};
use crate::core::repository::{Applied, Change, Lookup, Repository, Write};
use crate::core::resource::{Column, ForeignKey, Resource, TableRef, from_row};
use crate::resources::{Arena, Game, Player, Statistic, Team};
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone)]
struct Schema {
    table: TableRef,
    columns: &'static [Column],
    unique: &'static [&'static str],
    foreign_keys: &'static [ForeignKey],
}

impl Schema {
    fn of<R: Resource>() -> Self {
        Self {
            table: R::TABLE,
            columns: R::columns(),
            unique: R::unique_columns(),
            foreign_keys: R::foreign_keys(),
        }
    }

    /// Typed value of `column` in a stored row
    fn value(&self, row: &Value, column: &str) -> FieldValue {
        let raw = row.get(column).unwrap_or(&Value::Null);
        match self.columns.iter().find(|c| c.name == column) {
            Some(c) => c.kind.coerce(raw).unwrap_or(FieldValue::Null),
            None => FieldValue::from_json(raw),
        }
    }
}

#[derive(Debug, Clone)]
struct Table {
    rows: BTreeMap<i64, Value>,
    /// Ids are never reused, as with AUTO_INCREMENT
    next_id: i64,
}

impl Default for Table {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }
}

type Tables = HashMap<&'static str, Table>;

/// In-memory store implementation
///
/// Cheap to clone; clones share the same tables. Uses `RwLock` for
/// thread-safe access.
#[derive(Clone)]
pub struct InMemoryStore {
    schemas: Arc<Vec<Schema>>,
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    /// Create an empty store holding every resource table
    pub fn new() -> Self {
        let schemas = vec![
            Schema::of::<Team>(),
            Schema::of::<Arena>(),
            Schema::of::<Game>(),
            Schema::of::<Player>(),
            Schema::of::<Statistic>(),
        ];
        let tables = schemas
            .iter()
            .map(|s| (s.table.table, Table::default()))
            .collect();
        Self {
            schemas: Arc::new(schemas),
            tables: Arc::new(RwLock::new(tables)),
        }
    }

    fn schema(&self, table: &str) -> Result<&Schema, StoreError> {
        self.schemas
            .iter()
            .find(|s| s.table.table == table)
            .ok_or_else(|| StoreError::Backend(format!("Unknown table: {}", table)))
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|e| StoreError::Backend(format!("Failed to acquire read lock: {}", e)))
    }

    /// Value of `column` in the row `join` points at from `row`; NULL when
    /// the reference is empty or dangling
    fn joined_value(
        tables: &Tables,
        schema: &Schema,
        row: &Value,
        join: Join,
        target: &Schema,
        column: &str,
    ) -> FieldValue {
        let Some(id) = schema.value(row, join.column).as_integer() else {
            return FieldValue::Null;
        };
        tables
            .get(join.table.table)
            .and_then(|t| t.rows.get(&id))
            .map_or(FieldValue::Null, |referenced| target.value(referenced, column))
    }

    /// Check unique and foreign-key constraints for a row about to be stored
    /// under `id`
    fn check_row(
        &self,
        tables: &Tables,
        schema: &Schema,
        id: i64,
        row: &Value,
        index: usize,
    ) -> Result<(), StoreError> {
        let violation = |message: String| StoreError::Constraint {
            table: schema.table.table,
            message,
            index,
        };

        let own = tables.get(schema.table.table).map(|t| &t.rows);
        for column in schema.unique {
            let value = schema.value(row, column);
            let taken = own.is_some_and(|rows| {
                rows.iter()
                    .any(|(other, stored)| *other != id && schema.value(stored, column).collates_eq(&value))
            });
            if taken {
                return Err(violation(format!(
                    "duplicate value {} for unique column '{}'",
                    value.to_json(),
                    column
                )));
            }
        }

        for fk in schema.foreign_keys {
            let Some(target) = schema.value(row, fk.column).as_integer() else {
                continue;
            };
            let exists = tables
                .get(fk.references.table)
                .is_some_and(|t| t.rows.contains_key(&target));
            if !exists {
                return Err(violation(format!(
                    "'{}' references missing {} id {}",
                    fk.column, fk.references.table, target
                )));
            }
        }

        Ok(())
    }

    /// Fail if any row of any table still references `table` row `id`
    fn check_unreferenced(
        &self,
        tables: &Tables,
        table: TableRef,
        id: i64,
        index: usize,
    ) -> Result<(), StoreError> {
        for schema in self.schemas.iter() {
            let Some(rows) = tables.get(schema.table.table).map(|t| &t.rows) else {
                continue;
            };
            for fk in schema.foreign_keys.iter().filter(|fk| fk.references == table) {
                let referenced = rows
                    .values()
                    .any(|row| schema.value(row, fk.column).as_integer() == Some(id));
                if referenced {
                    return Err(StoreError::Constraint {
                        table: table.table,
                        message: format!(
                            "{} id {} is still referenced by {}.{}",
                            table.table, id, schema.table.table, fk.column
                        ),
                        index,
                    });
                }
            }
        }
        Ok(())
    }

    fn apply_one<R: Resource>(
        &self,
        tables: &mut Tables,
        schema: &Schema,
        write: Write<R>,
        index: usize,
    ) -> Result<Applied<R>, StoreError> {
        let table = schema.table.table;
        let not_found = |id| StoreError::NotFound { table, id, index };
        let encode = |record: &R| {
            serde_json::to_value(record).map_err(|e| StoreError::Corrupt {
                table,
                message: format!("Failed to serialize record: {}", e),
            })
        };

        match write {
            Write::Insert(mut record) => {
                let next_id = tables.get(table).map_or(1, |t| t.next_id);
                let id = record.id().unwrap_or(next_id);
                if tables.get(table).is_some_and(|t| t.rows.contains_key(&id)) {
                    return Err(StoreError::Constraint {
                        table,
                        message: format!("duplicate primary key {}", id),
                        index,
                    });
                }
                record.set_id(id);
                let row = encode(&record)?;
                self.check_row(tables, schema, id, &row, index)?;

                let rows = tables.entry(table).or_default();
                rows.rows.insert(id, row.clone());
                rows.next_id = rows.next_id.max(id + 1);
                Ok(Applied::Inserted(from_row(row)?))
            }
            Write::Update(id, mut record) => {
                let before = tables
                    .get(table)
                    .and_then(|t| t.rows.get(&id))
                    .cloned()
                    .ok_or_else(|| not_found(id))?;
                record.set_id(id);
                let row = encode(&record)?;
                self.check_row(tables, schema, id, &row, index)?;

                tables.entry(table).or_default().rows.insert(id, row.clone());
                Ok(Applied::Updated(Change {
                    before: from_row(before)?,
                    after: from_row(row)?,
                }))
            }
            Write::Delete(id) => {
                if !tables.get(table).is_some_and(|t| t.rows.contains_key(&id)) {
                    return Err(not_found(id));
                }
                self.check_unreferenced(tables, schema.table, id, index)?;
                let before = tables
                    .get_mut(table)
                    .and_then(|t| t.rows.remove(&id))
                    .ok_or_else(|| not_found(id))?;
                Ok(Applied::Deleted(from_row(before)?))
            }
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Lookup for InMemoryStore {
    async fn exists_by_id(&self, table: TableRef, id: i64) -> Result<bool, StoreError> {
        let tables = self.read()?;
        Ok(tables
            .get(table.table)
            .is_some_and(|t| t.rows.contains_key(&id)))
    }

    async fn exists_unique(
        &self,
        table: TableRef,
        column: &'static str,
        value: &FieldValue,
        except: Option<i64>,
    ) -> Result<bool, StoreError> {
        let schema = self.schema(table.table)?;
        let tables = self.read()?;
        Ok(tables.get(table.table).is_some_and(|t| {
            t.rows.iter().any(|(id, row)| {
                Some(*id) != except && schema.value(row, column).collates_eq(value)
            })
        }))
    }
}

#[async_trait]
impl<R: Resource> Repository<R> for InMemoryStore {
    async fn find(&self, query: &ListQuery) -> Result<(Vec<R>, u64), StoreError> {
        let schema = self.schema(R::TABLE.table)?;
        let joined = query
            .filter
            .joined()
            .map(|(join, column, predicate)| {
                self.schema(join.table.table)
                    .map(|target| (join, target, column, predicate))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut matching: Vec<(i64, Value)> = {
            let tables = self.read()?;
            let Some(table) = tables.get(R::TABLE.table) else {
                return Ok((Vec::new(), 0));
            };
            table
                .rows
                .iter()
                .filter(|(_, row)| {
                    query
                        .filter
                        .iter()
                        .all(|(field, predicate)| predicate.matches(&schema.value(row, field)))
                        && joined.iter().all(|(join, target, column, predicate)| {
                            predicate.matches(&Self::joined_value(
                                &tables, schema, row, *join, target, column,
                            ))
                        })
                        && query
                            .scope
                            .as_ref()
                            .is_none_or(|scope| scope.matches(|c| schema.value(row, c)))
                })
                .map(|(id, row)| (*id, row.clone()))
                .collect()
        };

        let sort = query.sort;
        matching.sort_by(|(a_id, a), (b_id, b)| {
            let primary = schema
                .value(a, sort.field)
                .collate(&schema.value(b, sort.field))
                .unwrap_or(Ordering::Equal);
            sort.direction.apply(primary).then(a_id.cmp(b_id))
        });

        let total = matching.len() as u64;
        let window = match query.page {
            Some(page) => page.slice(matching),
            None => matching,
        };

        let rows = window
            .into_iter()
            .map(|(_, row)| from_row(row))
            .collect::<Result<Vec<R>, _>>()?;
        Ok((rows, total))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<R>, StoreError> {
        let row = {
            let tables = self.read()?;
            tables
                .get(R::TABLE.table)
                .and_then(|t| t.rows.get(&id))
                .cloned()
        };
        row.map(from_row).transpose()
    }

    async fn apply(&self, writes: Vec<Write<R>>) -> Result<Vec<Applied<R>>, StoreError> {
        let schema = self.schema(R::TABLE.table)?;
        let mut tables = self
            .tables
            .write()
            .map_err(|e| StoreError::Backend(format!("Failed to acquire write lock: {}", e)))?;

        let mut working = tables.clone();
        let mut applied = Vec::with_capacity(writes.len());
        for (index, write) in writes.into_iter().enumerate() {
            applied.push(self.apply_one(&mut working, schema, write, index)?);
        }

        *tables = working;
        Ok(applied)
    }
}
