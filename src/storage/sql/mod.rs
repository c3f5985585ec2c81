//! Relational backends built on sqlx
//!
//! Both backends run the statements produced by
//! [`QueryBuilder`](crate::core::query_builder::QueryBuilder) (`?`
//! placeholders, whitelisted identifiers) and differ only in pool type, DDL
//! and how the last inserted id is read. The shared store implementation is
//! generated by [`sql_store!`].
//!
//! # Feature flags
//!
//! ```toml
//! [dependencies]
//! puck-data = { version = "0.1", features = ["mysql"] }   # or "sqlite"
//! ```

use crate::core::error::StoreError;

#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "mysql")]
pub use mysql::MysqlStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

/// Map a sqlx error raised by write `index` of a batch.
///
/// Unique, foreign-key and check violations are expected rejections; anything
/// else is a backend failure.
pub(crate) fn classify(table: &'static str, index: usize, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() || db.is_foreign_key_violation() || db.is_check_violation() {
            return StoreError::Constraint {
                table,
                message: db.message().to_string(),
                index,
            };
        }
    }
    backend(err)
}

pub(crate) fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

/// Implements `Lookup` and `Repository<R>` for a pool-backed store.
///
/// `$store` must have a `pool` field of type `sqlx::Pool<$db>`; `$last_id`
/// reads the generated id from the insert's query result `$done`.
macro_rules! sql_store {
    ($store:ident, $db:ty, $conn:ty, $row:ty, |$done:ident| $last_id:expr) => {
        impl $store {
            fn bind_all<'q>(
                mut query: sqlx::query::Query<'q, $db, <$db as sqlx::Database>::Arguments<'q>>,
                params: &'q [$crate::core::field::FieldValue],
            ) -> sqlx::query::Query<'q, $db, <$db as sqlx::Database>::Arguments<'q>> {
                use $crate::core::field::FieldValue;
                for param in params {
                    query = match param {
                        FieldValue::String(s) => query.bind(s.as_str()),
                        FieldValue::Integer(i) => query.bind(*i),
                        FieldValue::Float(f) => query.bind(*f),
                        FieldValue::Date(d) => query.bind(*d),
                        FieldValue::Null => query.bind(None::<i64>),
                    };
                }
                query
            }

            /// Rebuild a record from a row, column by column
            fn decode<R: $crate::core::resource::Resource>(
                row: &$row,
            ) -> Result<R, $crate::core::error::StoreError> {
                use $crate::core::field::{DATE_FORMAT, FieldKind};
                use serde_json::Value;
                use sqlx::Row;

                let corrupt = |e: sqlx::Error| $crate::core::error::StoreError::Corrupt {
                    table: R::TABLE.table,
                    message: e.to_string(),
                };

                let mut object = serde_json::Map::new();
                for column in R::columns() {
                    let value = match column.kind {
                        FieldKind::Integer => row
                            .try_get::<Option<i64>, _>(column.name)
                            .map_err(corrupt)?
                            .map(Value::from),
                        FieldKind::Float => row
                            .try_get::<Option<f64>, _>(column.name)
                            .map_err(corrupt)?
                            .map(Value::from),
                        FieldKind::Text => row
                            .try_get::<Option<String>, _>(column.name)
                            .map_err(corrupt)?
                            .map(Value::from),
                        FieldKind::Date => row
                            .try_get::<Option<chrono::NaiveDate>, _>(column.name)
                            .map_err(corrupt)?
                            .map(|d| Value::String(d.format(DATE_FORMAT).to_string())),
                    };
                    object.insert(column.name.to_string(), value.unwrap_or(Value::Null));
                }
                $crate::core::resource::from_row(Value::Object(object))
            }

            async fn check(
                &self,
                built: $crate::core::query_builder::BuiltQuery,
            ) -> Result<bool, $crate::core::error::StoreError> {
                tracing::debug!(sql = %built.sql, params = built.params.len(), "lookup");
                let found = Self::bind_all(sqlx::query(&built.sql), &built.params)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err($crate::storage::sql::backend)?;
                Ok(found.is_some())
            }

            async fn fetch_in<R: $crate::core::resource::Resource>(
                conn: &mut $conn,
                id: i64,
            ) -> Result<Option<R>, $crate::core::error::StoreError> {
                let built = $crate::core::query_builder::QueryBuilder::for_resource::<R>()
                    .select_by_id(id);
                let row = Self::bind_all(sqlx::query(&built.sql), &built.params)
                    .fetch_optional(&mut *conn)
                    .await
                    .map_err($crate::storage::sql::backend)?;
                row.as_ref().map(Self::decode::<R>).transpose()
            }
        }

        #[async_trait::async_trait]
        impl $crate::core::repository::Lookup for $store {
            async fn exists_by_id(
                &self,
                table: $crate::core::resource::TableRef,
                id: i64,
            ) -> Result<bool, $crate::core::error::StoreError> {
                self.check($crate::core::query_builder::QueryBuilder::exists_by_id(table, id))
                    .await
            }

            async fn exists_unique(
                &self,
                table: $crate::core::resource::TableRef,
                column: &'static str,
                value: &$crate::core::field::FieldValue,
                except: Option<i64>,
            ) -> Result<bool, $crate::core::error::StoreError> {
                self.check($crate::core::query_builder::QueryBuilder::exists_unique(
                    table, column, value, except,
                ))
                .await
            }
        }

        #[async_trait::async_trait]
        impl<R: $crate::core::resource::Resource> $crate::core::repository::Repository<R>
            for $store
        {
            async fn find(
                &self,
                query: &$crate::core::query::ListQuery,
            ) -> Result<(Vec<R>, u64), $crate::core::error::StoreError> {
                use sqlx::Row;

                let statements =
                    $crate::core::query_builder::QueryBuilder::for_resource::<R>().build(query);
                tracing::debug!(
                    sql = %statements.select.sql,
                    params = statements.select.params.len(),
                    "list"
                );

                let total: i64 =
                    Self::bind_all(sqlx::query(&statements.count.sql), &statements.count.params)
                        .fetch_one(&self.pool)
                        .await
                        .map_err($crate::storage::sql::backend)?
                        .try_get(0)
                        .map_err($crate::storage::sql::backend)?;

                let rows =
                    Self::bind_all(sqlx::query(&statements.select.sql), &statements.select.params)
                        .fetch_all(&self.pool)
                        .await
                        .map_err($crate::storage::sql::backend)?;

                let records = rows
                    .iter()
                    .map(Self::decode::<R>)
                    .collect::<Result<Vec<R>, _>>()?;
                Ok((records, total.max(0) as u64))
            }

            async fn find_by_id(
                &self,
                id: i64,
            ) -> Result<Option<R>, $crate::core::error::StoreError> {
                let mut conn = self
                    .pool
                    .acquire()
                    .await
                    .map_err($crate::storage::sql::backend)?;
                Self::fetch_in::<R>(&mut *conn, id).await
            }

            async fn apply(
                &self,
                writes: Vec<$crate::core::repository::Write<R>>,
            ) -> Result<
                Vec<$crate::core::repository::Applied<R>>,
                $crate::core::error::StoreError,
            > {
                use $crate::core::error::StoreError;
                use $crate::core::repository::{Applied, Change, Write};
                use $crate::storage::sql::{backend, classify};

                let table = R::TABLE.table;
                let builder = $crate::core::query_builder::QueryBuilder::for_resource::<R>();
                let mut applied = Vec::with_capacity(writes.len());

                // Dropping the transaction on an early return rolls it back
                let mut tx = self.pool.begin().await.map_err(backend)?;

                for (index, write) in writes.into_iter().enumerate() {
                    match write {
                        Write::Insert(record) => {
                            let values = $crate::core::resource::column_values(&record)?;
                            let built = builder.insert(&values);
                            tracing::debug!(sql = %built.sql, params = built.params.len(), "insert");
                            let $done = Self::bind_all(sqlx::query(&built.sql), &built.params)
                                .execute(&mut *tx)
                                .await
                                .map_err(|e| classify(table, index, e))?;
                            let id = match record.id() {
                                Some(id) => id,
                                None => $last_id,
                            };
                            let row = Self::fetch_in::<R>(&mut *tx, id).await?.ok_or_else(|| {
                                StoreError::Backend(format!(
                                    "{} row {} vanished after insert",
                                    table, id
                                ))
                            })?;
                            applied.push(Applied::Inserted(row));
                        }
                        Write::Update(id, mut record) => {
                            let before = Self::fetch_in::<R>(&mut *tx, id)
                                .await?
                                .ok_or(StoreError::NotFound { table, id, index })?;
                            record.set_id(id);
                            let values = $crate::core::resource::column_values(&record)?;
                            let built = builder.update(id, &values);
                            tracing::debug!(sql = %built.sql, params = built.params.len(), "update");
                            Self::bind_all(sqlx::query(&built.sql), &built.params)
                                .execute(&mut *tx)
                                .await
                                .map_err(|e| classify(table, index, e))?;
                            let after = Self::fetch_in::<R>(&mut *tx, id)
                                .await?
                                .ok_or(StoreError::NotFound { table, id, index })?;
                            applied.push(Applied::Updated(Change { before, after }));
                        }
                        Write::Delete(id) => {
                            let before = Self::fetch_in::<R>(&mut *tx, id)
                                .await?
                                .ok_or(StoreError::NotFound { table, id, index })?;
                            let built = builder.delete(id);
                            tracing::debug!(sql = %built.sql, params = built.params.len(), "delete");
                            Self::bind_all(sqlx::query(&built.sql), &built.params)
                                .execute(&mut *tx)
                                .await
                                .map_err(|e| classify(table, index, e))?;
                            applied.push(Applied::Deleted(before));
                        }
                    }
                }

                tx.commit().await.map_err(backend)?;
                Ok(applied)
            }
        }
    };
}

pub(crate) use sql_store;
