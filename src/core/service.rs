//! Resource service: the read and write paths of one resource
//!
//! Read path: raw parameters → [`ListQuery`] → repository → [`Paginated`].
//! Write path: raw batch → [`BatchValidator`] → typed records → one
//! repository transaction → snapshots.
//!
//! Every operation returns an [`OperationResult`]; only unexpected storage
//! failures surface as `Err`.

use crate::core::error::{EngineError, FailureKind, StoreError};
use crate::core::field::FieldKind;
use crate::core::outcome::OperationResult;
use crate::core::paginator::{Nested, Paginated, Paginator};
use crate::core::query::{ListQuery, QueryConfig, Scope};
use crate::core::repository::{Applied, Change, Repository, Write};
use crate::core::resource::{Resource, normalize};
use crate::core::validation::{BatchOutcome, BatchValidator, FieldError, RecordValidation};
use serde_json::Value;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

/// Engine operations for resource `R` over store `S`
pub struct ResourceService<R, S: ?Sized> {
    store: Arc<S>,
    _marker: PhantomData<fn() -> R>,
}

impl<R, S: ?Sized> Clone for ResourceService<R, S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _marker: PhantomData,
        }
    }
}

impl<R: Resource, S: Repository<R> + ?Sized> ResourceService<R, S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            _marker: PhantomData,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    // -------------------------------------------------------------------------
    // Read path
    // -------------------------------------------------------------------------

    /// Filtered, sorted, optionally paginated listing
    pub async fn list(
        &self,
        params: &HashMap<String, String>,
    ) -> Result<OperationResult<Paginated<R>>, StoreError> {
        let result = match ListQuery::parse(params, R::query_config()) {
            Ok(query) => self.run_list(query).await,
            Err(e) => Err(e),
        };
        self.finish("list", result, format!("{} records retrieved", R::SINGULAR), 0)
    }

    /// Listing of the rows whose `columns` point at parent `P` `parent_id`,
    /// parsed against `config`, returned together with the parent record.
    ///
    /// The parameters are checked before the parent, and the parent must
    /// exist.
    pub async fn list_within<P: Resource>(
        &self,
        params: &HashMap<String, String>,
        config: &'static QueryConfig,
        parent_id: i64,
        columns: &'static [&'static str],
    ) -> Result<OperationResult<Nested<P, R>>, StoreError>
    where
        S: Repository<P>,
    {
        let result = self
            .run_list_within::<P>(params, config, parent_id, columns)
            .await;
        self.finish(
            "list",
            result,
            format!(
                "{} records retrieved for {} {}",
                R::SINGULAR,
                P::SINGULAR,
                parent_id
            ),
            0,
        )
    }

    async fn run_list_within<P: Resource>(
        &self,
        params: &HashMap<String, String>,
        config: &'static QueryConfig,
        parent_id: i64,
        columns: &'static [&'static str],
    ) -> Result<Nested<P, R>, EngineError>
    where
        S: Repository<P>,
    {
        let query = ListQuery::parse(params, config)?;
        let parent = Repository::<P>::find_by_id(&*self.store, parent_id)
            .await?
            .ok_or(EngineError::NotFound {
                resource: P::TABLE.table,
                id: parent_id,
                index: None,
            })?;
        let page = self
            .run_list(query.with_scope(Scope::new(columns, parent_id)))
            .await?;
        Ok(Nested::new(P::SINGULAR, parent, page))
    }

    async fn run_list(&self, query: ListQuery) -> Result<Paginated<R>, EngineError> {
        let (rows, total) = self.store.find(&query).await?;
        Ok(Paginator::assemble(rows, total, query.page))
    }

    /// Fetch one record by id
    pub async fn get(&self, id: i64) -> Result<OperationResult<R>, StoreError> {
        let result = match self.store.find_by_id(id).await {
            Ok(Some(row)) => Ok(row),
            Ok(None) => Err(EngineError::NotFound {
                resource: R::TABLE.table,
                id,
                index: None,
            }),
            Err(e) => Err(e.into()),
        };
        self.finish("get", result, format!("{} {} retrieved", R::SINGULAR, id), 0)
    }

    // -------------------------------------------------------------------------
    // Write path
    // -------------------------------------------------------------------------

    /// Validate and insert a batch; data is the stored rows
    pub async fn create(&self, records: Vec<Value>) -> Result<OperationResult<Vec<R>>, StoreError> {
        let result = self.run_create(&records).await;
        self.finish(
            "create",
            result,
            format!("{} {} record(s) created", records.len(), R::SINGULAR),
            records.len(),
        )
    }

    async fn run_create(&self, records: &[Value]) -> Result<Vec<R>, EngineError> {
        BatchValidator::new(&*self.store)
            .enforce(R::create_rules(), records)
            .await?;
        let writes = normalize_batch::<R>(records)?
            .into_iter()
            .map(Write::Insert)
            .collect();
        let applied = self.store.apply(writes).await?;
        Ok(applied
            .into_iter()
            .filter_map(|a| match a {
                Applied::Inserted(row) => Some(row),
                _ => None,
            })
            .collect())
    }

    /// Validate and update a batch; data is `{before, after}` per record
    pub async fn update(
        &self,
        records: Vec<Value>,
    ) -> Result<OperationResult<Vec<Change<R>>>, StoreError> {
        let result = self.run_update(&records).await;
        self.finish(
            "update",
            result,
            format!("{} {} record(s) updated", records.len(), R::SINGULAR),
            records.len(),
        )
    }

    async fn run_update(&self, records: &[Value]) -> Result<Vec<Change<R>>, EngineError> {
        BatchValidator::new(&*self.store)
            .enforce(R::update_rules(), records)
            .await?;
        let mut writes = Vec::with_capacity(records.len());
        for record in normalize_batch::<R>(records)? {
            let id = record.id().ok_or_else(|| {
                EngineError::invalid_input(R::TABLE.id_column, "is required for updates")
            })?;
            writes.push(Write::Update(id, record));
        }
        let applied = self.store.apply(writes).await?;
        Ok(applied
            .into_iter()
            .filter_map(|a| match a {
                Applied::Updated(change) => Some(change),
                _ => None,
            })
            .collect())
    }

    /// Validate and delete a batch of `{"<id column>": n}` records; data is
    /// the deleted rows
    pub async fn delete(&self, records: Vec<Value>) -> Result<OperationResult<Vec<R>>, StoreError> {
        let result = self.run_delete(&records).await;
        self.finish(
            "delete",
            result,
            format!("{} {} record(s) deleted", records.len(), R::SINGULAR),
            records.len(),
        )
    }

    async fn run_delete(&self, records: &[Value]) -> Result<Vec<R>, EngineError> {
        BatchValidator::new(&*self.store)
            .enforce(R::delete_rules(), records)
            .await?;
        let mut writes = Vec::with_capacity(records.len());
        for record in records {
            let id = record
                .get(R::TABLE.id_column)
                .and_then(|v| FieldKind::Integer.coerce(v))
                .and_then(|v| v.as_integer())
                .ok_or_else(|| {
                    EngineError::invalid_input(R::TABLE.id_column, "is required for deletes")
                })?;
            writes.push(Write::Delete(id));
        }
        let applied = self.store.apply(writes).await?;
        Ok(applied
            .into_iter()
            .filter_map(|a| match a {
                Applied::Deleted(row) => Some(row),
                _ => None,
            })
            .collect())
    }

    fn finish<T>(
        &self,
        operation: &'static str,
        result: Result<T, EngineError>,
        message: String,
        records: usize,
    ) -> Result<OperationResult<T>, StoreError> {
        match &result {
            Ok(_) if operation == "list" || operation == "get" => {
                tracing::debug!(resource = R::TABLE.table, operation, "read completed");
            }
            Ok(_) => {
                tracing::info!(resource = R::TABLE.table, operation, records, "batch committed");
            }
            Err(e) => match e.failure_kind() {
                Some(FailureKind::ValidationFailure | FailureKind::ConstraintViolation) => {
                    tracing::warn!(resource = R::TABLE.table, operation, error = %e, "batch rejected");
                }
                Some(_) => {
                    tracing::debug!(resource = R::TABLE.table, operation, error = %e, "request failed");
                }
                None => {
                    tracing::error!(resource = R::TABLE.table, operation, error = %e, "store failure");
                }
            },
        }
        OperationResult::settle(result, message, records)
    }
}

/// Turn validated raw records into typed ones, reporting any record that
/// still fails to deserialize against its index
fn normalize_batch<R: Resource>(records: &[Value]) -> Result<Vec<R>, EngineError> {
    let mut typed = Vec::with_capacity(records.len());
    let mut outcome = Vec::with_capacity(records.len());
    let mut failed = 0;

    for (index, record) in records.iter().enumerate() {
        let errors = match normalize::<R>(record) {
            Ok(row) => {
                typed.push(row);
                Vec::new()
            }
            Err(message) => {
                failed += 1;
                vec![FieldError::new("record", "type", message)]
            }
        };
        outcome.push(RecordValidation { index, errors });
    }

    if failed > 0 {
        return Err(EngineError::Validation {
            message: format!(
                "Validation failed for {} of {} records; nothing was written",
                failed,
                records.len()
            ),
            outcome: BatchOutcome::new(outcome),
        });
    }
    Ok(typed)
}
