//! Store boundary traits
//!
//! [`Lookup`] is the narrow capability predicate rules depend on, so rule
//! evaluation can run against any store, including a test double.
//! [`Repository`] is the full per-resource boundary used by the service.

use crate::core::error::StoreError;
use crate::core::field::FieldValue;
use crate::core::query::ListQuery;
use crate::core::resource::{Resource, TableRef};
use async_trait::async_trait;
use serde::Serialize;

/// Existence and uniqueness checks against committed store state
#[async_trait]
pub trait Lookup: Send + Sync {
    /// Whether `table` holds a row with primary key `id`
    async fn exists_by_id(&self, table: TableRef, id: i64) -> Result<bool, StoreError>;

    /// Whether a row other than `except` holds `value` in `column`,
    /// compared with the store's collation
    async fn exists_unique(
        &self,
        table: TableRef,
        column: &'static str,
        value: &FieldValue,
        except: Option<i64>,
    ) -> Result<bool, StoreError>;
}

/// One write of a batch
#[derive(Debug, Clone)]
pub enum Write<R> {
    Insert(R),
    Update(i64, R),
    Delete(i64),
}

/// State of a row before and after an update
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Change<R> {
    pub before: R,
    pub after: R,
}

/// What a write did, with the rows it touched
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Applied<R> {
    /// The row as stored, id included
    Inserted(R),
    Updated(Change<R>),
    /// The row as it was before removal
    Deleted(R),
}

/// Storage boundary for one resource
#[async_trait]
pub trait Repository<R: Resource>: Lookup {
    /// Rows matching the query's filter and scope, sorted and windowed, with
    /// the total number of matching rows ignoring the window
    async fn find(&self, query: &ListQuery) -> Result<(Vec<R>, u64), StoreError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<R>, StoreError>;

    /// Run every write in order inside one transaction.
    ///
    /// Either every write is applied or none is. A missing update/delete
    /// target fails with [`StoreError::NotFound`], a constraint rejection with
    /// [`StoreError::Constraint`], both carrying the index of the write.
    async fn apply(&self, writes: Vec<Write<R>>) -> Result<Vec<Applied<R>>, StoreError>;

    /// Insert one record, returning its id
    async fn insert(&self, record: R) -> Result<i64, StoreError> {
        let applied = self.apply(vec![Write::Insert(record)]).await?;
        match applied.into_iter().next() {
            Some(Applied::Inserted(row)) => row.id().ok_or_else(|| {
                StoreError::Backend(format!("{} insert returned no id", R::TABLE.table))
            }),
            _ => Err(StoreError::Backend(format!(
                "{} insert reported no row",
                R::TABLE.table
            ))),
        }
    }

    async fn update(&self, id: i64, record: R) -> Result<(), StoreError> {
        self.apply(vec![Write::Update(id, record)]).await?;
        Ok(())
    }

    /// Delete one row, returning the number of rows removed
    async fn delete(&self, id: i64) -> Result<u64, StoreError> {
        match self.apply(vec![Write::Delete(id)]).await {
            Ok(applied) => Ok(applied.len() as u64),
            Err(StoreError::NotFound { .. }) => Ok(0),
            Err(e) => Err(e),
        }
    }
}
