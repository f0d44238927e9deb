//! RelationalStore trait
//!
//! Generic filtered CRUD over rows. The router depends only on this trait, so
//! any backend with duplicate-key detection and atomic batches can stand in.

use crate::error::StoreError;
use crate::filter::Filter;
use crate::models::Model;
use serde_json::Value;

/// A row: column name to JSON value
pub type Row = serde_json::Map<String, Value>;

/// One write inside a [`RelationalStore::transaction`]
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Insert a row
    Create {
        /// Target table
        table: String,
        /// Row to insert
        row: Row,
    },
    /// Merge values into the row with the given primary key
    Update {
        /// Target table
        table: String,
        /// Primary key value
        id: String,
        /// Columns to overwrite
        values: Row,
    },
    /// Delete every row matching all filters
    Delete {
        /// Target table
        table: String,
        /// Row predicate
        filters: Vec<Filter>,
    },
}

impl WriteOp {
    /// Insert a typed model
    pub fn create<M: Model>(model: &M) -> Result<Self, StoreError> {
        Ok(WriteOp::Create {
            table: M::TABLE.to_string(),
            row: model.to_row()?,
        })
    }

    /// Delete by filter
    pub fn delete(table: &str, filters: Vec<Filter>) -> Self {
        WriteOp::Delete {
            table: table.to_string(),
            filters,
        }
    }
}

/// Trait for relational row stores
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait RelationalStore: Send + Sync {
    /// Insert a row; returns the stored row (with any generated key).
    /// Fails with [`StoreError::DuplicateEntry`] on a key conflict.
    async fn create(&self, table: &str, row: Row) -> Result<Row, StoreError>;

    /// Fetch a row by its single-column primary key
    async fn get(&self, table: &str, id: &str) -> Result<Row, StoreError>;

    /// List rows matching all filters
    async fn list(&self, table: &str, filters: &[Filter]) -> Result<Vec<Row>, StoreError>;

    /// Merge values into the row with the given primary key
    async fn update(&self, table: &str, id: &str, values: Row) -> Result<Row, StoreError>;

    /// Delete rows matching all filters; returns the number removed
    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<u64, StoreError>;

    /// Apply all writes atomically: either every op succeeds or none is visible
    async fn transaction(&self, ops: Vec<WriteOp>) -> Result<(), StoreError>;
}

/// Insert a typed model
pub async fn create_model<S, M>(store: &S, model: &M) -> Result<M, StoreError>
where
    S: RelationalStore + ?Sized,
    M: Model,
{
    let row = store.create(M::TABLE, model.to_row()?).await?;
    M::from_row(row)
}

/// Fetch a typed model by primary key
pub async fn get_model<S, M>(store: &S, id: &str) -> Result<M, StoreError>
where
    S: RelationalStore + ?Sized,
    M: Model,
{
    M::from_row(store.get(M::TABLE, id).await?)
}

/// List typed models matching all filters
pub async fn list_models<S, M>(store: &S, filters: &[Filter]) -> Result<Vec<M>, StoreError>
where
    S: RelationalStore + ?Sized,
    M: Model,
{
    store
        .list(M::TABLE, filters)
        .await?
        .into_iter()
        .map(M::from_row)
        .collect()
}

/// Update a typed model's columns by primary key
pub async fn update_model<S, M>(store: &S, id: &str, values: Row) -> Result<M, StoreError>
where
    S: RelationalStore + ?Sized,
    M: Model,
{
    M::from_row(store.update(M::TABLE, id, values).await?)
}

/// Build a row from `(column, value)` pairs
pub fn row_of<I, K>(pairs: I) -> Row
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}
