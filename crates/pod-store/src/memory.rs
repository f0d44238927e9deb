//! In-process RelationalStore
//!
//! `MemoryStore` keeps every table in memory behind one lock, enforces the
//! primary keys and unique constraints of the [schema](crate::schema), and
//! applies each write as copy-then-swap so a failed write leaves no trace.
//! Nothing is persisted; clones share the tables. Use
//! [`DurableStore`](crate::DurableStore) when several processes share state.

use crate::error::StoreError;
use crate::filter::{matches_all, Filter};
use crate::schema::{default_schema, TableSpec};
use crate::store::{RelationalStore, Row, WriteOp};
use crate::table::{self, Schema, Tables};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Non-durable in-memory store
#[derive(Debug, Clone)]
pub struct MemoryStore {
    schema: Arc<Schema>,
    state: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    /// Create an empty store with the default schema
    pub fn new() -> Self {
        Self::with_schema(default_schema())
    }

    /// Create an empty store with a custom schema
    pub fn with_schema(tables: Vec<TableSpec>) -> Self {
        Self {
            schema: Arc::new(table::schema_of(tables)),
            state: Arc::new(Mutex::new(Tables::new())),
        }
    }

    /// Insert a row without checking unique constraints (for test setup).
    ///
    /// The primary key is still required and must be unused. This is how
    /// tests seed rows that a store without the constraint could contain.
    pub fn insert_unchecked(&self, table: &str, row: Row) -> Result<(), StoreError> {
        let spec = self.spec(table)?.clone();
        self.write(|tables| {
            let data = tables.entry(spec.name.to_string()).or_default();
            let key = table::key_of(&spec, &row)?;
            if data.rows.contains_key(&key) {
                return Err(table::duplicate(&spec, &spec.primary_key_label()));
            }
            data.rows.insert(key, row);
            Ok(())
        })
    }

    /// Number of rows in a table
    pub fn row_count(&self, table: &str) -> Result<usize, StoreError> {
        self.spec(table)?;
        let guard = self.lock()?;
        Ok(guard.get(table).map_or(0, |t| t.rows.len()))
    }

    fn spec(&self, table: &str) -> Result<&TableSpec, StoreError> {
        table::spec(&self.schema, table)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))
    }

    /// Run a mutation on a copy of the state; commit only if it succeeds.
    fn write<T>(&self, f: impl FnOnce(&mut Tables) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let mut guard = self.lock()?;
        let mut next = guard.clone();
        let out = f(&mut next)?;
        *guard = next;
        Ok(out)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RelationalStore for MemoryStore {
    async fn create(&self, table: &str, row: Row) -> Result<Row, StoreError> {
        let spec = self.spec(table)?;
        self.write(|tables| table::insert(spec, tables.entry(table.to_string()).or_default(), row))
    }

    async fn get(&self, table: &str, id: &str) -> Result<Row, StoreError> {
        self.spec(table)?;
        let guard = self.lock()?;
        guard
            .get(table)
            .and_then(|t| t.rows.get(id))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("{} {}", table, id)))
    }

    async fn list(&self, table: &str, filters: &[Filter]) -> Result<Vec<Row>, StoreError> {
        self.spec(table)?;
        let guard = self.lock()?;
        Ok(guard
            .get(table)
            .map(|t| {
                t.rows
                    .values()
                    .filter(|row| matches_all(filters, row))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn update(&self, table: &str, id: &str, values: Row) -> Result<Row, StoreError> {
        let spec = self.spec(table)?;
        self.write(|tables| table::update_row(spec, tables.entry(table.to_string()).or_default(), id, values))
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<u64, StoreError> {
        self.spec(table)?;
        self.write(|tables| Ok(table::delete_rows(tables.entry(table.to_string()).or_default(), filters)))
    }

    async fn transaction(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        let count = ops.len();
        self.write(|tables| {
            for op in ops {
                table::apply(&self.schema, tables, op)?;
            }
            Ok(())
        })?;
        debug!("Committed transaction with {} ops", count);
        Ok(())
    }
}
