//! redb-backed RelationalStore
//!
//! `DurableStore` keeps each schema table in a redb table of JSON rows keyed
//! by primary key, plus one sequence table for auto-increment ids. Every
//! write runs in a single redb write transaction: the touched tables are
//! read, primary keys and unique constraints are checked against what is
//! committed, and the changed rows are written back before `commit`.
//!
//! redb holds an exclusive lock on the file while a `Database` is open. A
//! handle therefore opens the file for one operation only and waits while
//! another handle (in this process or another one) holds it, so any number
//! of processes can share one path.

use crate::error::StoreError;
use crate::filter::{matches_all, Filter};
use crate::schema::{default_schema, TableSpec};
use crate::store::{RelationalStore, Row, WriteOp};
use crate::table::{self, Schema, TableData, Tables};
use redb::{
    Database, DatabaseError, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default time to wait for another handle to release the file
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const BUSY_RETRY_INTERVAL: Duration = Duration::from_millis(5);

/// Next auto-increment id per table
const SEQUENCES: TableDefinition<&str, i64> = TableDefinition::new("_sequences");

/// Map any `Display` error into `StoreError::Backend` with context.
macro_rules! backend {
    ($what:expr) => {
        |e| StoreError::Backend(format!("{}: {}", $what, e))
    };
}

fn rows_table(name: &str) -> TableDefinition<'_, &'static str, &'static [u8]> {
    TableDefinition::new(name)
}

/// Store persisted in a redb file shared by every handle and process
#[derive(Debug, Clone)]
pub struct DurableStore {
    schema: Arc<Schema>,
    path: Arc<PathBuf>,
    busy_timeout: Duration,
}

impl DurableStore {
    /// Open (or create) a store at `path` with the default schema
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::open_with_schema(path, default_schema())
    }

    /// Open (or create) a store at `path` with a custom schema
    pub fn open_with_schema(path: &Path, tables: Vec<TableSpec>) -> Result<Self, StoreError> {
        let store = Self {
            schema: Arc::new(table::schema_of(tables)),
            path: Arc::new(path.to_path_buf()),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        };
        store.ensure_tables()?;
        debug!("Opened durable store at {}", path.display());
        Ok(store)
    }

    /// How long an operation waits for the file before failing
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn spec(&self, table: &str) -> Result<&TableSpec, StoreError> {
        table::spec(&self.schema, table)
    }

    fn ensure_tables(&self) -> Result<(), StoreError> {
        let db = self.connect()?;
        let txn = db.begin_write().map_err(backend!("begin write"))?;
        // Opening a table in a write transaction creates it if absent.
        for name in self.schema.keys() {
            txn.open_table(rows_table(name)).map_err(backend!(name))?;
        }
        txn.open_table(SEQUENCES).map_err(backend!("sequences"))?;
        txn.commit().map_err(backend!("commit"))?;
        Ok(())
    }

    fn connect(&self) -> Result<Database, StoreError> {
        let started = Instant::now();
        loop {
            match Database::create(self.path.as_path()) {
                Ok(db) => return Ok(db),
                Err(DatabaseError::DatabaseAlreadyOpen) if started.elapsed() < self.busy_timeout => {
                    std::thread::sleep(BUSY_RETRY_INTERVAL);
                }
                Err(e) => {
                    return Err(StoreError::Backend(format!("open {}: {}", self.path.display(), e)));
                }
            }
        }
    }

    /// Run `f` against an open database on the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Self, &Database) -> Result<T, StoreError> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || {
            let db = store.connect()?;
            f(&store, &db)
        })
        .await
        .map_err(backend!("store task"))?
    }

    /// Load `names`, mutate them with `f`, and commit the changed rows.
    ///
    /// Constraint checks inside `f` see every committed row, because the
    /// write transaction is exclusive for its whole duration.
    fn write<T>(
        &self,
        db: &Database,
        names: Vec<String>,
        f: impl FnOnce(&Schema, &mut Tables) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let txn = db.begin_write().map_err(backend!("begin write"))?;
        let mut tables = Tables::new();
        for name in names {
            if !tables.contains_key(&name) {
                let data = load(&txn, &name)?;
                tables.insert(name, data);
            }
        }
        let before = tables.clone();

        let out = match f(&self.schema, &mut tables) {
            Ok(out) => out,
            Err(e) => {
                if let Err(abort) = txn.abort() {
                    warn!("Failed to abort store transaction: {}", abort);
                }
                return Err(e);
            }
        };

        for (name, data) in &tables {
            persist(&txn, name, before.get(name), data)?;
        }
        txn.commit().map_err(backend!("commit"))?;
        Ok(out)
    }

    fn read(&self, db: &Database, name: &str) -> Result<Vec<Row>, StoreError> {
        let txn = db.begin_read().map_err(backend!("begin read"))?;
        let table = txn.open_table(rows_table(name)).map_err(backend!(name))?;
        let mut rows = Vec::new();
        for entry in table.iter().map_err(backend!(name))? {
            let (_, value) = entry.map_err(backend!(name))?;
            rows.push(serde_json::from_slice(value.value())?);
        }
        Ok(rows)
    }
}

fn load(txn: &WriteTransaction, name: &str) -> Result<TableData, StoreError> {
    let mut data = TableData::default();
    {
        let table = txn.open_table(rows_table(name)).map_err(backend!(name))?;
        for entry in table.iter().map_err(backend!(name))? {
            let (key, value) = entry.map_err(backend!(name))?;
            data.rows
                .insert(key.value().to_string(), serde_json::from_slice(value.value())?);
        }
    }
    let sequences = txn.open_table(SEQUENCES).map_err(backend!("sequences"))?;
    data.next_id = sequences
        .get(name)
        .map_err(backend!("sequences"))?
        .map_or(0, |guard| guard.value());
    Ok(data)
}

fn persist(
    txn: &WriteTransaction,
    name: &str,
    before: Option<&TableData>,
    after: &TableData,
) -> Result<(), StoreError> {
    let empty = TableData::default();
    let before = before.unwrap_or(&empty);
    if before == after {
        return Ok(());
    }
    {
        let mut table = txn.open_table(rows_table(name)).map_err(backend!(name))?;
        for key in before.rows.keys().filter(|key| !after.rows.contains_key(*key)) {
            table.remove(key.as_str()).map_err(backend!(name))?;
        }
        for (key, row) in &after.rows {
            if before.rows.get(key) != Some(row) {
                let bytes = serde_json::to_vec(row)?;
                table
                    .insert(key.as_str(), bytes.as_slice())
                    .map_err(backend!(name))?;
            }
        }
    }
    if before.next_id != after.next_id {
        let mut sequences = txn.open_table(SEQUENCES).map_err(backend!("sequences"))?;
        sequences
            .insert(name, after.next_id)
            .map_err(backend!("sequences"))?;
    }
    Ok(())
}

#[async_trait::async_trait]
impl RelationalStore for DurableStore {
    async fn create(&self, table: &str, row: Row) -> Result<Row, StoreError> {
        let name = self.spec(table)?.name;
        self.blocking(move |store, db| {
            store.write(db, vec![name.to_string()], |schema, tables| {
                let spec = table::spec(schema, name)?;
                table::insert(spec, tables.entry(name.to_string()).or_default(), row)
            })
        })
        .await
    }

    async fn get(&self, table: &str, id: &str) -> Result<Row, StoreError> {
        let name = self.spec(table)?.name;
        let id = id.to_string();
        self.blocking(move |_, db| {
            let txn = db.begin_read().map_err(backend!("begin read"))?;
            let rows = txn.open_table(rows_table(name)).map_err(backend!(name))?;
            match rows.get(id.as_str()).map_err(backend!(name))? {
                Some(guard) => Ok(serde_json::from_slice(guard.value())?),
                None => Err(StoreError::NotFound(format!("{} {}", name, id))),
            }
        })
        .await
    }

    async fn list(&self, table: &str, filters: &[Filter]) -> Result<Vec<Row>, StoreError> {
        let name = self.spec(table)?.name;
        let filters = filters.to_vec();
        self.blocking(move |store, db| {
            let rows = store.read(db, name)?;
            Ok(rows.into_iter().filter(|row| matches_all(&filters, row)).collect())
        })
        .await
    }

    async fn update(&self, table: &str, id: &str, values: Row) -> Result<Row, StoreError> {
        let name = self.spec(table)?.name;
        let id = id.to_string();
        self.blocking(move |store, db| {
            store.write(db, vec![name.to_string()], |schema, tables| {
                let spec = table::spec(schema, name)?;
                table::update_row(spec, tables.entry(name.to_string()).or_default(), &id, values)
            })
        })
        .await
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<u64, StoreError> {
        let name = self.spec(table)?.name;
        let filters = filters.to_vec();
        self.blocking(move |store, db| {
            store.write(db, vec![name.to_string()], |_, tables| {
                Ok(table::delete_rows(tables.entry(name.to_string()).or_default(), &filters))
            })
        })
        .await
    }

    async fn transaction(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        for op in &ops {
            self.spec(table::target(op))?;
        }
        let count = ops.len();
        let names = ops.iter().map(|op| table::target(op).to_string()).collect();
        self.blocking(move |store, db| {
            store.write(db, names, |schema, tables| {
                for op in ops {
                    table::apply(schema, tables, op)?;
                }
                Ok(())
            })
        })
        .await?;
        debug!("Committed transaction with {} ops", count);
        Ok(())
    }
}
