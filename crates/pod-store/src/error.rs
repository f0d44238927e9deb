//! Store errors

use thiserror::Error;

/// Errors that can occur when reading or writing rows
#[derive(Debug, Error)]
pub enum StoreError {
    /// A primary key or unique constraint rejected the write
    #[error("Duplicate entry in {table} on ({constraint})")]
    DuplicateEntry {
        /// Table the write targeted
        table: String,
        /// Columns of the violated constraint
        constraint: String,
    },

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Table is not part of the schema
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// Row is missing key columns or has the wrong shape
    #[error("Invalid row: {0}")]
    InvalidRow(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Storage backend failure (I/O, poisoned lock)
    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// True when the error is a duplicate-key violation.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::DuplicateEntry { .. })
    }
}
