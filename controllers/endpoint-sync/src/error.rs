//! Endpoint sync error types.

use keystone_client::KeystoneError;
use pod_router::RouterError;
use pod_store::StoreError;
use thiserror::Error;

/// Errors that can occur in the endpoint sync controller.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Router error (refresh, configuration)
    #[error("Router error: {0}")]
    Router(#[from] RouterError),

    /// Keystone client construction error
    #[error("Keystone error: {0}")]
    Keystone(#[from] KeystoneError),

    /// Store file could not be opened
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Metrics registration error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Health server I/O error
    #[error("Health server error: {0}")]
    Io(#[from] std::io::Error),
}
