//! Keystone client errors

use thiserror::Error;

/// Errors that can occur when talking to the identity service
#[derive(Debug, Error)]
pub enum KeystoneError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Keystone returned an error
    #[error("Keystone API error: {0}")]
    Api(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Authentication failed (bad credentials, expired or missing token)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request (e.g., malformed identity URL)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl KeystoneError {
    /// True for connect failures and timeouts
    pub fn is_transport(&self) -> bool {
        matches!(self, KeystoneError::Http(e) if e.is_connect() || e.is_timeout())
    }
}
