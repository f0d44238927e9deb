//! KeystoneClient trait for mocking
//!
//! The concrete `KeystoneClient` implements this trait; tests use
//! `MockKeystoneClient` instead of a running identity service.

use crate::catalog::{build_catalog_map, CatalogMap};
use crate::error::KeystoneError;
use crate::models::*;

/// Trait for identity/catalog authority operations
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait KeystoneClientTrait: Send + Sync {
    /// Get the identity URL
    fn identity_url(&self) -> &str;

    /// Issue a project-scoped token with password credentials
    async fn authenticate(&self, credentials: &AdminCredentials) -> Result<IssuedToken, KeystoneError>;

    /// List every catalog service
    async fn list_services(&self, token: &str) -> Result<Vec<Service>, KeystoneError>;

    /// List catalog endpoints
    async fn list_endpoints(&self, token: &str) -> Result<Vec<Endpoint>, KeystoneError>;

    /// Fetch the catalog as region -> service name -> public URL
    async fn catalog_map(&self, token: &str) -> Result<CatalogMap, KeystoneError> {
        let services = self.list_services(token).await?;
        let endpoints = self.list_endpoints(token).await?;
        Ok(build_catalog_map(&services, &endpoints))
    }
}
