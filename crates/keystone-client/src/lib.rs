//! Keystone Client
//!
//! A client for the Keystone v3 identity API, limited to what the cross-pod
//! router needs from the catalog authority: password authentication for an
//! admin token, and the service and endpoint listings that make up the
//! service catalog.
//!
//! # Example
//!
//! ```no_run
//! use keystone_client::{AdminCredentials, KeystoneClient, KeystoneClientTrait};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = KeystoneClient::new("http://keystone:5000/v3", Duration::from_secs(30))?;
//!
//! let credentials = AdminCredentials::new("admin", "secret", "admin");
//! let issued = client.authenticate(&credentials).await?;
//!
//! // region -> service name -> public url
//! let catalog = client.catalog_map(&issued.token).await?;
//! for (region, services) in &catalog {
//!     println!("{}: {:?}", region, services);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Password authentication**: project-scoped tokens from `POST /auth/tokens`
//! - **Catalog listing**: services and endpoints, following `links.next` pages
//! - **Catalog map**: public endpoints grouped by region and service name
//! - **Mocking**: `MockKeystoneClient` behind the `test-util` feature

pub mod catalog;
pub mod client;
pub mod common;
pub mod error;
#[path = "trait.rs"]
pub mod keystone_trait;
pub mod models;
#[cfg(feature = "test-util")]
pub mod mock;

pub use catalog::{build_catalog_map, CatalogMap};
pub use client::KeystoneClient;
pub use common::HttpClient;
pub use error::KeystoneError;
pub use keystone_trait::KeystoneClientTrait;
pub use models::*;
#[cfg(feature = "test-util")]
pub use mock::MockKeystoneClient;
