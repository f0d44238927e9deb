//! Pod Store
//!
//! The relational row interface consumed by the cross-pod router, together
//! with the table schema and typed row models it persists.
//!
//! # Example
//!
//! ```no_run
//! use pod_store::{Filter, MemoryStore, RelationalStore, Site, store};
//!
//! # async fn example() -> Result<(), pod_store::StoreError> {
//! let db = MemoryStore::new();
//! let site = Site::new("pod-1", "RegionOne", "az1");
//! store::create_model(&db, &site).await?;
//!
//! let found: Vec<Site> =
//!     store::list_models(&db, &[Filter::eq("site_name", "RegionOne")]).await?;
//! assert_eq!(found.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Filtered CRUD**: `{key, comparator, value}` filters with `eq` / `ne`
//! - **Duplicate detection**: primary keys and unique constraints surface as
//!   [`StoreError::DuplicateEntry`]
//! - **Atomic batches**: [`RelationalStore::transaction`] applies all writes or none
//! - **Durable tables**: [`DurableStore`] keeps the tables in a redb file that
//!   several processes can share; [`MemoryStore`] is the in-process variant

pub mod context;
pub mod durable;
pub mod error;
pub mod filter;
pub mod memory;
pub mod models;
pub mod schema;
pub mod store;
mod table;

pub use context::RequestContext;
pub use durable::DurableStore;
pub use error::StoreError;
pub use filter::{Comparator, Filter};
pub use memory::MemoryStore;
pub use models::*;
pub use schema::TableSpec;
pub use store::{RelationalStore, Row, WriteOp};
