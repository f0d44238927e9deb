//! Pod Handles
//!
//! Site-service handlers used by the cross-pod dispatcher. Each handler owns
//! one service kind in a site (Neutron, Nova, Glance), declares which
//! operations it supports per resource kind, and carries the endpoint slot
//! the dispatcher fills from the endpoint cache.
//!
//! # Example
//!
//! ```no_run
//! use pod_handles::{NeutronHandle, Operation, ResourceHandle};
//! use pod_store::RequestContext;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let neutron = NeutronHandle::new(Duration::from_secs(30))?;
//! assert!(neutron.supports("network", Operation::List));
//!
//! neutron.update_endpoint_url("http://10.1.1.1:9696");
//! let ctx = RequestContext::new().with_token("token", None);
//! let networks = neutron.handle_list(&ctx, "network", &[]).await?;
//! # Ok(())
//! # }
//! ```

pub mod common;
pub mod error;
pub mod glance;
pub mod handle;
pub mod neutron;
pub mod nova;
pub mod operation;
#[cfg(feature = "test-util")]
pub mod mock;

pub use common::{Collection, SiteHttp};
pub use error::HandleError;
pub use glance::GlanceHandle;
pub use handle::{default_handles, ResourceHandle};
pub use neutron::NeutronHandle;
pub use nova::NovaHandle;
pub use operation::{Operation, Operations};
#[cfg(feature = "test-util")]
pub use mock::{MockResourceHandle, RecordedCall};
