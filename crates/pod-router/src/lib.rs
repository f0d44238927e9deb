//! Pod Router
//!
//! Routes resource operations from the top site to the site services that
//! own them, and keeps the bookkeeping that makes this work across many
//! independently operated sites: the endpoint cache, the top/bottom resource
//! identity mapping, asynchronous jobs and route sets.
//!
//! # Example
//!
//! ```no_run
//! use pod_router::{ClientConfig, PodRouter};
//! use pod_store::{MemoryStore, RequestContext, Site};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), pod_router::RouterError> {
//! let config = ClientConfig::from_env()?;
//! let router = PodRouter::connect(config, Arc::new(MemoryStore::new()))?;
//!
//! let ctx = RequestContext::admin();
//! router.sites().create_site(&ctx, Site::new("pod-0", "RegionOne", "")).await?;
//!
//! // resolves the neutron endpoint of the top site, refreshing the cache on miss
//! let networks = router.dispatcher().list_networks(&ctx, &[]).await?;
//! println!("{} networks", networks.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Endpoint cache**: (site, service) -> URL rows that converge under concurrent writers
//! - **Catalog refresh**: resync the cache from Keystone, skipping unknown or ambiguous regions
//! - **Dispatch**: capability check, endpoint resolution and at most one refresh per call
//! - **Identity routing**: Pending -> Mapped at most once, settled by the store's unique key
//! - **Async jobs**: one New and one Running job per target
//! - **Route sets**: normalized, minimal, atomic replacement of child rows

pub mod config;
pub mod dispatcher;
pub mod endpoint_cache;
pub mod error;
pub mod jobs;
pub mod refresher;
pub mod registry;
pub mod route_set;
pub mod routing;
pub mod sites;

#[cfg(test)]
mod dispatcher_test;
#[cfg(test)]
mod test_utils;

pub use config::ClientConfig;
pub use dispatcher::Dispatcher;
pub use endpoint_cache::{EndpointCache, PutOutcome};
pub use error::RouterError;
pub use jobs::{JobManager, SP_EXTRA_ID};
pub use refresher::{CatalogRefresher, RefreshSummary};
pub use registry::CapabilityRegistry;
pub use route_set::{ChildSet, Normalizer, SetDiff};
pub use routing::{IdentityRouter, RoutingKey, RoutingState};
pub use sites::SiteRegistry;

use keystone_client::{KeystoneClient, KeystoneClientTrait};
use pod_handles::ResourceHandle;
use pod_store::RelationalStore;
use std::sync::Arc;
use tracing::info;

/// All router components wired to one store, catalog authority and handler set
#[derive(Clone)]
pub struct PodRouter {
    config: Arc<ClientConfig>,
    store: Arc<dyn RelationalStore>,
    refresher: CatalogRefresher,
    dispatcher: Dispatcher,
    routing: IdentityRouter,
    jobs: JobManager,
    sites: SiteRegistry,
}

impl PodRouter {
    /// Wire the components. The handler set is fixed from here on.
    pub fn new(
        config: ClientConfig,
        store: Arc<dyn RelationalStore>,
        keystone: Arc<dyn KeystoneClientTrait>,
        handles: Vec<Arc<dyn ResourceHandle>>,
    ) -> Result<Self, RouterError> {
        config.validate()?;
        let config = Arc::new(config);
        let registry = Arc::new(CapabilityRegistry::new(handles)?);
        let refresher = CatalogRefresher::new(keystone, Arc::clone(&store), Arc::clone(&config));
        let dispatcher = Dispatcher::new(registry, refresher.clone(), Arc::clone(&store), Arc::clone(&config));

        Ok(Self {
            routing: IdentityRouter::new(Arc::clone(&store)),
            jobs: JobManager::new(Arc::clone(&store)),
            sites: SiteRegistry::new(Arc::clone(&store)),
            config,
            store,
            refresher,
            dispatcher,
        })
    }

    /// Production wiring: Keystone at `identity_url` and the Neutron, Nova
    /// and Glance handlers
    pub fn connect(config: ClientConfig, store: Arc<dyn RelationalStore>) -> Result<Self, RouterError> {
        let timeout = config.request_timeout();
        let keystone = KeystoneClient::new(config.identity_url.clone(), timeout)?;
        let handles = pod_handles::default_handles(timeout)?;
        info!(
            "Pod router using identity service {} (top site: {}, auto refresh: {})",
            config.identity_url, config.top_site_name, config.auto_refresh_endpoint
        );
        Self::new(config, store, Arc::new(keystone), handles)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn RelationalStore> {
        &self.store
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn refresher(&self) -> &CatalogRefresher {
        &self.refresher
    }

    pub fn endpoints(&self) -> &EndpointCache {
        self.refresher.cache()
    }

    pub fn routing(&self) -> &IdentityRouter {
        &self.routing
    }

    pub fn jobs(&self) -> &JobManager {
        &self.jobs
    }

    pub fn sites(&self) -> &SiteRegistry {
        &self.sites
    }
}
