//! Site registry

use crate::error::RouterError;
use pod_store::schema::{CACHED_ENDPOINTS, RESOURCE_ROUTINGS, SITES};
use pod_store::store;
use pod_store::{Filter, RelationalStore, RequestContext, Site, StoreError, WriteOp};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct SiteRegistry {
    store: Arc<dyn RelationalStore>,
}

impl SiteRegistry {
    pub fn new(store: Arc<dyn RelationalStore>) -> Self {
        Self { store }
    }

    /// Register a site; its name must match the catalog region name
    pub async fn create_site(&self, ctx: &RequestContext, site: Site) -> Result<Site, RouterError> {
        match store::create_model(self.store.as_ref(), &site).await {
            Ok(site) => {
                info!("[{}] Created site {} (ID: {})", ctx.request_id, site.site_name, site.site_id);
                Ok(site)
            }
            Err(e) if e.is_duplicate() => Err(RouterError::SiteExists(site.site_name)),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_site(&self, site_id: &str) -> Result<Site, RouterError> {
        match store::get_model(self.store.as_ref(), site_id).await {
            Ok(site) => Ok(site),
            Err(StoreError::NotFound(_)) => Err(RouterError::SiteNotFound(site_id.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_site_by_name(&self, site_name: &str) -> Result<Option<Site>, RouterError> {
        let sites: Vec<Site> = store::list_models(self.store.as_ref(), &[Filter::eq("site_name", site_name)]).await?;
        Ok(sites.into_iter().next())
    }

    pub async fn list_sites(&self, filters: &[Filter]) -> Result<Vec<Site>, RouterError> {
        Ok(store::list_models(self.store.as_ref(), filters).await?)
    }

    /// Remove a site together with its cached endpoints and routings
    pub async fn delete_site(&self, ctx: &RequestContext, site_id: &str) -> Result<(), RouterError> {
        let site = self.get_site(site_id).await?;
        let ops = vec![
            WriteOp::delete(CACHED_ENDPOINTS, vec![Filter::eq("site_id", site_id)]),
            WriteOp::delete(RESOURCE_ROUTINGS, vec![Filter::eq("site_id", site_id)]),
            WriteOp::delete(SITES, vec![Filter::eq("site_id", site_id)]),
        ];
        self.store.transaction(ops).await?;
        info!("[{}] Deleted site {} (ID: {})", ctx.request_id, site.site_name, site_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint_cache::EndpointCache;
    use crate::routing::{IdentityRouter, RoutingKey};
    use pod_store::MemoryStore;

    #[tokio::test]
    async fn test_duplicate_site_name_is_rejected() {
        let sites = SiteRegistry::new(Arc::new(MemoryStore::new()));
        let ctx = RequestContext::admin();
        sites.create_site(&ctx, Site::new("pod-1", "RegionOne", "")).await.unwrap();

        let err = sites
            .create_site(&ctx, Site::new("pod-2", "RegionOne", "az1"))
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::SiteExists(name) if name == "RegionOne"));
    }

    #[tokio::test]
    async fn test_get_site_and_lookup_by_name() {
        let sites = SiteRegistry::new(Arc::new(MemoryStore::new()));
        let ctx = RequestContext::admin();
        sites
            .create_site(&ctx, Site::new("pod-1", "RegionOne", "az1").with_dc("dc1"))
            .await
            .unwrap();

        assert_eq!(sites.get_site("pod-1").await.unwrap().dc_name.as_deref(), Some("dc1"));
        assert!(matches!(sites.get_site("pod-9").await, Err(RouterError::SiteNotFound(_))));
        assert!(sites.get_site_by_name("RegionOne").await.unwrap().is_some());
        assert!(sites.get_site_by_name("RegionTwo").await.unwrap().is_none());
        assert_eq!(sites.list_sites(&[Filter::eq("az_name", "az1")]).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_site_removes_dependent_rows() {
        let db: Arc<dyn RelationalStore> = Arc::new(MemoryStore::new());
        let sites = SiteRegistry::new(Arc::clone(&db));
        let cache = EndpointCache::new(Arc::clone(&db));
        let router = IdentityRouter::new(Arc::clone(&db));
        let ctx = RequestContext::admin();

        sites.create_site(&ctx, Site::new("pod-1", "RegionOne", "az1")).await.unwrap();
        sites.create_site(&ctx, Site::new("pod-2", "RegionTwo", "az2")).await.unwrap();
        cache.put("pod-1", "neutron", "http://10.0.0.1:9696").await.unwrap();
        cache.put("pod-2", "neutron", "http://10.0.0.2:9696").await.unwrap();
        router.ensure_pending(&ctx, &RoutingKey::new("net-1", "pod-1", "network"), None).await.unwrap();

        sites.delete_site(&ctx, "pod-1").await.unwrap();

        assert!(sites.get_site_by_name("RegionOne").await.unwrap().is_none());
        assert!(cache.lookup("pod-1", "neutron").await.unwrap().is_empty());
        assert_eq!(cache.get("pod-2", "neutron").await.unwrap(), "http://10.0.0.2:9696");
        assert!(router.find(&RoutingKey::new("net-1", "pod-1", "network")).await.unwrap().is_none());
    }
}
