//! Endpoint cache
//!
//! Persisted (site, service) -> URL mapping. Presence of a row is the only
//! freshness signal. Writers converge: a concurrent insert of the same key is
//! not an error.

use crate::error::RouterError;
use pod_store::store::{self, row_of};
use pod_store::{CachedEndpoint, Filter, RelationalStore};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// What a [`EndpointCache::put`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// A new row was inserted
    Inserted,
    /// The existing row now carries the new URL
    Updated,
    /// The existing row already carried the URL
    Unchanged,
    /// Another writer inserted the row first
    Converged,
}

/// Cached service endpoints, keyed by (site, service)
#[derive(Clone)]
pub struct EndpointCache {
    store: Arc<dyn RelationalStore>,
}

impl EndpointCache {
    pub fn new(store: Arc<dyn RelationalStore>) -> Self {
        Self { store }
    }

    /// All rows for the key; more than one means the table was written around `put`
    pub async fn lookup(&self, site_id: &str, service: &str) -> Result<Vec<CachedEndpoint>, RouterError> {
        let filters = [Filter::eq("site_id", site_id), Filter::eq("service_type", service)];
        Ok(store::list_models(self.store.as_ref(), &filters).await?)
    }

    /// URL of the service in the site
    pub async fn get(&self, site_id: &str, service: &str) -> Result<String, RouterError> {
        let mut rows = self.lookup(site_id, service).await?;
        if rows.len() > 1 {
            return Err(RouterError::EndpointNotUnique {
                site_id: site_id.to_string(),
                service: service.to_string(),
            });
        }
        rows.pop()
            .map(|row| row.service_url)
            .ok_or_else(|| RouterError::EndpointNotFound {
                site_id: site_id.to_string(),
                service: service.to_string(),
            })
    }

    /// Insert or update the URL of the service in the site
    pub async fn put(&self, site_id: &str, service: &str, url: &str) -> Result<PutOutcome, RouterError> {
        let mut rows = self.lookup(site_id, service).await?;
        if rows.len() > 1 {
            return Err(RouterError::EndpointNotUnique {
                site_id: site_id.to_string(),
                service: service.to_string(),
            });
        }

        if let Some(existing) = rows.pop() {
            if existing.service_url == url {
                return Ok(PutOutcome::Unchanged);
            }
            self.store
                .update(
                    pod_store::schema::CACHED_ENDPOINTS,
                    &existing.service_id,
                    row_of([("service_url", json!(url))]),
                )
                .await?;
            info!(
                "Updated endpoint of {} for site {}: {} -> {}",
                service, site_id, existing.service_url, url
            );
            return Ok(PutOutcome::Updated);
        }

        let endpoint = CachedEndpoint {
            service_id: Uuid::new_v4().to_string(),
            site_id: site_id.to_string(),
            service_type: service.to_string(),
            service_url: url.to_string(),
        };
        match store::create_model(self.store.as_ref(), &endpoint).await {
            Ok(_) => {
                info!("Cached endpoint of {} for site {}: {}", service, site_id, url);
                Ok(PutOutcome::Inserted)
            }
            Err(e) if e.is_duplicate() => {
                debug!(
                    "Endpoint of {} for site {} was cached concurrently: {}",
                    service, site_id, e
                );
                Ok(PutOutcome::Converged)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pod_store::schema::CACHED_ENDPOINTS;
    use crate::test_utils::RacingStore;
    use pod_store::MemoryStore;

    fn cache() -> (MemoryStore, EndpointCache) {
        let store = MemoryStore::new();
        let cache = EndpointCache::new(Arc::new(store.clone()));
        (store, cache)
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let (_, cache) = cache();
        assert!(matches!(
            cache.get("pod-1", "neutron").await,
            Err(RouterError::EndpointNotFound { .. })
        ));

        assert_eq!(cache.put("pod-1", "neutron", "http://a:9696").await.unwrap(), PutOutcome::Inserted);
        assert_eq!(cache.get("pod-1", "neutron").await.unwrap(), "http://a:9696");

        assert_eq!(cache.put("pod-1", "neutron", "http://a:9696").await.unwrap(), PutOutcome::Unchanged);
        assert_eq!(cache.put("pod-1", "neutron", "http://b:9696").await.unwrap(), PutOutcome::Updated);
        assert_eq!(cache.get("pod-1", "neutron").await.unwrap(), "http://b:9696");
        assert_eq!(cache.lookup("pod-1", "neutron").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_rows_are_not_unique() {
        let (store, cache) = cache();
        for id in ["s1", "s2"] {
            let row = row_of([
                ("service_id", json!(id)),
                ("site_id", json!("pod-1")),
                ("service_type", json!("neutron")),
                ("service_url", json!("http://a:9696")),
            ]);
            store.insert_unchecked(CACHED_ENDPOINTS, row).unwrap();
        }

        assert!(matches!(
            cache.get("pod-1", "neutron").await,
            Err(RouterError::EndpointNotUnique { .. })
        ));
        assert!(matches!(
            cache.put("pod-1", "neutron", "http://b:9696").await,
            Err(RouterError::EndpointNotUnique { .. })
        ));
    }

    #[tokio::test]
    async fn test_put_losing_an_insert_race_converges() {
        let store = MemoryStore::new();
        let cache = EndpointCache::new(Arc::new(RacingStore::new(store.clone())));

        let outcome = cache.put("pod-1", "neutron", "http://a:9696").await.unwrap();

        assert_eq!(outcome, PutOutcome::Converged);
        let rows = cache.lookup("pod-1", "neutron").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].service_id, "rival-writer");
        assert_eq!(
            cache.put("pod-1", "neutron", "http://a:9696").await.unwrap(),
            PutOutcome::Unchanged
        );
        assert_eq!(store.row_count(CACHED_ENDPOINTS).unwrap(), 1);
    }
}
