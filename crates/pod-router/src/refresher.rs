//! Catalog refresher
//!
//! Pulls region -> service -> URL from the catalog authority and writes every
//! pair whose region names exactly one registered site into the endpoint
//! cache. Unknown or ambiguous regions, and pairs whose cache rows are not
//! unique, are skipped so the rest of the refresh still lands.

use crate::config::ClientConfig;
use crate::endpoint_cache::{EndpointCache, PutOutcome};
use crate::error::RouterError;
use keystone_client::{IssuedToken, KeystoneClientTrait, KeystoneError};
use pod_store::store;
use pod_store::{Filter, RelationalStore, RequestContext, Site};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Counts of what one refresh did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Regions with no or several matching sites
    pub skipped_regions: Vec<String>,
    /// (site, service) pairs whose cache rows are not unique
    pub skipped_pairs: Vec<(String, String)>,
}

impl RefreshSummary {
    fn record(&mut self, outcome: PutOutcome) {
        match outcome {
            PutOutcome::Inserted => self.inserted += 1,
            PutOutcome::Updated => self.updated += 1,
            PutOutcome::Unchanged | PutOutcome::Converged => self.unchanged += 1,
        }
    }
}

/// Reconciles the catalog authority into the endpoint cache
#[derive(Clone)]
pub struct CatalogRefresher {
    keystone: Arc<dyn KeystoneClientTrait>,
    store: Arc<dyn RelationalStore>,
    cache: EndpointCache,
    config: Arc<ClientConfig>,
}

impl CatalogRefresher {
    pub fn new(
        keystone: Arc<dyn KeystoneClientTrait>,
        store: Arc<dyn RelationalStore>,
        config: Arc<ClientConfig>,
    ) -> Self {
        Self {
            keystone,
            cache: EndpointCache::new(Arc::clone(&store)),
            store,
            config,
        }
    }

    /// Mint an admin token with the configured admin credentials
    pub async fn admin_token(&self) -> Result<IssuedToken, RouterError> {
        let credentials = self.config.admin_credentials().ok_or_else(|| {
            RouterError::InvalidConfig("admin credentials are required for internal refresh".to_string())
        })?;
        debug!("Requesting admin token from {}", self.keystone.identity_url());
        Ok(self.keystone.authenticate(&credentials).await?)
    }

    /// Resync the endpoint cache from the catalog.
    ///
    /// With `use_internal_credential` the configured admin account is used,
    /// otherwise the token carried by `ctx`.
    pub async fn refresh(
        &self,
        ctx: &RequestContext,
        use_internal_credential: bool,
    ) -> Result<RefreshSummary, RouterError> {
        let token = if use_internal_credential {
            self.admin_token().await?.token
        } else {
            ctx.auth_token
                .clone()
                .filter(|t| !t.is_empty())
                .ok_or_else(|| {
                    RouterError::Keystone(KeystoneError::Authentication(
                        "request context carries no token".to_string(),
                    ))
                })?
        };

        let catalog = self.keystone.catalog_map(&token).await?;
        let mut summary = RefreshSummary::default();

        for (region, services) in &catalog {
            let sites: Vec<Site> =
                store::list_models(self.store.as_ref(), &[Filter::eq("site_name", region.as_str())]).await?;
            let site = match sites.as_slice() {
                [site] => site,
                [] => {
                    debug!("Region {} has no registered site, skipping", region);
                    summary.skipped_regions.push(region.clone());
                    continue;
                }
                _ => {
                    warn!("Region {} matches {} sites, skipping", region, sites.len());
                    summary.skipped_regions.push(region.clone());
                    continue;
                }
            };

            for (service, url) in services {
                match self.cache.put(&site.site_id, service, url).await {
                    Ok(outcome) => summary.record(outcome),
                    Err(RouterError::EndpointNotUnique { site_id, service }) => {
                        warn!(
                            "Endpoint of {} for site {} is not unique, skipping",
                            service, site_id
                        );
                        summary.skipped_pairs.push((site_id, service));
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        info!(
            "[{}] Refreshed endpoints: {} inserted, {} updated, {} unchanged, {} regions skipped",
            ctx.request_id,
            summary.inserted,
            summary.updated,
            summary.unchanged,
            summary.skipped_regions.len()
        );
        Ok(summary)
    }

    /// Admin entry point: resync using the caller's own token
    pub async fn update_endpoint_from_catalog(&self, ctx: &RequestContext) -> Result<RefreshSummary, RouterError> {
        self.refresh(ctx, false).await
    }

    pub fn cache(&self) -> &EndpointCache {
        &self.cache
    }
}
