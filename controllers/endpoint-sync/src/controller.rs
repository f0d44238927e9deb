//! Sync loop
//!
//! Every cycle resyncs the endpoint cache with the admin account. The store
//! file is shared with the API processes, so each cycle sees the sites they
//! registered.
//! Failures back off along a Fibonacci sequence until the next success.

use crate::backoff::FibonacciBackoff;
use crate::error::SyncError;
use crate::metrics::SyncMetrics;
use chrono::Utc;
use keystone_client::KeystoneClientTrait;
use pod_router::{CatalogRefresher, ClientConfig, RefreshSummary};
use pod_store::{DurableStore, RelationalStore, RequestContext};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Settings of the sync loop itself
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub store_path: PathBuf,
    pub interval: Duration,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
}

pub struct Controller {
    config: Arc<ClientConfig>,
    keystone: Arc<dyn KeystoneClientTrait>,
    store: Arc<dyn RelationalStore>,
    settings: SyncSettings,
    metrics: SyncMetrics,
}

impl Controller {
    pub fn new(
        config: ClientConfig,
        keystone: Arc<dyn KeystoneClientTrait>,
        settings: SyncSettings,
        metrics: SyncMetrics,
    ) -> Result<Self, SyncError> {
        config.validate()?;
        if config.admin_credentials().is_none() {
            return Err(SyncError::InvalidConfig(
                "admin_username, admin_password and admin_tenant are required".to_string(),
            ));
        }
        let store = DurableStore::open(&settings.store_path)?;
        Ok(Self {
            config: Arc::new(config),
            keystone,
            store: Arc::new(store),
            settings,
            metrics,
        })
    }

    /// Run one sync and record its outcome
    pub async fn sync_once(&self) -> Result<RefreshSummary, SyncError> {
        let refresher = CatalogRefresher::new(
            Arc::clone(&self.keystone),
            Arc::clone(&self.store),
            Arc::clone(&self.config),
        );
        let ctx = RequestContext::admin();

        match refresher.refresh(&ctx, true).await {
            Ok(summary) => {
                self.metrics.record_success(Utc::now().timestamp());
                Ok(summary)
            }
            Err(e) => {
                self.metrics.record_failure();
                Err(e.into())
            }
        }
    }

    /// Sync forever
    pub async fn run(&self) {
        let mut backoff = FibonacciBackoff::new(self.settings.min_backoff, self.settings.max_backoff);
        info!(
            "Syncing endpoints every {}s into {}",
            self.settings.interval.as_secs(),
            self.settings.store_path.display()
        );

        loop {
            let delay = match self.sync_once().await {
                Ok(summary) => {
                    backoff.reset();
                    if !summary.skipped_pairs.is_empty() {
                        error!(
                            "{} endpoint(s) have duplicate cache rows and need operator attention",
                            summary.skipped_pairs.len()
                        );
                    }
                    self.settings.interval
                }
                Err(e) => {
                    let delay = backoff.next_backoff();
                    error!("Endpoint sync failed: {}. Retrying in {}s", e, delay.as_secs());
                    delay
                }
            };
            tokio::time::sleep(delay).await;
        }
    }
}
