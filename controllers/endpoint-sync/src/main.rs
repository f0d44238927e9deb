//! Endpoint Sync
//!
//! Periodically resyncs the pod router's endpoint cache with the Keystone
//! catalog so request-path refreshes stay rare, and exposes health and
//! Prometheus metrics for the deployment.

mod backoff;
mod controller;
mod error;
mod metrics;

use crate::controller::{Controller, SyncSettings};
use crate::error::SyncError;
use crate::metrics::SyncMetrics;
use keystone_client::KeystoneClient;
use pod_router::ClientConfig;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn env_or<T: FromStr>(name: &str, default: T) -> Result<T, SyncError> {
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|_| SyncError::InvalidConfig(format!("{} is not valid: {}", name, value))),
        Err(_) => Ok(default),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Endpoint Sync");

    // Load configuration from environment variables
    let config = ClientConfig::from_env()?;
    let settings = SyncSettings {
        store_path: PathBuf::from(env::var("STORE_PATH").unwrap_or_else(|_| "pod-router.redb".to_string())),
        interval: Duration::from_secs(env_or("SYNC_INTERVAL_SECS", 300u64)?),
        min_backoff: Duration::from_secs(env_or("SYNC_MIN_BACKOFF_SECS", 15u64)?),
        max_backoff: Duration::from_secs(env_or("SYNC_MAX_BACKOFF_SECS", 600u64)?),
    };
    let health_addr: SocketAddr = env_or("HEALTH_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?;

    info!("Configuration:");
    info!("  Identity URL: {}", config.identity_url);
    info!("  Store: {}", settings.store_path.display());
    info!("  Interval: {}s", settings.interval.as_secs());
    info!("  Health address: {}", health_addr);

    let keystone = KeystoneClient::new(config.identity_url.clone(), config.request_timeout())?;
    let sync_metrics = SyncMetrics::new()?;
    let controller = Controller::new(config, Arc::new(keystone), settings, sync_metrics.clone())?;

    tokio::select! {
        result = metrics::serve(health_addr, sync_metrics) => {
            if let Err(e) = &result {
                error!("Health server stopped: {}", e);
            }
            result?;
        }
        () = controller.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    Ok(())
}
