//! Health server
//!
//! `/healthz` answers as long as the process runs, `/readyz` once a catalog
//! sync has succeeded, and `/metrics` exposes the Prometheus registry.

use crate::error::SyncError;
use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Sync counters, registered on a private registry
#[derive(Clone)]
pub struct SyncMetrics {
    registry: Registry,
    refresh_total: IntCounterVec,
    last_success: IntGauge,
}

impl SyncMetrics {
    pub fn new() -> Result<Self, SyncError> {
        let registry = Registry::new();
        let refresh_total = IntCounterVec::new(
            Opts::new("endpoint_sync_refresh_total", "Catalog syncs by result"),
            &["result"],
        )?;
        let last_success = IntGauge::new(
            "endpoint_sync_last_success",
            "Unix time of the last successful catalog sync",
        )?;
        registry.register(Box::new(refresh_total.clone()))?;
        registry.register(Box::new(last_success.clone()))?;
        Ok(Self {
            registry,
            refresh_total,
            last_success,
        })
    }

    pub fn record_success(&self, at_unix: i64) {
        self.refresh_total.with_label_values(&["success"]).inc();
        self.last_success.set(at_unix);
    }

    pub fn record_failure(&self) {
        self.refresh_total.with_label_values(&["failure"]).inc();
    }

    pub fn refresh_count(&self, result: &str) -> u64 {
        self.refresh_total.with_label_values(&[result]).get()
    }

    /// True once any sync succeeded
    pub fn is_ready(&self) -> bool {
        self.last_success.get() > 0
    }

    /// Text exposition of every registered metric
    pub fn render(&self) -> Result<String, SyncError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| SyncError::InvalidConfig(format!("metrics are not UTF-8: {}", e)))
    }
}

async fn healthz() -> &'static str {
    "ok"
}

async fn readyz(State(metrics): State<SyncMetrics>) -> impl IntoResponse {
    if metrics.is_ready() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "no successful sync yet")
    }
}

async fn metrics_handler(State(metrics): State<SyncMetrics>) -> axum::response::Response {
    match metrics.render() {
        Ok(body) => ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response(),
        Err(e) => {
            error!("Failed to render metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub fn router(metrics: SyncMetrics) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(metrics)
}

/// Serve the health endpoints until the process exits
pub async fn serve(addr: SocketAddr, metrics: SyncMetrics) -> Result<(), SyncError> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Health server listening on {}", addr);
    axum::serve(listener, router(metrics)).await?;
    Ok(())
}
