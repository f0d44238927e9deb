//! ResourceHandle trait
//!
//! One implementation per backend service family. The dispatcher is generic
//! over this trait and never inspects concrete handler types.

use crate::error::HandleError;
use crate::glance::GlanceHandle;
use crate::neutron::NeutronHandle;
use crate::nova::NovaHandle;
use crate::operation::{Operation, Operations};
use pod_store::{Filter, RequestContext};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// A site-service handler
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait ResourceHandle: Send + Sync {
    /// Service kind this handler talks to (e.g. "neutron")
    fn service_type(&self) -> &str;

    /// Resource kinds handled and the operations each supports
    fn support_resource(&self) -> Vec<(&'static str, Operations)>;

    /// True once the dispatcher has set an endpoint
    fn is_endpoint_url_set(&self) -> bool;

    /// Point the handler at a resolved endpoint
    fn update_endpoint_url(&self, url: &str);

    /// Forget the endpoint so the next call re-resolves it
    fn clear_endpoint_url(&self);

    /// True when `resource` is handled here and supports `operation`
    fn supports(&self, resource: &str, operation: Operation) -> bool {
        self.support_resource()
            .iter()
            .any(|(name, ops)| *name == resource && ops.contains(operation))
    }

    async fn handle_list(
        &self,
        ctx: &RequestContext,
        resource: &str,
        filters: &[Filter],
    ) -> Result<Vec<Value>, HandleError>;

    async fn handle_create(&self, ctx: &RequestContext, resource: &str, body: Value) -> Result<Value, HandleError>;

    async fn handle_delete(&self, ctx: &RequestContext, resource: &str, resource_id: &str) -> Result<(), HandleError>;

    /// `Ok(None)` when the resource does not exist
    async fn handle_get(
        &self,
        ctx: &RequestContext,
        resource: &str,
        resource_id: &str,
    ) -> Result<Option<Value>, HandleError>;

    async fn handle_action(
        &self,
        ctx: &RequestContext,
        resource: &str,
        action: &str,
        resource_id: &str,
        body: Value,
    ) -> Result<Option<Value>, HandleError>;
}

/// The Neutron, Nova and Glance handlers, sharing one request timeout
pub fn default_handles(timeout: Duration) -> Result<Vec<Arc<dyn ResourceHandle>>, HandleError> {
    Ok(vec![
        Arc::new(NeutronHandle::new(timeout)?),
        Arc::new(NovaHandle::new(timeout)?),
        Arc::new(GlanceHandle::new(timeout)?),
    ])
}
