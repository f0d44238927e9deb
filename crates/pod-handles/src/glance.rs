//! Glance (image) handler
//!
//! The image API returns bare objects, so single-object bodies are not wrapped.

use crate::common::{declared_resources, find_collection, Collection, SiteHttp};
use crate::error::HandleError;
use crate::handle::ResourceHandle;
use crate::operation::Operations;
use pod_store::{Filter, RequestContext};
use serde_json::Value;
use std::time::Duration;

pub const SERVICE_TYPE: &str = "glance";

const COLLECTIONS: &[Collection] = &[Collection {
    resource: "image",
    path: "/v2/images",
    list_path: None,
    singular: None,
    plural: "images",
    operations: Operations::LIST.union(Operations::GET),
}];

/// Handler for the image service of a site
#[derive(Debug)]
pub struct GlanceHandle {
    http: SiteHttp,
}

impl GlanceHandle {
    pub fn new(timeout: Duration) -> Result<Self, HandleError> {
        Ok(Self {
            http: SiteHttp::new(SERVICE_TYPE, timeout)?,
        })
    }

    fn collection(&self, resource: &str) -> Result<&'static Collection, HandleError> {
        find_collection(COLLECTIONS, resource)
            .ok_or_else(|| HandleError::Api(format!("{} does not handle {}", SERVICE_TYPE, resource)))
    }
}

#[async_trait::async_trait]
impl ResourceHandle for GlanceHandle {
    fn service_type(&self) -> &str {
        SERVICE_TYPE
    }

    fn support_resource(&self) -> Vec<(&'static str, Operations)> {
        declared_resources(COLLECTIONS)
    }

    fn is_endpoint_url_set(&self) -> bool {
        self.http.is_set()
    }

    fn update_endpoint_url(&self, url: &str) {
        self.http.set(url);
    }

    fn clear_endpoint_url(&self) {
        self.http.clear();
    }

    async fn handle_list(
        &self,
        ctx: &RequestContext,
        resource: &str,
        filters: &[Filter],
    ) -> Result<Vec<Value>, HandleError> {
        self.http.list(ctx, self.collection(resource)?, filters).await
    }

    async fn handle_create(&self, ctx: &RequestContext, resource: &str, body: Value) -> Result<Value, HandleError> {
        self.http.create(ctx, self.collection(resource)?, body).await
    }

    async fn handle_delete(&self, ctx: &RequestContext, resource: &str, resource_id: &str) -> Result<(), HandleError> {
        self.http.delete(ctx, self.collection(resource)?, resource_id).await
    }

    async fn handle_get(
        &self,
        ctx: &RequestContext,
        resource: &str,
        resource_id: &str,
    ) -> Result<Option<Value>, HandleError> {
        self.http.get(ctx, self.collection(resource)?, resource_id).await
    }

    async fn handle_action(
        &self,
        _ctx: &RequestContext,
        resource: &str,
        action: &str,
        _resource_id: &str,
        _body: Value,
    ) -> Result<Option<Value>, HandleError> {
        Err(HandleError::UnsupportedAction {
            resource: resource.to_string(),
            action: action.to_string(),
        })
    }
}
