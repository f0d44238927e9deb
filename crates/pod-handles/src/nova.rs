//! Nova (compute) handler

use crate::common::{declared_resources, find_collection, Collection, SiteHttp};
use crate::error::HandleError;
use crate::handle::ResourceHandle;
use crate::operation::Operations;
use pod_store::{Filter, RequestContext};
use reqwest::Method;
use serde_json::{Map, Value};
use std::time::Duration;

pub const SERVICE_TYPE: &str = "nova";

const COLLECTIONS: &[Collection] = &[
    Collection {
        resource: "flavor",
        path: "/flavors",
        list_path: Some("/flavors/detail"),
        singular: Some("flavor"),
        plural: "flavors",
        operations: Operations::LIST.union(Operations::GET),
    },
    Collection {
        resource: "server",
        path: "/servers",
        list_path: Some("/servers/detail"),
        singular: Some("server"),
        plural: "servers",
        operations: Operations::CRUD,
    },
    Collection {
        resource: "aggregate",
        path: "/os-aggregates",
        list_path: None,
        singular: Some("aggregate"),
        plural: "aggregates",
        operations: Operations::LIST
            .union(Operations::CREATE)
            .union(Operations::DELETE)
            .union(Operations::ACTION),
    },
];

/// Handler for the compute service of a site
#[derive(Debug)]
pub struct NovaHandle {
    http: SiteHttp,
}

impl NovaHandle {
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
impl ResourceHandle for NovaHandle {
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

    /// Aggregate actions: `add_host` and `remove_host`; `body` carries `{"host": ...}`
    async fn handle_action(
        &self,
        ctx: &RequestContext,
        resource: &str,
        action: &str,
        resource_id: &str,
        body: Value,
    ) -> Result<Option<Value>, HandleError> {
        if resource != "aggregate" || !matches!(action, "add_host" | "remove_host") {
            return Err(HandleError::UnsupportedAction {
                resource: resource.to_string(),
                action: action.to_string(),
            });
        }
        let collection = self.collection(resource)?;
        let mut request = Map::new();
        request.insert(action.to_string(), body);
        let response = self
            .http
            .action(ctx, Method::POST, collection, resource_id, "/action", &Value::Object(request))
            .await?;
        Ok(response.map(|mut r| r.get_mut("aggregate").map(Value::take).unwrap_or(r)))
    }
}
