//! Neutron (networking) handler

use crate::common::{declared_resources, find_collection, Collection, SiteHttp};
use crate::error::HandleError;
use crate::handle::ResourceHandle;
use crate::operation::Operations;
use pod_store::{Filter, RequestContext};
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;

pub const SERVICE_TYPE: &str = "neutron";

const fn collection(
    resource: &'static str,
    path: &'static str,
    plural: &'static str,
    operations: Operations,
) -> Collection {
    Collection {
        resource,
        path,
        list_path: None,
        singular: Some(resource),
        plural,
        operations,
    }
}

const COLLECTIONS: &[Collection] = &[
    collection("network", "/v2.0/networks", "networks", Operations::CRUD),
    collection("subnet", "/v2.0/subnets", "subnets", Operations::CRUD),
    collection("port", "/v2.0/ports", "ports", Operations::CRUD),
    collection(
        "router",
        "/v2.0/routers",
        "routers",
        Operations::CRUD.union(Operations::ACTION),
    ),
    collection(
        "security_group",
        "/v2.0/security-groups",
        "security_groups",
        Operations::LIST.union(Operations::CREATE).union(Operations::GET),
    ),
    collection(
        "security_group_rule",
        "/v2.0/security-group-rules",
        "security_group_rules",
        Operations::LIST.union(Operations::CREATE).union(Operations::DELETE),
    ),
    collection("floatingip", "/v2.0/floatingips", "floatingips", Operations::CRUD),
];

/// Handler for the networking service of a site
#[derive(Debug)]
pub struct NeutronHandle {
    http: SiteHttp,
}

impl NeutronHandle {
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
impl ResourceHandle for NeutronHandle {
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

    /// Router actions: `add_interface` and `remove_interface`
    async fn handle_action(
        &self,
        ctx: &RequestContext,
        resource: &str,
        action: &str,
        resource_id: &str,
        body: Value,
    ) -> Result<Option<Value>, HandleError> {
        let suffix = match (resource, action) {
            ("router", "add_interface") => "/add_router_interface",
            ("router", "remove_interface") => "/remove_router_interface",
            _ => {
                return Err(HandleError::UnsupportedAction {
                    resource: resource.to_string(),
                    action: action.to_string(),
                })
            }
        };
        let collection = self.collection(resource)?;
        self.http
            .action(ctx, Method::PUT, collection, resource_id, suffix, &body)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::Operation;

    #[test]
    fn test_capabilities() {
        let neutron = NeutronHandle::new(Duration::from_secs(1)).unwrap();
        assert_eq!(neutron.service_type(), "neutron");
        assert!(neutron.supports("network", Operation::List));
        assert!(neutron.supports("router", Operation::Action));
        assert!(!neutron.supports("network", Operation::Action));
        assert!(!neutron.supports("security_group", Operation::Delete));
        assert!(!neutron.supports("server", Operation::List));
    }

    #[tokio::test]
    async fn test_unknown_action_is_rejected() {
        let neutron = NeutronHandle::new(Duration::from_secs(1)).unwrap();
        neutron.update_endpoint_url("http://127.0.0.1:9696");
        let err = neutron
            .handle_action(&RequestContext::new(), "router", "reboot", "r1", Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, HandleError::UnsupportedAction { .. }));
    }

    #[tokio::test]
    async fn test_calls_fail_without_endpoint() {
        let neutron = NeutronHandle::new(Duration::from_secs(1)).unwrap();
        let err = neutron
            .handle_list(&RequestContext::new(), "network", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, HandleError::EndpointNotSet(_)));
    }
}
