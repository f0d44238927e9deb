//! Mock ResourceHandle for unit testing
//!
//! Stores created objects in memory, records every call with the endpoint
//! and token it was made with, and can simulate unreachable endpoints.

use crate::error::HandleError;
use crate::handle::ResourceHandle;
use crate::operation::{Operation, Operations};
use pod_store::filter::matches_all;
use pod_store::{Filter, RequestContext};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

/// One call observed by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub operation: Operation,
    pub resource: String,
    /// Endpoint set when the call was made
    pub endpoint: String,
    pub token: Option<String>,
    pub project_id: Option<String>,
}

/// Mock ResourceHandle for testing
#[derive(Clone)]
pub struct MockResourceHandle {
    pub(crate) service_type: String,
    pub(crate) resources: Vec<(&'static str, Operations)>,
    pub(crate) endpoint: Arc<RwLock<Option<String>>>,
    pub(crate) calls: Arc<Mutex<Vec<RecordedCall>>>,
    pub(crate) unreachable: Arc<Mutex<HashSet<String>>>,
    pub(crate) list_results: Arc<Mutex<HashMap<String, Vec<Value>>>>,
    // (resource, id) -> object
    pub(crate) objects: Arc<Mutex<BTreeMap<(String, String), Value>>>,
}

impl MockResourceHandle {
    /// Create a mock handling `resources` for `service_type`
    pub fn new(service_type: impl Into<String>, resources: &[(&'static str, Operations)]) -> Self {
        Self {
            service_type: service_type.into(),
            resources: resources.to_vec(),
            endpoint: Arc::new(RwLock::new(None)),
            calls: Arc::new(Mutex::new(Vec::new())),
            unreachable: Arc::new(Mutex::new(HashSet::new())),
            list_results: Arc::new(Mutex::new(HashMap::new())),
            objects: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// Calls to `url` fail with `EndpointNotAvailable`
    pub fn mark_unreachable(&self, url: &str) {
        self.unreachable.lock().unwrap().insert(url.to_string());
    }

    /// Fixed result for `handle_list` on a resource
    pub fn set_list_result(&self, resource: &str, items: Vec<Value>) {
        self.list_results.lock().unwrap().insert(resource.to_string(), items);
    }

    /// Every call so far, in order
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls for one operation
    pub fn call_count(&self, operation: Operation) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    /// Currently set endpoint
    pub fn endpoint(&self) -> Option<String> {
        self.endpoint.read().unwrap().clone()
    }

    fn record(&self, ctx: &RequestContext, operation: Operation, resource: &str) -> Result<(), HandleError> {
        let endpoint = self
            .endpoint()
            .ok_or_else(|| HandleError::EndpointNotSet(self.service_type.clone()))?;
        self.calls.lock().unwrap().push(RecordedCall {
            operation,
            resource: resource.to_string(),
            endpoint: endpoint.clone(),
            token: ctx.auth_token.clone(),
            project_id: ctx.project_id.clone(),
        });
        if self.unreachable.lock().unwrap().contains(&endpoint) {
            return Err(HandleError::EndpointNotAvailable {
                service: self.service_type.clone(),
                url: endpoint,
                reason: "connection refused".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ResourceHandle for MockResourceHandle {
    fn service_type(&self) -> &str {
        &self.service_type
    }

    fn support_resource(&self) -> Vec<(&'static str, Operations)> {
        self.resources.clone()
    }

    fn is_endpoint_url_set(&self) -> bool {
        self.endpoint.read().unwrap().is_some()
    }

    fn update_endpoint_url(&self, url: &str) {
        *self.endpoint.write().unwrap() = Some(url.to_string());
    }

    fn clear_endpoint_url(&self) {
        *self.endpoint.write().unwrap() = None;
    }

    async fn handle_list(
        &self,
        ctx: &RequestContext,
        resource: &str,
        filters: &[Filter],
    ) -> Result<Vec<Value>, HandleError> {
        self.record(ctx, Operation::List, resource)?;
        if let Some(items) = self.list_results.lock().unwrap().get(resource) {
            return Ok(items.clone());
        }
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|((kind, _), _)| kind == resource)
            .map(|(_, object)| object)
            .filter(|object| object.as_object().is_some_and(|row| matches_all(filters, row)))
            .cloned()
            .collect())
    }

    async fn handle_create(&self, ctx: &RequestContext, resource: &str, mut body: Value) -> Result<Value, HandleError> {
        self.record(ctx, Operation::Create, resource)?;
        let id = uuid::Uuid::new_v4().to_string();
        if let Some(object) = body.as_object_mut() {
            object.entry("id").or_insert_with(|| Value::String(id.clone()));
        }
        let id = body.get("id").and_then(Value::as_str).unwrap_or(&id).to_string();
        self.objects
            .lock()
            .unwrap()
            .insert((resource.to_string(), id), body.clone());
        Ok(body)
    }

    async fn handle_delete(&self, ctx: &RequestContext, resource: &str, resource_id: &str) -> Result<(), HandleError> {
        self.record(ctx, Operation::Delete, resource)?;
        self.objects
            .lock()
            .unwrap()
            .remove(&(resource.to_string(), resource_id.to_string()));
        Ok(())
    }

    async fn handle_get(
        &self,
        ctx: &RequestContext,
        resource: &str,
        resource_id: &str,
    ) -> Result<Option<Value>, HandleError> {
        self.record(ctx, Operation::Get, resource)?;
        Ok(self
            .objects
            .lock()
            .unwrap()
            .get(&(resource.to_string(), resource_id.to_string()))
            .cloned())
    }

    async fn handle_action(
        &self,
        ctx: &RequestContext,
        resource: &str,
        action: &str,
        resource_id: &str,
        body: Value,
    ) -> Result<Option<Value>, HandleError> {
        self.record(ctx, Operation::Action, resource)?;
        Ok(Some(serde_json::json!({
            "resource_id": resource_id,
            "action": action,
            "body": body,
        })))
    }
}
