//! Common utilities for site-service handlers
//!
//! `SiteHttp` holds the endpoint slot and the request plumbing shared by the
//! REST handlers; `Collection` describes one REST collection.

use crate::error::HandleError;
use crate::operation::Operations;
use pod_store::filter::{matches_all, Comparator};
use pod_store::{Filter, RequestContext};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tracing::debug;

/// Header carrying the caller's token
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// One REST collection of a site service
#[derive(Debug, Clone, Copy)]
pub struct Collection {
    /// Resource kind (e.g. "security_group")
    pub resource: &'static str,
    /// Collection path relative to the endpoint (e.g. "/v2.0/security-groups")
    pub path: &'static str,
    /// Path used for listing when it differs (e.g. "/servers/detail")
    pub list_path: Option<&'static str>,
    /// Key wrapping a single object; `None` when bodies are bare
    pub singular: Option<&'static str>,
    /// Key wrapping the list response
    pub plural: &'static str,
    pub operations: Operations,
}

impl Collection {
    fn item_path(&self, id: &str) -> String {
        format!("{}/{}", self.path, urlencoding::encode(id))
    }

    fn wrap(&self, body: Value) -> Value {
        match self.singular {
            Some(key) => {
                let mut wrapped = serde_json::Map::new();
                wrapped.insert(key.to_string(), body);
                Value::Object(wrapped)
            }
            None => body,
        }
    }

    fn unwrap(&self, mut body: Value) -> Value {
        match self.singular {
            Some(key) => body.get_mut(key).map(Value::take).unwrap_or(body),
            None => body,
        }
    }
}

/// Find a collection by resource kind
pub fn find_collection<'a>(collections: &'a [Collection], resource: &str) -> Option<&'a Collection> {
    collections.iter().find(|c| c.resource == resource)
}

/// Capability declaration of a collection table
pub fn declared_resources(collections: &[Collection]) -> Vec<(&'static str, Operations)> {
    collections.iter().map(|c| (c.resource, c.operations)).collect()
}

/// Equality filters with a scalar value, rendered as a query string
pub fn build_query_string(filters: &[Filter]) -> String {
    filters
        .iter()
        .filter(|f| f.comparator == Comparator::Eq)
        .filter_map(|f| f.value_as_param().map(|v| (f.key.as_str(), v)))
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(&v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Keep the listed objects passing every `Ne` filter.
///
/// Only `Ne` filters are checked here: equality filters were sent to the
/// server, which may also accept keys the objects never carry (`fields`,
/// `limit`) or match values of another JSON type.
pub fn apply_ne_filters(items: Vec<Value>, filters: &[Filter]) -> Vec<Value> {
    let ne: Vec<Filter> = filters
        .iter()
        .filter(|f| f.comparator == Comparator::Ne)
        .cloned()
        .collect();
    if ne.is_empty() {
        return items;
    }
    items
        .into_iter()
        .filter(|item| item.as_object().is_some_and(|row| matches_all(&ne, row)))
        .collect()
}

/// Endpoint slot and HTTP plumbing of one handler
#[derive(Debug)]
pub struct SiteHttp {
    service: &'static str,
    client: Client,
    endpoint: RwLock<Option<String>>,
}

impl SiteHttp {
    pub fn new(service: &'static str, timeout: Duration) -> Result<Self, HandleError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(HandleError::Http)?;
        Ok(Self {
            service,
            client,
            endpoint: RwLock::new(None),
        })
    }

    pub fn service(&self) -> &'static str {
        self.service
    }

    pub fn endpoint(&self) -> Result<String, HandleError> {
        self.endpoint
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| HandleError::EndpointNotSet(self.service.to_string()))
    }

    pub fn is_set(&self) -> bool {
        self.endpoint
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn set(&self, url: &str) {
        let url = url.trim_end_matches('/').to_string();
        debug!("Updated endpoint of {} to {}", self.service, url);
        *self.endpoint.write().unwrap_or_else(PoisonError::into_inner) = Some(url);
    }

    pub fn clear(&self) {
        *self.endpoint.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn send_error(&self, url: &str, e: reqwest::Error) -> HandleError {
        if e.is_connect() || e.is_timeout() {
            HandleError::EndpointNotAvailable {
                service: self.service.to_string(),
                url: url.to_string(),
                reason: e.to_string(),
            }
        } else {
            HandleError::Http(e)
        }
    }

    /// Send a request; `Ok(None)` on 404
    async fn send(
        &self,
        ctx: &RequestContext,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Option<Value>, HandleError> {
        let endpoint = self.endpoint()?;
        let url = format!("{}{}", endpoint, path);
        debug!("{} {}", method, url);

        let mut request = self
            .client
            .request(method.clone(), &url)
            .header("Accept", "application/json");
        if let Some(token) = ctx.auth_token.as_deref() {
            request = request.header(AUTH_TOKEN_HEADER, token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| self.send_error(&endpoint, e))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(HandleError::Api(format!(
                "{} {} failed: {} - {}",
                method, path, status, body_text
            )));
        }

        let text = response.text().await.map_err(|e| self.send_error(&endpoint, e))?;
        if text.trim().is_empty() {
            return Ok(Some(Value::Null));
        }
        Ok(Some(serde_json::from_str(&text)?))
    }

    /// List a collection; equality filters go to the server, `Ne` filters are applied locally
    pub async fn list(
        &self,
        ctx: &RequestContext,
        collection: &Collection,
        filters: &[Filter],
    ) -> Result<Vec<Value>, HandleError> {
        let base = collection.list_path.unwrap_or(collection.path);
        let query = build_query_string(filters);
        let path = if query.is_empty() {
            base.to_string()
        } else {
            format!("{}?{}", base, query)
        };

        let mut body = self
            .send(ctx, Method::GET, &path, None)
            .await?
            .ok_or_else(|| HandleError::Api(format!("GET {} returned 404", path)))?;
        let items = match body.get_mut(collection.plural).map(Value::take) {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(HandleError::Api(format!(
                    "response to GET {} has no '{}' list",
                    path, collection.plural
                )))
            }
        };

        Ok(apply_ne_filters(items, filters))
    }

    pub async fn create(&self, ctx: &RequestContext, collection: &Collection, body: Value) -> Result<Value, HandleError> {
        let response = self
            .send(ctx, Method::POST, collection.path, Some(&collection.wrap(body)))
            .await?
            .ok_or_else(|| HandleError::Api(format!("POST {} returned 404", collection.path)))?;
        Ok(collection.unwrap(response))
    }

    pub async fn get(&self, ctx: &RequestContext, collection: &Collection, id: &str) -> Result<Option<Value>, HandleError> {
        Ok(self
            .send(ctx, Method::GET, &collection.item_path(id), None)
            .await?
            .map(|body| collection.unwrap(body)))
    }

    /// Delete by id; a missing resource counts as deleted
    pub async fn delete(&self, ctx: &RequestContext, collection: &Collection, id: &str) -> Result<(), HandleError> {
        self.send(ctx, Method::DELETE, &collection.item_path(id), None).await?;
        Ok(())
    }

    /// Send an action request to `{collection}/{id}{suffix}`
    pub async fn action(
        &self,
        ctx: &RequestContext,
        method: Method,
        collection: &Collection,
        id: &str,
        suffix: &str,
        body: &Value,
    ) -> Result<Option<Value>, HandleError> {
        let path = format!("{}{}", collection.item_path(id), suffix);
        self.send(ctx, method, &path, Some(body)).await
    }
}
