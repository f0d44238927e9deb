//! Common utilities for the Keystone client
//!
//! Request plumbing shared by every identity API call.

use crate::error::KeystoneError;
use crate::models::Links;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

/// Header carrying the caller's token
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";
/// Header carrying a newly issued token
pub const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";

/// HTTP client wrapper bound to one identity URL
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
}

impl HttpClient {
    /// Create a new HTTP client wrapper
    pub fn new(client: Client, base_url: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a full URL from a path
    pub fn build_url(&self, path: &str) -> String {
        if path.starts_with("http") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    /// Make an authenticated GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str, token: &str) -> Result<T, KeystoneError> {
        let url = self.build_url(path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .header(AUTH_TOKEN_HEADER, token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(KeystoneError::Http)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return Err(KeystoneError::Authentication(format!(
                "GET {} rejected: {} - {}",
                path, status, body
            )));
        }
        if status == StatusCode::NOT_FOUND {
            let body = response.text().await.unwrap_or_default();
            return Err(KeystoneError::NotFound(format!(
                "Resource not found: {} - {}",
                path, body
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(KeystoneError::Api(format!(
                "GET {} failed: {} - {}",
                path, status, body
            )));
        }

        response.json().await.map_err(KeystoneError::Http)
    }

    /// Fetch every page of a v3 collection, following `links.next`
    pub async fn fetch_all_pages<T: DeserializeOwned>(
        &self,
        path: &str,
        collection: &str,
        token: &str,
    ) -> Result<Vec<T>, KeystoneError> {
        let mut all_results = Vec::new();
        let mut next = Some(path.to_string());

        while let Some(page_path) = next.take() {
            debug!("Fetching page: {}", page_path);
            let mut page: Value = self.get(&page_path, token).await?;

            let items = page
                .get_mut(collection)
                .map(Value::take)
                .ok_or_else(|| {
                    KeystoneError::Api(format!(
                        "response to {} has no '{}' collection",
                        page_path, collection
                    ))
                })?;
            let items: Vec<T> = serde_json::from_value(items)?;
            all_results.extend(items);

            let links: Links = page
                .get_mut("links")
                .map(Value::take)
                .map(serde_json::from_value)
                .transpose()?
                .unwrap_or_default();
            next = links.next.map(|n| self.build_url(&n));
        }

        Ok(all_results)
    }

    /// POST a password authentication request; returns the issued token and the response body
    pub async fn post_auth<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &Value,
    ) -> Result<(String, T), KeystoneError> {
        let url = self.build_url(path);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(KeystoneError::Http)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            let body_text = response.text().await.unwrap_or_default();
            return Err(KeystoneError::Authentication(format!(
                "POST {} rejected: {}",
                path, body_text
            )));
        }
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(KeystoneError::Api(format!(
                "POST {} failed: {} - {}",
                path, status, body_text
            )));
        }

        let token = response
            .headers()
            .get(SUBJECT_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                KeystoneError::Authentication(format!("{} header missing from response", SUBJECT_TOKEN_HEADER))
            })?;

        let parsed = response.json().await.map_err(KeystoneError::Http)?;
        Ok((token, parsed))
    }

    /// Build query string from filters
    pub fn build_query_string(&self, filters: &[(&str, &str)]) -> String {
        filters
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}
