//! Keystone API client
//!
//! Implements the calls the router makes against Keystone v3:
//! `POST /auth/tokens`, `GET /services` and `GET /endpoints`.

use crate::common::HttpClient;
use crate::error::KeystoneError;
use crate::keystone_trait::KeystoneClientTrait;
use crate::models::*;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Keystone API client
#[derive(Debug, Clone)]
pub struct KeystoneClient {
    http: HttpClient,
}

impl KeystoneClient {
    /// Create a new Keystone client
    ///
    /// # Arguments
    /// * `identity_url` - Keystone v3 base URL (e.g., "http://keystone:5000/v3")
    /// * `timeout` - bound on every request
    pub fn new(identity_url: impl Into<String>, timeout: Duration) -> Result<Self, KeystoneError> {
        let identity_url = identity_url.into();
        if !identity_url.starts_with("http://") && !identity_url.starts_with("https://") {
            return Err(KeystoneError::InvalidRequest(format!(
                "identity URL must be http(s): {}",
                identity_url
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(KeystoneError::Http)?;

        Ok(Self {
            http: HttpClient::new(client, identity_url),
        })
    }
}

#[async_trait::async_trait]
impl KeystoneClientTrait for KeystoneClient {
    fn identity_url(&self) -> &str {
        self.http.base_url()
    }

    async fn authenticate(&self, credentials: &AdminCredentials) -> Result<IssuedToken, KeystoneError> {
        debug!(
            "Authenticating {} for project {}",
            credentials.username, credentials.project_name
        );
        let (token, body): (String, TokenResponse) = self
            .http
            .post_auth("/auth/tokens", &credentials.to_auth_request())
            .await?;

        Ok(IssuedToken {
            token,
            project_id: body.token.project.map(|p| p.id),
            expires_at: body.token.expires_at,
        })
    }

    async fn list_services(&self, token: &str) -> Result<Vec<Service>, KeystoneError> {
        self.http.fetch_all_pages("/services", "services", token).await
    }

    async fn list_endpoints(&self, token: &str) -> Result<Vec<Endpoint>, KeystoneError> {
        let query = self.http.build_query_string(&[("interface", PUBLIC_INTERFACE)]);
        self.http
            .fetch_all_pages(&format!("/endpoints?{}", query), "endpoints", token)
            .await
    }
}
