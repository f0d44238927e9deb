//! Keystone v3 data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Endpoint interface advertised to end users
pub const PUBLIC_INTERFACE: &str = "public";

/// Password credentials of the administrative account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
    /// Project (tenant) the token is scoped to
    pub project_name: String,
    #[serde(default = "default_domain")]
    pub user_domain_name: String,
    #[serde(default = "default_domain")]
    pub project_domain_name: String,
}

fn default_domain() -> String {
    "Default".to_string()
}

impl AdminCredentials {
    /// Credentials in the `Default` user and project domains
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        project_name: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            project_name: project_name.into(),
            user_domain_name: default_domain(),
            project_domain_name: default_domain(),
        }
    }

    /// Build the `POST /auth/tokens` request body
    pub fn to_auth_request(&self) -> serde_json::Value {
        serde_json::json!({
            "auth": {
                "identity": {
                    "methods": ["password"],
                    "password": {
                        "user": {
                            "name": self.username,
                            "domain": { "name": self.user_domain_name },
                            "password": self.password,
                        }
                    }
                },
                "scope": {
                    "project": {
                        "name": self.project_name,
                        "domain": { "name": self.project_domain_name },
                    }
                }
            }
        })
    }
}

/// A token issued by `POST /auth/tokens`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    /// Value of the `X-Subject-Token` response header
    pub token: String,
    /// Project the token is scoped to
    pub project_id: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Body of a token response (the token itself travels in a header)
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub token: TokenBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenBody {
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub project: Option<ProjectRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectRef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Catalog service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    /// Service name (e.g. "neutron"); the cache is keyed by this
    #[serde(default)]
    pub name: String,
    /// Service type (e.g. "network")
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Catalog endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: String,
    pub service_id: String,
    /// `public`, `internal` or `admin`
    pub interface: String,
    /// Legacy region name
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub region_id: Option<String>,
    pub url: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Endpoint {
    /// Region the endpoint belongs to
    pub fn region_name(&self) -> Option<&str> {
        self.region_id.as_deref().or(self.region.as_deref())
    }

    pub fn is_public(&self) -> bool {
        self.interface == PUBLIC_INTERFACE
    }
}

fn default_enabled() -> bool {
    true
}

/// Pagination links of a v3 collection
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Links {
    #[serde(default)]
    pub next: Option<String>,
}
