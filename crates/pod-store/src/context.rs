//! Request context
//!
//! Caller identity carried through every router operation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity and authorization of the caller of a router operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Correlation id used in log lines
    pub request_id: String,

    /// Token presented to the catalog authority and site services
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    /// Calling user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Project (tenant) the caller acts in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    /// Administrative caller
    #[serde(default)]
    pub is_admin: bool,
}

impl RequestContext {
    /// Create an anonymous, non-admin context with a fresh request id
    pub fn new() -> Self {
        Self {
            request_id: format!("req-{}", Uuid::new_v4()),
            auth_token: None,
            user_id: None,
            project_id: None,
            is_admin: false,
        }
    }

    /// Create an administrative context without a token
    pub fn admin() -> Self {
        Self {
            is_admin: true,
            ..Self::new()
        }
    }

    /// Attach a token and the project it is scoped to
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>, project_id: Option<String>) -> Self {
        self.auth_token = Some(token.into());
        if project_id.is_some() {
            self.project_id = project_id;
        }
        self
    }

    /// Attach a project id
    #[must_use]
    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// True when the caller is an admin that has not presented a token
    pub fn needs_admin_token(&self) -> bool {
        self.is_admin && self.auth_token.as_deref().is_none_or(str::is_empty)
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
