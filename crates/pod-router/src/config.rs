//! Router configuration
//!
//! Read once at start, from `POD_ROUTER_*` environment variables or from a
//! YAML file named by `POD_ROUTER_CONFIG`. There is no runtime reconfiguration.

use crate::error::RouterError;
use keystone_client::AdminCredentials;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Prefix of every configuration environment variable
pub const ENV_PREFIX: &str = "POD_ROUTER_";
/// Environment variable naming a YAML configuration file
pub const CONFIG_PATH_ENV: &str = "POD_ROUTER_CONFIG";

/// Catalog and admin-account settings of the router
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Keystone authorization URL
    pub auth_url: String,
    /// Keystone service URL used for tokens and catalog queries
    pub identity_url: String,
    /// Refresh the endpoint cache from the catalog on miss or unreachable endpoint
    pub auto_refresh_endpoint: bool,
    /// Name of the site whose services the dispatcher calls
    pub top_site_name: String,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    pub admin_tenant: Option<String>,
    pub admin_user_domain_name: String,
    pub admin_tenant_domain_name: String,
    /// Bound on every catalog and site-service request
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            auth_url: "http://127.0.0.1:5000/v3".to_string(),
            identity_url: "http://127.0.0.1:35357/v3".to_string(),
            auto_refresh_endpoint: false,
            top_site_name: String::new(),
            admin_username: None,
            admin_password: None,
            admin_tenant: None,
            admin_user_domain_name: "Default".to_string(),
            admin_tenant_domain_name: "Default".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl ClientConfig {
    /// Load from the YAML file in `POD_ROUTER_CONFIG`, else from `POD_ROUTER_*` variables
    pub fn from_env() -> Result<Self, RouterError> {
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_yaml_file(Path::new(&path)),
            Err(_) => Self::from_lookup(|key| std::env::var(key).ok()),
        }
    }

    /// Load from variables resolved by `lookup` (full names, e.g. `POD_ROUTER_TOP_SITE_NAME`)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, RouterError> {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name)).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(v) = var("AUTH_URL") {
            config.auth_url = v;
        }
        if let Some(v) = var("IDENTITY_URL") {
            config.identity_url = v;
        }
        if let Some(v) = var("AUTO_REFRESH_ENDPOINT") {
            config.auto_refresh_endpoint = parse_bool("AUTO_REFRESH_ENDPOINT", &v)?;
        }
        if let Some(v) = var("TOP_SITE_NAME") {
            config.top_site_name = v;
        }
        config.admin_username = var("ADMIN_USERNAME");
        config.admin_password = var("ADMIN_PASSWORD");
        config.admin_tenant = var("ADMIN_TENANT");
        if let Some(v) = var("ADMIN_USER_DOMAIN_NAME") {
            config.admin_user_domain_name = v;
        }
        if let Some(v) = var("ADMIN_TENANT_DOMAIN_NAME") {
            config.admin_tenant_domain_name = v;
        }
        if let Some(v) = var("REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = v.parse().map_err(|_| {
                RouterError::InvalidConfig(format!("{}REQUEST_TIMEOUT_SECS is not a number: {}", ENV_PREFIX, v))
            })?;
        }

        Ok(config)
    }

    /// Parse a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self, RouterError> {
        serde_yaml::from_str(yaml).map_err(|e| RouterError::InvalidConfig(format!("invalid YAML configuration: {}", e)))
    }

    /// Read and parse a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self, RouterError> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| RouterError::InvalidConfig(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_yaml_str(&yaml)
    }

    /// Admin credentials, if username, password and tenant are all set
    pub fn admin_credentials(&self) -> Option<AdminCredentials> {
        let (Some(username), Some(password), Some(tenant)) =
            (&self.admin_username, &self.admin_password, &self.admin_tenant)
        else {
            return None;
        };
        Some(AdminCredentials {
            username: username.clone(),
            password: password.clone(),
            project_name: tenant.clone(),
            user_domain_name: self.admin_user_domain_name.clone(),
            project_domain_name: self.admin_tenant_domain_name.clone(),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Reject settings that cannot work together
    pub fn validate(&self) -> Result<(), RouterError> {
        if self.request_timeout_secs == 0 {
            return Err(RouterError::InvalidConfig("request_timeout_secs must be positive".to_string()));
        }
        if self.auto_refresh_endpoint && self.admin_credentials().is_none() {
            return Err(RouterError::InvalidConfig(
                "auto_refresh_endpoint requires admin_username, admin_password and admin_tenant".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, RouterError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(RouterError::InvalidConfig(format!(
            "{}{} is not a boolean: {}",
            ENV_PREFIX, name, value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.identity_url, "http://127.0.0.1:35357/v3");
        assert!(!config.auto_refresh_endpoint);
        assert_eq!(config.admin_user_domain_name, "Default");
        assert!(config.admin_credentials().is_none());
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_env_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("POD_ROUTER_IDENTITY_URL", "http://keystone:5000/v3"),
            ("POD_ROUTER_AUTO_REFRESH_ENDPOINT", "True"),
            ("POD_ROUTER_TOP_SITE_NAME", "RegionOne"),
            ("POD_ROUTER_ADMIN_USERNAME", "admin"),
            ("POD_ROUTER_ADMIN_PASSWORD", "secret"),
            ("POD_ROUTER_ADMIN_TENANT", "admin"),
            ("POD_ROUTER_REQUEST_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();

        assert!(config.auto_refresh_endpoint);
        assert_eq!(config.top_site_name, "RegionOne");
        assert_eq!(config.request_timeout_secs, 5);
        let credentials = config.admin_credentials().unwrap();
        assert_eq!(credentials.project_name, "admin");
        assert_eq!(credentials.project_domain_name, "Default");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_values_are_invalid_config() {
        let err = ClientConfig::from_lookup(lookup(&[("POD_ROUTER_AUTO_REFRESH_ENDPOINT", "maybe")])).unwrap_err();
        assert!(matches!(err, RouterError::InvalidConfig(_)));

        let err = ClientConfig::from_lookup(lookup(&[("POD_ROUTER_REQUEST_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert!(matches!(err, RouterError::InvalidConfig(_)));
    }

    #[test]
    fn test_auto_refresh_needs_credentials() {
        let config = ClientConfig {
            auto_refresh_endpoint: true,
            admin_username: Some("admin".to_string()),
            ..ClientConfig::default()
        };
        assert!(config.admin_credentials().is_none());
        assert!(matches!(config.validate(), Err(RouterError::InvalidConfig(_))));
    }

    #[test]
    fn test_yaml() {
        let config = ClientConfig::from_yaml_str(
            "identity_url: http://keystone:5000/v3\n\
             auto_refresh_endpoint: true\n\
             top_site_name: RegionOne\n\
             admin_username: admin\n\
             admin_password: secret\n\
             admin_tenant: demo\n\
             admin_tenant_domain_name: corp\n",
        )
        .unwrap();
        assert_eq!(config.top_site_name, "RegionOne");
        assert_eq!(config.request_timeout_secs, 30);
        let credentials = config.admin_credentials().unwrap();
        assert_eq!(credentials.project_domain_name, "corp");
        assert_eq!(credentials.user_domain_name, "Default");
    }

    #[test]
    fn test_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("router.yaml");
        std::fs::write(&path, "top_site_name: RegionTwo\nrequest_timeout_secs: 10\n").unwrap();
        let config = ClientConfig::from_yaml_file(&path).unwrap();
        assert_eq!(config.top_site_name, "RegionTwo");
        assert_eq!(config.request_timeout(), Duration::from_secs(10));

        assert!(ClientConfig::from_yaml_file(&dir.path().join("missing.yaml")).is_err());
    }
}
