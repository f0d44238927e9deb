//! Mock KeystoneClient for unit testing
//!
//! Holds a catalog in memory and counts authentication and catalog calls so
//! tests can assert how often the authority was contacted.

use crate::error::KeystoneError;
use crate::keystone_trait::KeystoneClientTrait;
use crate::models::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Mock KeystoneClient for testing
#[derive(Clone)]
pub struct MockKeystoneClient {
    pub(crate) identity_url: String,
    pub(crate) services: Arc<Mutex<Vec<Service>>>,
    pub(crate) endpoints: Arc<Mutex<Vec<Endpoint>>>,
    pub(crate) admin_project_id: String,
    pub(crate) auth_calls: Arc<AtomicUsize>,
    pub(crate) catalog_calls: Arc<AtomicUsize>,
    pub(crate) fail_auth: Arc<AtomicBool>,
    pub(crate) fail_catalog: Arc<AtomicBool>,
    pub(crate) next_id: Arc<AtomicUsize>,
}

impl MockKeystoneClient {
    /// Create a new mock client with an empty catalog
    pub fn new(identity_url: impl Into<String>) -> Self {
        Self {
            identity_url: identity_url.into(),
            services: Arc::new(Mutex::new(Vec::new())),
            endpoints: Arc::new(Mutex::new(Vec::new())),
            admin_project_id: "admin-project".to_string(),
            auth_calls: Arc::new(AtomicUsize::new(0)),
            catalog_calls: Arc::new(AtomicUsize::new(0)),
            fail_auth: Arc::new(AtomicBool::new(false)),
            fail_catalog: Arc::new(AtomicBool::new(false)),
            next_id: Arc::new(AtomicUsize::new(1)),
        }
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn service_id(&self, service_name: &str) -> String {
        let mut services = self.services.lock().unwrap();
        if let Some(existing) = services.iter().find(|s| s.name == service_name) {
            return existing.id.clone();
        }
        let id = self.next_id("service");
        services.push(Service {
            id: id.clone(),
            name: service_name.to_string(),
            service_type: service_name.to_string(),
            enabled: true,
        });
        id
    }

    /// Advertise a public endpoint for a service in a region
    pub fn add_endpoint(&self, region: &str, service_name: &str, url: &str) {
        self.add_endpoint_with_interface(region, service_name, PUBLIC_INTERFACE, url);
    }

    /// Advertise an endpoint with an explicit interface
    pub fn add_endpoint_with_interface(&self, region: &str, service_name: &str, interface: &str, url: &str) {
        let service_id = self.service_id(service_name);
        let endpoint = Endpoint {
            id: self.next_id("endpoint"),
            service_id,
            interface: interface.to_string(),
            region: Some(region.to_string()),
            region_id: Some(region.to_string()),
            url: url.to_string(),
            enabled: true,
        };
        self.endpoints.lock().unwrap().push(endpoint);
    }

    /// Replace the URL of every endpoint of a service in a region
    pub fn set_endpoint_url(&self, region: &str, service_name: &str, url: &str) {
        let service_id = self.service_id(service_name);
        let mut endpoints = self.endpoints.lock().unwrap();
        for endpoint in endpoints
            .iter_mut()
            .filter(|e| e.service_id == service_id && e.region_name() == Some(region))
        {
            endpoint.url = url.to_string();
        }
    }

    /// Make `authenticate` fail
    pub fn set_auth_failure(&self, fail: bool) {
        self.fail_auth.store(fail, Ordering::SeqCst);
    }

    /// Make catalog listings fail
    pub fn set_catalog_failure(&self, fail: bool) {
        self.fail_catalog.store(fail, Ordering::SeqCst);
    }

    /// Number of `authenticate` calls so far
    pub fn auth_calls(&self) -> usize {
        self.auth_calls.load(Ordering::SeqCst)
    }

    /// Number of endpoint listings so far (one per catalog fetch)
    pub fn catalog_calls(&self) -> usize {
        self.catalog_calls.load(Ordering::SeqCst)
    }

    /// Project id carried by issued tokens
    pub fn admin_project_id(&self) -> &str {
        &self.admin_project_id
    }
}

#[async_trait::async_trait]
impl KeystoneClientTrait for MockKeystoneClient {
    fn identity_url(&self) -> &str {
        &self.identity_url
    }

    async fn authenticate(&self, credentials: &AdminCredentials) -> Result<IssuedToken, KeystoneError> {
        self.auth_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_auth.load(Ordering::SeqCst) {
            return Err(KeystoneError::Authentication(format!(
                "invalid credentials for {}",
                credentials.username
            )));
        }
        Ok(IssuedToken {
            token: self.next_id("token"),
            project_id: Some(self.admin_project_id.clone()),
            expires_at: None,
        })
    }

    async fn list_services(&self, token: &str) -> Result<Vec<Service>, KeystoneError> {
        if token.is_empty() {
            return Err(KeystoneError::Authentication("missing token".to_string()));
        }
        if self.fail_catalog.load(Ordering::SeqCst) {
            return Err(KeystoneError::Api("GET /services failed: 503".to_string()));
        }
        Ok(self.services.lock().unwrap().clone())
    }

    async fn list_endpoints(&self, token: &str) -> Result<Vec<Endpoint>, KeystoneError> {
        self.catalog_calls.fetch_add(1, Ordering::SeqCst);
        if token.is_empty() {
            return Err(KeystoneError::Authentication("missing token".to_string()));
        }
        if self.fail_catalog.load(Ordering::SeqCst) {
            return Err(KeystoneError::Api("GET /endpoints failed: 503".to_string()));
        }
        Ok(self.endpoints.lock().unwrap().clone())
    }
}
