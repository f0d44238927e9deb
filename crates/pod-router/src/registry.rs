//! Capability registry
//!
//! Built once from the site-service handlers and read-only afterwards.

use crate::error::RouterError;
use pod_handles::{Operation, Operations, ResourceHandle};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Which service owns each resource kind, and what each kind supports
pub struct CapabilityRegistry {
    handles: BTreeMap<String, Arc<dyn ResourceHandle>>,
    resources: BTreeMap<&'static str, (String, Operations)>,
}

impl CapabilityRegistry {
    /// Build the registry; a service or resource kind claimed twice is a configuration error
    pub fn new(handles: Vec<Arc<dyn ResourceHandle>>) -> Result<Self, RouterError> {
        let mut registry = Self {
            handles: BTreeMap::new(),
            resources: BTreeMap::new(),
        };

        for handle in handles {
            let service = handle.service_type().to_string();
            if registry.handles.contains_key(&service) {
                return Err(RouterError::InvalidConfig(format!(
                    "service {} is registered twice",
                    service
                )));
            }

            for (resource, operations) in handle.support_resource() {
                if let Some((owner, _)) = registry.resources.get(resource) {
                    return Err(RouterError::InvalidConfig(format!(
                        "resource {} is claimed by both {} and {}",
                        resource, owner, service
                    )));
                }
                debug!("Registered {} on {} ({})", resource, service, operations);
                registry.resources.insert(resource, (service.clone(), operations));
            }
            registry.handles.insert(service, handle);
        }

        Ok(registry)
    }

    /// Service kind that handles `resource`
    pub fn owning_service(&self, resource: &str) -> Result<&str, RouterError> {
        self.resources
            .get(resource)
            .map(|(service, _)| service.as_str())
            .ok_or_else(|| RouterError::ResourceNotRegistered(resource.to_string()))
    }

    pub fn supports(&self, resource: &str, operation: Operation) -> bool {
        self.resources
            .get(resource)
            .is_some_and(|(_, ops)| ops.contains(operation))
    }

    /// Handler of a service kind
    pub fn handle(&self, service: &str) -> Result<Arc<dyn ResourceHandle>, RouterError> {
        self.handles
            .get(service)
            .cloned()
            .ok_or_else(|| RouterError::InvalidConfig(format!("no handler for service {}", service)))
    }

    /// Resource kinds supporting `operation`, sorted
    pub fn resources(&self, operation: Operation) -> Vec<&'static str> {
        self.resources
            .iter()
            .filter(|(_, (_, ops))| ops.contains(operation))
            .map(|(resource, _)| *resource)
            .collect()
    }

    /// Registered service kinds, sorted
    pub fn services(&self) -> impl Iterator<Item = &str> {
        self.handles.keys().map(String::as_str)
    }
}

impl fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("services", &self.handles.keys().collect::<Vec<_>>())
            .field("resources", &self.resources)
            .finish()
    }
}
