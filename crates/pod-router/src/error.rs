//! Router error types.
//!
//! Three classes are visible to callers: "try again later" (nothing is
//! configured yet, or a site was unreachable), "configuration is broken and
//! needs an operator", and "the request itself is invalid".

use keystone_client::KeystoneError;
use pod_handles::{HandleError, Operation};
use pod_store::StoreError;
use thiserror::Error;

/// Errors that can occur in the router.
#[derive(Debug, Error)]
pub enum RouterError {
    /// Operation not declared for the resource kind
    #[error("Operation {operation} is not supported on {resource}")]
    ResourceNotSupported {
        resource: String,
        operation: Operation,
    },

    /// No handler claims the resource kind
    #[error("Resource {0} is not registered")]
    ResourceNotRegistered(String),

    /// No cached endpoint for the site and service, even after refresh
    #[error("Endpoint of service {service} in site {site_id} not found")]
    EndpointNotFound { site_id: String, service: String },

    /// More than one cached endpoint for the site and service
    #[error("Endpoint of service {service} in site {site_id} is not unique")]
    EndpointNotUnique { site_id: String, service: String },

    /// Site not registered
    #[error("Site not found: {0}")]
    SiteNotFound(String),

    /// A site with the same name already exists
    #[error("Site already exists: {0}")]
    SiteExists(String),

    /// The Pending -> Mapped transition kept losing races
    #[error("Routing for {resource_type} {top_id} in site {site_id} could not be settled")]
    RoutingConflict {
        top_id: String,
        site_id: String,
        resource_type: String,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Malformed CIDR or address in a route set
    #[error("Invalid CIDR or address: {0}")]
    InvalidCidr(String),

    /// Catalog authority error
    #[error("Keystone error: {0}")]
    Keystone(#[from] KeystoneError),

    /// Site service error
    #[error("Handler error: {0}")]
    Handle(#[from] HandleError),

    /// Relational store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl RouterError {
    /// Nothing is configured yet or a call failed in transit; try again later
    pub fn is_retryable(&self) -> bool {
        match self {
            RouterError::EndpointNotFound { .. } => true,
            RouterError::Keystone(e) => e.is_transport(),
            RouterError::Handle(e) => e.is_endpoint_not_available(),
            _ => false,
        }
    }

    /// Configuration is broken and needs operator attention
    pub fn needs_operator(&self) -> bool {
        matches!(
            self,
            RouterError::EndpointNotUnique { .. } | RouterError::InvalidConfig(_) | RouterError::SiteNotFound(_)
        )
    }

    /// The request is structurally invalid
    pub fn is_invalid_request(&self) -> bool {
        matches!(
            self,
            RouterError::ResourceNotSupported { .. }
                | RouterError::ResourceNotRegistered(_)
                | RouterError::InvalidCidr(_)
        )
    }
}
