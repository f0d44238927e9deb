//! Handler errors

use thiserror::Error;

/// Errors raised by site-service handlers
#[derive(Debug, Error)]
pub enum HandleError {
    /// The dispatcher has not resolved an endpoint for this service yet
    #[error("Endpoint of service {0} is not set")]
    EndpointNotSet(String),

    /// The endpoint could not be reached (connect failure or timeout)
    #[error("Endpoint {url} of service {service} is not available: {reason}")]
    EndpointNotAvailable {
        service: String,
        url: String,
        reason: String,
    },

    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The site service returned an error
    #[error("Site API error: {0}")]
    Api(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Action name not known for the resource
    #[error("Action {action} is not supported on {resource}")]
    UnsupportedAction { resource: String, action: String },
}

impl HandleError {
    /// True when the dispatcher should refresh the endpoint and try again
    pub fn is_endpoint_not_available(&self) -> bool {
        matches!(self, HandleError::EndpointNotAvailable { .. })
    }

    /// True when the handler's endpoint slot was empty at send time
    pub fn is_endpoint_not_set(&self) -> bool {
        matches!(self, HandleError::EndpointNotSet(_))
    }
}
