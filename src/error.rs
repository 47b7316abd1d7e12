//! Error types for destination resolution, discovery and identity simulation.

use thiserror::Error;

/// Problems with the destinations or settings handed to the resolver.
///
/// These are fatal to the current resolution pass only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("override requested for destination '{name}' but no address was provided")]
    MissingOverrideAddress { name: String },

    #[error("invalid address '{address}' for destination '{destination}': {reason}")]
    InvalidAddress {
        destination: String,
        address: String,
        reason: String,
    },

    #[error("invalid health address '{address}' for destination '{destination}': {reason}")]
    InvalidHealthAddress {
        destination: String,
        address: String,
        reason: String,
    },

    #[error("discovered endpoint '{endpoint}' for service '{service}' is not a valid URI: {reason}")]
    InvalidEndpoint {
        service: String,
        endpoint: String,
        reason: String,
    },

    #[error("none of the specified schemes ('{}') are allowed by configuration", .candidates.join(", "))]
    SchemesRejected { candidates: Vec<String> },
}

/// Failures reported by a discovery provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscoveryError {
    #[error("discovery provider unavailable: {0}")]
    Unavailable(String),

    #[error("discovery lookup timed out")]
    Timeout,

    #[error("invalid service name '{0}'")]
    InvalidServiceName(String),
}

/// Outcome of a failed resolution pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("lookup for service '{service}' failed")]
    Discovery {
        service: String,
        #[source]
        source: DiscoveryError,
    },

    #[error("resolution cancelled")]
    Cancelled,
}

impl ResolveError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ResolveError::Cancelled)
    }
}

/// Failures decoding a simulated client principal or its login form.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("principal is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("principal is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("login field '{field}' is required")]
    MissingField { field: &'static str },

    #[error("login field '{field}' is longer than {max} characters")]
    FieldTooLong { field: &'static str, max: usize },
}
