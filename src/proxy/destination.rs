//! Destination data model
//!
//! A destination is one named upstream target. Configuration supplies a
//! [`DestinationMap`] of logical destinations; resolution produces a
//! [`ResolvedDestinations`] with one entry per discovered endpoint.

use crate::proxy::change::CompositeChangeToken;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Destination name to destination spec. Names are chosen by configuration.
pub type DestinationMap = HashMap<String, DestinationSpec>;

/// One named upstream target
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DestinationSpec {
    /// Absolute URI (e.g., "https+http://webfrontend/api")
    pub address: String,

    /// Explicit Host header to send when forwarding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Out-of-band health probe URI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<String>,
}

impl DestinationSpec {
    /// Create a destination with only an address
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            host: None,
            health: None,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_health(mut self, health: impl Into<String>) -> Self {
        self.health = Some(health.into());
        self
    }

    /// The configured Host override, treating an empty string as absent
    pub fn explicit_host(&self) -> Option<&str> {
        self.host.as_deref().filter(|h| !h.is_empty())
    }

    /// The configured health address, treating an empty string as absent
    pub fn health_address(&self) -> Option<&str> {
        self.health.as_deref().filter(|h| !h.is_empty())
    }
}

/// Replaces the address of one named destination before resolution.
///
/// Used to point a single logical backend at an environment-provided
/// address without touching the rest of the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationOverride {
    /// Destination name the override applies to
    pub name: String,

    /// Replacement address; a missing value is a configuration error
    pub address: Option<String>,
}

impl DestinationOverride {
    pub fn new(name: impl Into<String>, address: Option<String>) -> Self {
        Self {
            name: name.into(),
            address,
        }
    }
}

/// Result of one resolution pass.
///
/// Owned by the caller until the next pass succeeds or the change token
/// fires.
#[derive(Debug, Clone)]
pub struct ResolvedDestinations {
    /// Keyed by `originalName[rawEndpoint]`
    pub destinations: DestinationMap,

    /// Fires when any underlying lookup result goes stale
    pub change_token: CompositeChangeToken,
}

impl ResolvedDestinations {
    pub fn len(&self) -> usize {
        self.destinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&DestinationSpec> {
        self.destinations.get(name)
    }
}

/// Name of one resolved endpoint under a logical destination
pub fn endpoint_name(destination: &str, raw_endpoint: &str) -> String {
    format!("{}[{}]", destination, raw_endpoint)
}
