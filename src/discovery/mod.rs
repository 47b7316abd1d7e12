//! Service discovery
//!
//! The resolver only consumes discovery through [`DiscoveryProvider`]:
//! a lookup by logical service name that returns the endpoints currently
//! registered and a change token that fires when that answer goes stale.

pub mod config;

pub use config::ConfigDiscovery;

use crate::error::DiscoveryError;
use crate::proxy::cancel::CancellationSignal;
use crate::proxy::change::ChangeToken;
use async_trait::async_trait;

/// Endpoints registered under one service name
#[derive(Debug, Clone)]
pub struct ServiceEndpoints {
    /// Bare `host[:port]` values or full URIs, as registered
    pub endpoints: Vec<String>,

    /// Fires when this answer is stale
    pub change_token: Option<ChangeToken>,
}

impl ServiceEndpoints {
    pub fn new(endpoints: Vec<String>, change_token: Option<ChangeToken>) -> Self {
        Self {
            endpoints,
            change_token,
        }
    }
}

/// Maps a logical service name to live network endpoints.
///
/// Implementations must be safe to call concurrently for distinct names.
#[async_trait]
pub trait DiscoveryProvider: Send + Sync {
    /// Look up `service_name` (`scheme://host[:port]`).
    ///
    /// Returns `Ok(None)` when the provider knows nothing about the name,
    /// in which case the caller uses the configured address as-is. An empty
    /// endpoint list means the service is known but has no live endpoints.
    async fn lookup(
        &self,
        service_name: &str,
        cancel: &CancellationSignal,
    ) -> Result<Option<ServiceEndpoints>, DiscoveryError>;
}
