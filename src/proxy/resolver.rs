//! Destination resolution
//!
//! Turns configured destinations into concrete ones by looking each up in
//! a [`DiscoveryProvider`] and rewriting the configured address for every
//! endpoint it returns.
//!
//! For each destination:
//! 1. Apply the override if the destination name matches it
//! 2. Derive the service name from the address (`scheme://host[:port]`)
//! 3. Look the service up; an unknown name passes the address through
//! 4. For each endpoint, substitute its scheme, host and port into the
//!    configured address (and its host and port into the health address),
//!    then decide the Host header
//!
//! Lookups run concurrently and the first failure fails the whole pass.

use crate::discovery::{DiscoveryProvider, ServiceEndpoints};
use crate::error::{ConfigError, ResolveError};
use crate::proxy::cancel::CancellationSignal;
use crate::proxy::change::{ChangeToken, CompositeChangeToken};
use crate::proxy::destination::{
    DestinationMap, DestinationOverride, DestinationSpec, ResolvedDestinations, endpoint_name,
};
use crate::proxy::scheme::{SchemePolicy, negotiate};
use futures::future::try_join_all;
use std::net::IpAddr;
use std::sync::Arc;
use url::{Host, Url};

type Resolved = (Vec<(String, DestinationSpec)>, Option<ChangeToken>);

/// Resolves destination maps against a discovery provider
#[derive(Clone)]
pub struct DestinationResolver {
    provider: Arc<dyn DiscoveryProvider>,
    policy: SchemePolicy,
}

impl DestinationResolver {
    pub fn new(provider: Arc<dyn DiscoveryProvider>, policy: SchemePolicy) -> Self {
        Self { provider, policy }
    }

    pub fn policy(&self) -> &SchemePolicy {
        &self.policy
    }

    /// Resolve every destination in `destinations`.
    ///
    /// Returns a fresh map keyed by `name[endpoint]` and a composite change
    /// token covering every lookup. Any lookup failure or cancellation
    /// fails the whole pass; no partial result is returned.
    pub async fn resolve(
        &self,
        destinations: &DestinationMap,
        destination_override: Option<&DestinationOverride>,
        cancel: &CancellationSignal,
    ) -> Result<ResolvedDestinations, ResolveError> {
        let override_address = destination_override
            .map(|o| override_address(o).map(|address| (o.name.as_str(), address)))
            .transpose()?;

        if cancel.is_cancelled() {
            return Err(ResolveError::Cancelled);
        }

        let lookups = destinations.iter().map(|(name, spec)| {
            let address = override_address
                .as_ref()
                .filter(|(target, _)| *target == name.as_str())
                .map(|(_, address)| address.as_str());
            self.resolve_destination(name, spec, address, cancel)
        });

        let results = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ResolveError::Cancelled),
            results = try_join_all(lookups) => results?,
        };

        let mut resolved = DestinationMap::new();
        let mut tokens = Vec::new();
        for (entries, token) in results {
            tokens.extend(token);
            resolved.extend(entries);
        }

        tracing::info!(
            destinations = destinations.len(),
            resolved = resolved.len(),
            change_tokens = tokens.len(),
            "Destinations resolved"
        );

        Ok(ResolvedDestinations {
            destinations: resolved,
            change_token: CompositeChangeToken::new(tokens),
        })
    }

    /// Like [`resolve`](Self::resolve), but reports cancellation as `None`
    /// so callers can tell a shutdown apart from a failed pass.
    pub async fn try_resolve(
        &self,
        destinations: &DestinationMap,
        destination_override: Option<&DestinationOverride>,
        cancel: &CancellationSignal,
    ) -> Option<Result<ResolvedDestinations, ResolveError>> {
        match self.resolve(destinations, destination_override, cancel).await {
            Err(e) if e.is_cancelled() => {
                tracing::debug!("Destination resolution cancelled");
                None
            }
            result => Some(result),
        }
    }

    async fn resolve_destination(
        &self,
        name: &str,
        spec: &DestinationSpec,
        override_address: Option<&str>,
        cancel: &CancellationSignal,
    ) -> Result<Resolved, ResolveError> {
        let address = override_address.unwrap_or(&spec.address);
        let original = parse_absolute(address).map_err(|reason| ConfigError::InvalidAddress {
            destination: name.to_string(),
            address: address.to_string(),
            reason,
        })?;
        let service = service_name(&original);

        let lookup = self
            .provider
            .lookup(&service, cancel)
            .await
            .map_err(|source| ResolveError::Discovery {
                service: service.clone(),
                source,
            })?;

        let Some(ServiceEndpoints {
            endpoints,
            change_token,
        }) = lookup
        else {
            tracing::debug!(destination = %name, service = %service, "Service unknown to discovery, passing through");
            let passthrough = DestinationSpec {
                address: address.to_string(),
                host: host_header(spec, &original, &original),
                health: spec.health.clone(),
            };
            return Ok((vec![(endpoint_name(name, &authority(&original)), passthrough)], None));
        };

        let health = spec
            .health_address()
            .map(|health| {
                parse_absolute(health).map_err(|reason| ConfigError::InvalidHealthAddress {
                    destination: name.to_string(),
                    address: health.to_string(),
                    reason,
                })
            })
            .transpose()?;

        let mut entries = Vec::with_capacity(endpoints.len());
        for raw in &endpoints {
            let invalid = |reason: String| ConfigError::InvalidEndpoint {
                service: service.clone(),
                endpoint: raw.clone(),
                reason,
            };

            let endpoint = if raw.contains("://") {
                Url::parse(raw).map_err(|e| invalid(e.to_string()))?
            } else {
                let scheme = negotiate(original.scheme(), &self.policy)?;
                Url::parse(&format!("{}://{}", scheme, raw)).map_err(|e| invalid(e.to_string()))?
            };

            let resolved_address =
                substitute(&original, endpoint.scheme(), &endpoint).map_err(invalid)?;
            let resolved_health = match &health {
                Some(health) => Some(substitute(health, health.scheme(), &endpoint).map_err(invalid)?),
                None => spec.health.clone(),
            };

            let resolved = DestinationSpec {
                address: resolved_address,
                host: host_header(spec, &original, &endpoint),
                health: resolved_health,
            };

            tracing::debug!(
                destination = %name,
                endpoint = %raw,
                address = %resolved.address,
                host = ?resolved.host,
                "Endpoint resolved"
            );

            entries.push((endpoint_name(name, raw), resolved));
        }

        if entries.is_empty() {
            tracing::warn!(destination = %name, service = %service, "No endpoints registered");
        }

        Ok((entries, change_token))
    }
}

/// Apply the override address, defaulting to `http` when it has no scheme
fn override_address(destination_override: &DestinationOverride) -> Result<String, ConfigError> {
    let address = destination_override
        .address
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .ok_or_else(|| ConfigError::MissingOverrideAddress {
            name: destination_override.name.clone(),
        })?;

    if address.contains("://") {
        Ok(address.to_string())
    } else {
        Ok(format!("http://{}", address))
    }
}

/// Parse an absolute URI that carries an authority
pub fn parse_absolute(address: &str) -> Result<Url, String> {
    let url = Url::parse(address).map_err(|e| e.to_string())?;
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err("address has no host".to_string()),
    }
}

/// `host[:port]`, omitting the scheme's default port
pub fn authority(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

/// Discovery key for an address: scheme and authority, no path or query
pub fn service_name(url: &Url) -> String {
    format!("{}://{}", url.scheme(), authority(url))
}

/// Whether `url` points at this machine
pub fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        Some(Host::Domain(domain)) => {
            domain.eq_ignore_ascii_case("localhost")
                || domain
                    .trim_start_matches('[')
                    .trim_end_matches(']')
                    .parse::<IpAddr>()
                    .is_ok_and(|ip| ip.is_loopback())
        }
        None => false,
    }
}

/// Host header for a resolved endpoint.
///
/// An explicit host wins. Loopback endpoints get none so forwarders keep
/// the incoming Host (local certificates are rarely wildcards). Otherwise
/// the configured authority, port included.
fn host_header(spec: &DestinationSpec, original: &Url, endpoint: &Url) -> Option<String> {
    if let Some(host) = spec.explicit_host() {
        Some(host.to_string())
    } else if is_loopback(endpoint) {
        None
    } else {
        Some(authority(original))
    }
}

/// Rebuild `template` with `scheme` and the endpoint's host and port,
/// keeping user info, path, query and fragment.
fn substitute(template: &Url, scheme: &str, endpoint: &Url) -> Result<String, String> {
    let host = endpoint
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| "endpoint has no host".to_string())?;

    let mut address = format!("{}://", scheme);
    if !template.username().is_empty() {
        address.push_str(template.username());
        if let Some(password) = template.password() {
            address.push(':');
            address.push_str(password);
        }
        address.push('@');
    }
    address.push_str(host);
    if let Some(port) = endpoint.port_or_known_default() {
        address.push_str(&format!(":{}", port));
    }
    address.push_str(template.path());
    if let Some(query) = template.query() {
        address.push('?');
        address.push_str(query);
    }
    if let Some(fragment) = template.fragment() {
        address.push('#');
        address.push_str(fragment);
    }

    Url::parse(&address)
        .map(String::from)
        .map_err(|e| e.to_string())
}
