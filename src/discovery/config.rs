//! Configuration-backed discovery
//!
//! Endpoints come from a static table shaped like
//! `services.<name>.<scheme> = [endpoint, ...]`. The table can be swapped at
//! runtime with [`ConfigDiscovery::update`], which fires the change token
//! handed out with every earlier answer.

use crate::discovery::{DiscoveryProvider, ServiceEndpoints};
use crate::error::DiscoveryError;
use crate::proxy::cancel::CancellationSignal;
use crate::proxy::change::{ChangeToken, ChangeTrigger, change_token};
use crate::proxy::scheme::{SchemePolicy, preferences};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use url::Url;

/// Service name to scheme section to endpoints
pub type ServiceTable = HashMap<String, HashMap<String, Vec<String>>>;

struct State {
    services: ServiceTable,
    trigger: ChangeTrigger,
    token: ChangeToken,
}

/// Discovery provider answering from an in-memory service table
pub struct ConfigDiscovery {
    state: RwLock<State>,
    policy: SchemePolicy,
}

impl ConfigDiscovery {
    pub fn new(services: ServiceTable, policy: SchemePolicy) -> Self {
        let (trigger, token) = change_token();

        Self {
            state: RwLock::new(State {
                services: normalize(services),
                trigger,
                token,
            }),
            policy,
        }
    }

    /// Replace the service table and notify holders of earlier answers
    pub async fn update(&self, services: ServiceTable) {
        let (trigger, token) = change_token();
        let previous = {
            let mut state = self.state.write().await;
            state.services = normalize(services);
            state.token = token;
            std::mem::replace(&mut state.trigger, trigger)
        };

        tracing::info!("Service table updated");
        previous.fire();
    }

    /// Known service names
    pub async fn services(&self) -> Vec<String> {
        self.state.read().await.services.keys().cloned().collect()
    }
}

#[async_trait]
impl DiscoveryProvider for ConfigDiscovery {
    async fn lookup(
        &self,
        service_name: &str,
        _cancel: &CancellationSignal,
    ) -> Result<Option<ServiceEndpoints>, DiscoveryError> {
        let url = Url::parse(service_name)
            .map_err(|_| DiscoveryError::InvalidServiceName(service_name.to_string()))?;
        let host = url
            .host_str()
            .ok_or_else(|| DiscoveryError::InvalidServiceName(service_name.to_string()))?
            .to_ascii_lowercase();

        let state = self.state.read().await;
        let Some(sections) = state.services.get(&host) else {
            return Ok(None);
        };

        let scheme = url.scheme();
        let candidates = if scheme.contains('+') {
            preferences(scheme)
                .into_iter()
                .filter(|s| self.policy.allows(s))
                .collect()
        } else {
            vec![scheme]
        };

        let endpoints = candidates
            .iter()
            .find_map(|candidate| sections.get(&candidate.to_ascii_lowercase()))
            .cloned()
            .unwrap_or_default();

        tracing::debug!(
            service = %service_name,
            endpoints = endpoints.len(),
            "Configuration lookup"
        );

        Ok(Some(ServiceEndpoints::new(
            endpoints,
            Some(state.token.clone()),
        )))
    }
}

fn normalize(services: ServiceTable) -> ServiceTable {
    services
        .into_iter()
        .map(|(name, sections)| {
            let sections = sections
                .into_iter()
                .map(|(scheme, endpoints)| (scheme.to_ascii_lowercase(), endpoints))
                .collect();
            (name.to_ascii_lowercase(), sections)
        })
        .collect()
}
