//! Proxy configuration
//!
//! Loaded from a YAML file (`DEVPROXY_CONFIG`, default `devproxy.yaml`),
//! with the `BACKEND` environment variable taking precedence over the
//! `backend` key.

use crate::discovery::config::ServiceTable;
use crate::proxy::destination::{DestinationMap, DestinationOverride};
use crate::proxy::scheme::SchemePolicy;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Destination whose address the `backend` setting replaces
pub const BACKEND_DESTINATION: &str = "backend";

const DEFAULT_CONFIG_PATH: &str = "devproxy.yaml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Override address for the `backend` destination
    pub backend: Option<String>,

    /// Logical destinations to resolve
    pub destinations: DestinationMap,

    pub service_discovery: ServiceDiscoveryConfig,

    /// Static discovery entries: `services.<name>.<scheme>`
    pub services: ServiceTable,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceDiscoveryConfig {
    pub allow_all_schemes: bool,
    pub allowed_schemes: Vec<String>,
}

impl Config {
    /// Load from the configured file and environment
    pub fn load() -> Result<Self> {
        let path = Self::path();
        let mut cfg = if path.exists() {
            Self::from_file(&path)?
        } else {
            tracing::debug!(path = %path.display(), "No configuration file, using defaults");
            Self::default()
        };

        if let Ok(backend) = std::env::var("BACKEND") {
            cfg.backend = Some(backend);
        }

        Ok(cfg)
    }

    /// Path of the configuration file
    pub fn path() -> PathBuf {
        std::env::var("DEVPROXY_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("Failed to parse YAML configuration")
    }

    /// Override for the `backend` destination, if one is configured
    pub fn destination_override(&self) -> Option<DestinationOverride> {
        self.destinations
            .contains_key(BACKEND_DESTINATION)
            .then(|| DestinationOverride::new(BACKEND_DESTINATION, self.backend.clone()))
    }

    /// Schemes discovered endpoints may use.
    ///
    /// An empty allow-list restricts nothing.
    pub fn scheme_policy(&self) -> SchemePolicy {
        let discovery = &self.service_discovery;
        if discovery.allow_all_schemes || discovery.allowed_schemes.is_empty() {
            SchemePolicy::AllowAll
        } else {
            SchemePolicy::allowed(&discovery.allowed_schemes)
        }
    }
}
