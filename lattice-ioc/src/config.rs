//! Configuration-based container setup
//!
//! A manifest names services by type name and wires them against the
//! type registry; the registry remains the source of truth for how a
//! type is constructed.

use crate::container::Container;
use crate::error::{DiError, DiResult};
use crate::token::Token;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One service entry in a manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceEntry {
    /// Token name the service is requested under.
    pub service: String,
    /// Implementation type name; defaults to `service`.
    #[serde(default)]
    pub implement: Option<String>,
    pub lifetime: LifetimeConfig,
    #[serde(default)]
    pub expires_ms: Option<u64>,
}

/// Declared lifetime, cross-checked against registry metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifetimeConfig {
    Transient,
    Singleton,
}

/// Container manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerConfig {
    pub services: Vec<ServiceEntry>,
}

impl ContainerConfig {
    pub fn from_toml(input: &str) -> DiResult<Self> {
        toml::from_str(input)
            .map_err(|e| DiError::Config(format!("failed to parse TOML: {e}")))
    }

    pub fn from_json(input: &str) -> DiResult<Self> {
        serde_json::from_str(input)
            .map_err(|e| DiError::Config(format!("failed to parse JSON: {e}")))
    }

    /// Register every entry against the container. Unknown type names
    /// fail fast; lifetime mismatches against registry metadata are
    /// logged and the metadata wins.
    pub fn apply(&self, container: &Container) -> DiResult<()> {
        let registry = container.registry().clone();
        for entry in &self.services {
            let impl_name = entry.implement.as_deref().unwrap_or(&entry.service);
            let info = registry.find_by_name(impl_name).ok_or_else(|| {
                DiError::Config(format!("unknown service type: {impl_name}"))
            })?;
            container.register_token(&Token::Type(info.key))?;

            if entry.implement.is_some() && entry.service != impl_name {
                container
                    .bind_provider(&Token::name(entry.service.clone()), &Token::Type(info.key))?;
            }

            let declared_singleton = entry.lifetime == LifetimeConfig::Singleton;
            if declared_singleton != registry.is_singleton(info.key.id) {
                warn!(
                    service = %entry.service,
                    "manifest lifetime disagrees with registered metadata; metadata wins"
                );
            }
            if let Some(expires) = entry.expires_ms {
                if registry.expires_ms(info.key.id) != Some(expires) {
                    warn!(
                        service = %entry.service,
                        expires, "manifest expiry disagrees with registered metadata"
                    );
                }
            }
        }
        Ok(())
    }
}

// Example manifest:
// ```toml
// [[services]]
// service = "Logger"
// lifetime = "singleton"
//
// [[services]]
// service = "Repo"
// implement = "PostgresRepo"
// lifetime = "transient"
// expires_ms = 30000
// ```
