use std::path::Path;

use lb_sync_common::ResourceScope;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("{0} is required but not provided")]
    MissingField(&'static str),
}

/// Default health probe settings, overridable per service
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ProbeDefaults {
    #[serde(default = "default_probe_interval")]
    pub interval_seconds: i32,

    #[serde(default = "default_probe_count")]
    pub probe_count: i32,
}

fn default_probe_interval() -> i32 {
    5
}

fn default_probe_count() -> i32 {
    2
}

impl Default for ProbeDefaults {
    fn default() -> Self {
        Self {
            interval_seconds: default_probe_interval(),
            probe_count: default_probe_count(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl")]
    pub ttl_seconds: u64,
}

fn default_cache_ttl() -> u64 {
    120
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_cache_ttl(),
        }
    }
}

fn default_floating_ip() -> bool {
    true
}

/// Where the load balancers live and how their sub-resources are shaped
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct CloudConfig {
    pub subscription_id: String,
    pub resource_group: String,

    /// Node group backing the cluster-named load balancers
    pub primary_node_group: String,

    /// Subnet for internal frontends when a service names none
    #[serde(default)]
    pub default_internal_subnet: Option<String>,

    #[serde(default = "default_floating_ip")]
    pub enable_floating_ip: bool,

    #[serde(default)]
    pub probe: ProbeDefaults,

    #[serde(default)]
    pub cache: CacheConfig,
}

impl CloudConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: CloudConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check required fields after deserialization
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.subscription_id.is_empty() {
            return Err(ConfigError::MissingField("subscription_id"));
        }
        if self.resource_group.is_empty() {
            return Err(ConfigError::MissingField("resource_group"));
        }
        if self.primary_node_group.is_empty() {
            return Err(ConfigError::MissingField("primary_node_group"));
        }
        Ok(())
    }

    pub fn scope(&self) -> ResourceScope {
        ResourceScope::new(&self.subscription_id, &self.resource_group)
    }
}
