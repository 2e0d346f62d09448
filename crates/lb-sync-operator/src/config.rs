use std::path::Path;
use std::time::Duration;

use lb_sync_engine::{CloudConfig, ConfigError};
use serde::Deserialize;

/// Finalizer held on managed Services until their load balancer items are gone
pub const DEFAULT_FINALIZER: &str = "lb-sync.io/load-balancer-cleanup";

fn default_resync_seconds() -> u64 {
    300
}

fn default_finalizer() -> String {
    DEFAULT_FINALIZER.to_string()
}

/// Operator configuration, loaded from TOML
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Cluster name; prefixes load balancer and backend pool names
    pub cluster_name: String,

    /// Requeue interval after a successful pass
    #[serde(default = "default_resync_seconds")]
    pub resync_seconds: u64,

    #[serde(default = "default_finalizer")]
    pub finalizer: String,

    pub cloud: CloudConfig,
}

impl OperatorConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: OperatorConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cluster_name.is_empty() {
            return Err(ConfigError::MissingField("cluster_name"));
        }
        if self.finalizer.is_empty() {
            return Err(ConfigError::MissingField("finalizer"));
        }
        self.cloud.validate()
    }

    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_seconds)
    }
}

/// Service annotations read by the operator
pub mod annotations {
    /// "true" places the service on the internal load balancer
    pub const INTERNAL: &str = "lb-sync.io/internal";
    /// Subnet for an internal frontend
    pub const INTERNAL_SUBNET: &str = "lb-sync.io/internal-subnet";
    /// TCP idle timeout in minutes
    pub const TCP_IDLE_TIMEOUT: &str = "lb-sync.io/tcp-idle-timeout";
    /// DNS label for the public address
    pub const DNS_LABEL_NAME: &str = "lb-sync.io/dns-label-name";
    /// Health probe interval in seconds
    pub const HEALTH_PROBE_INTERVAL: &str = "lb-sync.io/health-probe-interval";
    /// Failed probes before a node is taken out
    pub const HEALTH_PROBE_NUM: &str = "lb-sync.io/health-probe-num";
}

/// Node labels that keep a node out of backend pools
pub mod labels {
    pub const EXCLUDE_FROM_EXTERNAL_LB: &str =
        "node.kubernetes.io/exclude-from-external-load-balancers";
    pub const CONTROL_PLANE_ROLE: &str = "node-role.kubernetes.io/control-plane";
    pub const MASTER_ROLE: &str = "node-role.kubernetes.io/master";
}
