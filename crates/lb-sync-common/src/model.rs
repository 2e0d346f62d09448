//! Load balancer and service data model
//!
//! These types mirror the shape of the cloud-side load balancer resource and
//! the desired exposure declared for a service. They carry no behavior beyond
//! small accessors; diffing lives in `lb-sync-engine`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Transport protocol of a service port / forwarding rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "TCP",
            Self::Udp => "UDP",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "TCP" | "" => Ok(Self::Tcp),
            "UDP" => Ok(Self::Udp),
            other => Err(format!("unsupported protocol '{other}'")),
        }
    }
}

/// Protocol used by a health probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProbeProtocol {
    Tcp,
    Http,
}

/// IP address family of a frontend or rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressFamily {
    IPv4,
    IPv6,
}

impl AddressFamily {
    /// Name suffix used for the dual-stack secondary variant
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::IPv4 => "-v4",
            Self::IPv6 => "-v6",
        }
    }

    pub fn is_ipv6(&self) -> bool {
        matches!(self, Self::IPv6)
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IPv4 => f.write_str("IPv4"),
            Self::IPv6 => f.write_str("IPv6"),
        }
    }
}

/// Address families requested by a service
///
/// Dual-stack services own two frontends: the IPv6 one under the base name
/// and the IPv4 one under the `-v4` variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IpFamilies {
    #[default]
    V4,
    V6,
    DualStack,
}

impl IpFamilies {
    /// Family bound to the base-named frontend
    pub fn primary(&self) -> AddressFamily {
        match self {
            Self::V4 => AddressFamily::IPv4,
            Self::V6 | Self::DualStack => AddressFamily::IPv6,
        }
    }

    /// Family bound to the suffixed frontend, dual-stack only
    pub fn secondary(&self) -> Option<AddressFamily> {
        match self {
            Self::DualStack => Some(AddressFamily::IPv4),
            Self::V4 | Self::V6 => None,
        }
    }

    /// Active families, primary first
    pub fn families(&self) -> Vec<AddressFamily> {
        let mut families = vec![self.primary()];
        families.extend(self.secondary());
        families
    }

    pub fn is_dual_stack(&self) -> bool {
        matches!(self, Self::DualStack)
    }
}

/// Whether the load balancer is exposed on a private or public address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    Internal,
    #[default]
    External,
}

impl Placement {
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal)
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal => f.write_str("internal"),
            Self::External => f.write_str("external"),
        }
    }
}

/// A port exposed by a service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePort {
    pub name: Option<String>,
    pub protocol: Protocol,
    /// Frontend port on the load balancer
    pub port: i32,
    /// Port on the backend nodes that receives the traffic
    pub node_port: i32,
}

/// Desired exposure of one service
///
/// Immutable for the duration of a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceIntent {
    /// Stable identity (Kubernetes UID)
    pub uid: String,
    pub namespace: String,
    pub name: String,
    pub ports: Vec<ServicePort>,
    pub placement: Placement,
    pub ip_families: IpFamilies,
    pub idle_timeout_minutes: Option<i32>,
    /// Subnet for internal frontends
    pub subnet: Option<String>,
    /// Requested frontend address
    pub load_balancer_ip: Option<String>,
    /// DNS label for public addresses
    pub dns_label: Option<String>,
    /// Node port serving `/healthz` when traffic is kept node-local
    pub health_check_node_port: Option<i32>,
    pub probe_interval_seconds: Option<i32>,
    pub probe_count: Option<i32>,
}

impl ServiceIntent {
    /// Minimal intent with one address family and no optional settings
    pub fn new(
        uid: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            uid: uid.into(),
            namespace: namespace.into(),
            name: name.into(),
            ports: Vec::new(),
            placement: Placement::External,
            ip_families: IpFamilies::V4,
            idle_timeout_minutes: None,
            subnet: None,
            load_balancer_ip: None,
            dns_label: None,
            health_check_node_port: None,
            probe_interval_seconds: None,
            probe_count: None,
        }
    }

    /// `namespace/name`, used in logs
    pub fn qualified_name(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    pub fn is_internal(&self) -> bool {
        self.placement.is_internal()
    }
}

/// A node that should receive traffic from the backend pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRef {
    pub name: String,
    pub provider_id: Option<String>,
}

impl NodeRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider_id: None,
        }
    }
}

/// Target group referenced by forwarding rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendPool {
    pub id: String,
    pub name: String,
}

/// Address bound to a frontend configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FrontendAddress {
    Public {
        address_id: String,
        ip: Option<String>,
    },
    Private {
        subnet: String,
        /// Requested static address, `None` for dynamic allocation
        static_ip: Option<String>,
        /// Address assigned by the provider
        assigned_ip: Option<String>,
    },
}

impl FrontendAddress {
    /// The address traffic arrives on, if known
    pub fn ip(&self) -> Option<&str> {
        match self {
            Self::Public { ip, .. } => ip.as_deref(),
            Self::Private {
                static_ip,
                assigned_ip,
                ..
            } => assigned_ip.as_deref().or(static_ip.as_deref()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontendIpConfig {
    pub id: String,
    pub name: String,
    pub family: AddressFamily,
    pub address: FrontendAddress,
}

/// Health check definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Probe {
    pub id: String,
    pub name: String,
    pub protocol: ProbeProtocol,
    pub port: i32,
    pub request_path: Option<String>,
    pub interval_seconds: i32,
    pub probe_count: i32,
}

/// Forwarding rule: frontend + port to backend pool + probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub family: AddressFamily,
    pub protocol: Protocol,
    pub frontend_port: i32,
    pub backend_port: i32,
    pub frontend_config_id: String,
    pub backend_pool_id: String,
    pub probe_id: Option<String>,
    pub idle_timeout_minutes: Option<i32>,
    pub floating_ip: bool,
    /// Traffic distribution mode; owned by whoever set it, never diffed
    pub load_distribution: Option<String>,
}

/// The cloud-side load balancer resource
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LoadBalancer {
    pub name: String,
    /// Optimistic concurrency token
    pub etag: Option<String>,
    pub backend_pools: Vec<BackendPool>,
    pub frontend_configs: Vec<FrontendIpConfig>,
    pub probes: Vec<Probe>,
    pub rules: Vec<Rule>,
}

impl LoadBalancer {
    /// An empty, not yet created resource
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// A load balancer without frontends is not a valid resource
    pub fn is_empty_of_frontends(&self) -> bool {
        self.frontend_configs.is_empty()
    }
}
