//! Deterministic name and ID derivation
//!
//! Every name the reconciler creates or matches is derived here from the
//! service identity, so ownership checks and expectation building agree.

use crate::model::{AddressFamily, IpFamilies, Placement, ServiceIntent, ServicePort};

/// Suffix of the load balancer that carries internal frontends
pub const INTERNAL_LB_SUFFIX: &str = "-internal";

/// Maximum length of the per-service base name
const BASE_NAME_MAX_LEN: usize = 32;

/// Per-service base name: `a` + UID without dashes, at most 32 chars
pub fn base_name(service: &ServiceIntent) -> String {
    format!("a{}", service.uid.replace('-', ""))
        .chars()
        .take(BASE_NAME_MAX_LEN)
        .collect()
}

/// Base name plus the internal subnet, when one is requested
fn subnet_qualified(service: &ServiceIntent) -> String {
    let base = base_name(service);
    match (service.is_internal(), service.subnet.as_deref()) {
        (true, Some(subnet)) if !subnet.is_empty() => format!("{base}-{subnet}"),
        _ => base,
    }
}

/// Name of the service's primary frontend configuration
pub fn frontend_name(service: &ServiceIntent) -> String {
    subnet_qualified(service)
}

/// Applies the family suffix when `family` is the dual-stack secondary
pub fn family_variant(base: &str, family: AddressFamily, ip_families: IpFamilies) -> String {
    if ip_families.secondary() == Some(family) {
        format!("{base}{}", family.suffix())
    } else {
        base.to_string()
    }
}

/// Probe name for a port; probes are shared by both families
pub fn probe_name(service: &ServiceIntent, port: &ServicePort) -> String {
    format!("{}-{}-{}", subnet_qualified(service), port.protocol, port.port)
}

/// Shared HTTP probe against the node-local health check port
pub fn health_probe_name(service: &ServiceIntent, health_check_port: i32) -> String {
    format!("{}-HTTP-{health_check_port}", subnet_qualified(service))
}

/// Forwarding rule name for a port and family
pub fn rule_name(service: &ServiceIntent, port: &ServicePort, family: AddressFamily) -> String {
    family_variant(&probe_name(service, port), family, service.ip_families)
}

/// Backend pool name: one pool per cluster/service pair
pub fn backend_pool_name(cluster: &str, service: &ServiceIntent) -> String {
    format!("{cluster}-{}", base_name(service))
}

/// Name of the public address resource for a frontend
pub fn address_name(cluster: &str, service: &ServiceIntent, family: AddressFamily) -> String {
    family_variant(
        &format!("{cluster}-{}", base_name(service)),
        family,
        service.ip_families,
    )
}

/// Shared load balancer name for a cluster and placement
pub fn load_balancer_name(cluster: &str, placement: Placement) -> String {
    match placement {
        Placement::Internal => format!("{cluster}{INTERNAL_LB_SUFFIX}"),
        Placement::External => cluster.to_string(),
    }
}

/// Node group backing a load balancer
///
/// The cluster-named load balancer (internal or not) is backed by the
/// primary node group; any other name is the node group's own.
pub fn node_group_for(lb_name: &str, cluster: &str, primary_group: &str) -> String {
    let group = lb_name.strip_suffix(INTERNAL_LB_SUFFIX).unwrap_or(lb_name);
    if group.eq_ignore_ascii_case(cluster) {
        primary_group.to_string()
    } else {
        group.to_string()
    }
}

/// Case-insensitive `name == base` or `name` starts with `base-`
pub fn has_base_prefix(name: &str, base: &str) -> bool {
    let name = name.to_ascii_lowercase();
    let base = base.to_ascii_lowercase();
    name == base || name.starts_with(&format!("{base}-"))
}

/// Load balancer sub-resource collections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubResource {
    FrontendIpConfiguration,
    BackendAddressPool,
    Probe,
    Rule,
}

impl SubResource {
    fn collection(&self) -> &'static str {
        match self {
            Self::FrontendIpConfiguration => "frontendIPConfigurations",
            Self::BackendAddressPool => "backendAddressPools",
            Self::Probe => "probes",
            Self::Rule => "loadBalancingRules",
        }
    }
}

/// Subscription and resource group that own the load balancers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceScope {
    pub subscription_id: String,
    pub resource_group: String,
}

impl ResourceScope {
    pub fn new(subscription_id: impl Into<String>, resource_group: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
        }
    }

    /// Provider ID of a load balancer
    pub fn load_balancer_id(&self, lb_name: &str) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/loadBalancers/{lb_name}",
            self.subscription_id, self.resource_group
        )
    }

    /// Provider ID of a load balancer sub-resource
    pub fn sub_resource_id(&self, lb_name: &str, kind: SubResource, name: &str) -> String {
        format!(
            "{}/{}/{name}",
            self.load_balancer_id(lb_name),
            kind.collection()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Protocol;

    fn service(uid: &str) -> ServiceIntent {
        ServiceIntent::new(uid, "default", "web")
    }

    fn tcp(port: i32) -> ServicePort {
        ServicePort {
            name: None,
            protocol: Protocol::Tcp,
            port,
            node_port: 30000 + port,
        }
    }

    #[test]
    fn test_base_name_strips_dashes() {
        let svc = service("1234-abcd");
        assert_eq!(base_name(&svc), "a1234abcd");
    }

    #[test]
    fn test_base_name_truncates_to_32() {
        let svc = service("0b6a3c3e-9f7f-4a52-8f0e-9d6c5d3c0f11");
        let base = base_name(&svc);
        assert_eq!(base.len(), 32);
        assert!(base.starts_with("a0b6a3c3e9f7f4a52"));
    }

    #[test]
    fn test_frontend_name_internal_with_subnet() {
        let mut svc = service("uid-1");
        assert_eq!(frontend_name(&svc), "auid1");

        svc.placement = Placement::Internal;
        svc.subnet = Some("backend".to_string());
        assert_eq!(frontend_name(&svc), "auid1-backend");

        // Subnet ignored for external placement
        svc.placement = Placement::External;
        assert_eq!(frontend_name(&svc), "auid1");
    }

    #[test]
    fn test_family_variant_only_suffixes_secondary() {
        assert_eq!(
            family_variant("abc", AddressFamily::IPv4, IpFamilies::DualStack),
            "abc-v4"
        );
        assert_eq!(
            family_variant("abc", AddressFamily::IPv6, IpFamilies::DualStack),
            "abc"
        );
        assert_eq!(
            family_variant("abc", AddressFamily::IPv4, IpFamilies::V4),
            "abc"
        );
        assert_eq!(
            family_variant("abc", AddressFamily::IPv6, IpFamilies::V6),
            "abc"
        );
    }

    #[test]
    fn test_rule_and_probe_names() {
        let mut svc = service("uid-1");
        svc.ip_families = IpFamilies::DualStack;
        let port = tcp(80);

        assert_eq!(probe_name(&svc, &port), "auid1-TCP-80");
        assert_eq!(health_probe_name(&svc, 32000), "auid1-HTTP-32000");
        assert_eq!(
            rule_name(&svc, &port, AddressFamily::IPv6),
            "auid1-TCP-80"
        );
        assert_eq!(
            rule_name(&svc, &port, AddressFamily::IPv4),
            "auid1-TCP-80-v4"
        );
    }

    #[test]
    fn test_backend_pool_and_address_names() {
        let mut svc = service("uid-1");
        assert_eq!(backend_pool_name("prod", &svc), "prod-auid1");
        assert_eq!(
            address_name("prod", &svc, AddressFamily::IPv4),
            "prod-auid1"
        );

        svc.ip_families = IpFamilies::DualStack;
        assert_eq!(
            address_name("prod", &svc, AddressFamily::IPv4),
            "prod-auid1-v4"
        );
        assert_eq!(
            address_name("prod", &svc, AddressFamily::IPv6),
            "prod-auid1"
        );
    }

    #[test]
    fn test_load_balancer_name() {
        assert_eq!(load_balancer_name("prod", Placement::External), "prod");
        assert_eq!(
            load_balancer_name("prod", Placement::Internal),
            "prod-internal"
        );
    }

    #[test]
    fn test_node_group_for() {
        assert_eq!(node_group_for("prod", "prod", "pool-main"), "pool-main");
        assert_eq!(
            node_group_for("prod-internal", "prod", "pool-main"),
            "pool-main"
        );
        assert_eq!(node_group_for("gpu", "prod", "pool-main"), "gpu");
        assert_eq!(node_group_for("gpu-internal", "prod", "pool-main"), "gpu");
    }

    #[test]
    fn test_has_base_prefix() {
        assert!(has_base_prefix("auid1", "auid1"));
        assert!(has_base_prefix("AUID1-TCP-80", "auid1"));
        assert!(has_base_prefix("auid1-backend", "auid1"));
        assert!(!has_base_prefix("auid12-TCP-80", "auid1"));
        assert!(!has_base_prefix("other", "auid1"));
    }

    #[test]
    fn test_sub_resource_id() {
        let scope = ResourceScope::new("sub-1", "rg-net");
        assert_eq!(
            scope.sub_resource_id("prod", SubResource::Probe, "auid1-TCP-80"),
            "/subscriptions/sub-1/resourceGroups/rg-net/loadBalancers/prod/probes/auid1-TCP-80"
        );
        assert!(scope
            .sub_resource_id("prod", SubResource::BackendAddressPool, "prod-auid1")
            .ends_with("/backendAddressPools/prod-auid1"));
    }
}
