//! Ownership matching for load balancer sub-resources
//!
//! A shared load balancer carries frontends, probes and rules for many
//! services. An item belongs to a service when its name derives from the
//! service's base name; anything else is foreign and is never touched.

use lb_sync_common::naming::{self, has_base_prefix};
use lb_sync_common::{AddressFamily, FrontendIpConfig, IpFamilies, ServiceIntent};

/// Every name derived from one service for one pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceNames {
    base: String,
    ip_families: IpFamilies,
    /// Frontend bound to the primary family
    pub frontend: String,
    pub backend_pool: String,
}

impl ServiceNames {
    pub fn new(cluster: &str, service: &ServiceIntent) -> Self {
        Self {
            base: naming::base_name(service),
            ip_families: service.ip_families,
            frontend: naming::frontend_name(service),
            backend_pool: naming::backend_pool_name(cluster, service),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Frontend name for one of the service's families
    pub fn frontend_for(&self, family: AddressFamily) -> String {
        naming::family_variant(&self.frontend, family, self.ip_families)
    }

    /// Expected frontend names, primary first
    pub fn frontend_names(&self) -> Vec<(AddressFamily, String)> {
        self.ip_families
            .families()
            .into_iter()
            .map(|family| (family, self.frontend_for(family)))
            .collect()
    }

    /// Exact primary/secondary name, or a config created for this service
    /// under another subnet
    pub fn owns_frontend(&self, config: &FrontendIpConfig) -> bool {
        self.frontend_names()
            .iter()
            .any(|(_, name)| name.eq_ignore_ascii_case(&config.name))
            || has_base_prefix(&config.name, &self.base)
    }

    /// Probes and rules: base name with or without a port/family suffix
    pub fn owns_rule_name(&self, name: &str) -> bool {
        has_base_prefix(name, &self.base)
    }
}
