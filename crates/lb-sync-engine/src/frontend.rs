//! Frontend IP configuration expectations
//!
//! Frontends cannot be renamed or re-addressed in place. An owned frontend
//! whose name, family or address no longer matches is dropped and created
//! again under the expected spec.

use std::net::IpAddr;

use lb_sync_common::{AddressFamily, FrontendAddress, FrontendIpConfig, LoadBalancer, ServiceIntent};

use crate::config::CloudConfig;
use crate::error::ReconcileError;
use crate::ownership::ServiceNames;

/// Address a frontend should be bound to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpectedAddress {
    Private {
        subnet: String,
        static_ip: Option<String>,
    },
    Public {
        requested_ip: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedFrontend {
    pub name: String,
    pub family: AddressFamily,
    pub address: ExpectedAddress,
}

/// The requested address applies to the frontend of its own family
///
/// Returned in canonical form so it compares equal to what the provider reports.
fn requested_ip_for(service: &ServiceIntent, family: AddressFamily) -> Option<String> {
    let ip = service.load_balancer_ip.as_deref()?.parse::<IpAddr>().ok()?;
    let matches = match ip {
        IpAddr::V4(_) => family == AddressFamily::IPv4,
        IpAddr::V6(_) => family == AddressFamily::IPv6,
    };
    matches.then(|| ip.to_string())
}

/// Address equality on parsed values; unparsable text falls back to a
/// case-insensitive comparison
fn same_ip(a: &str, b: &str) -> bool {
    match (a.parse::<IpAddr>(), b.parse::<IpAddr>()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a.eq_ignore_ascii_case(b),
    }
}

/// Frontends the service should own, primary family first
pub fn expected_frontends(
    service: &ServiceIntent,
    names: &ServiceNames,
    config: &CloudConfig,
) -> Result<Vec<ExpectedFrontend>, ReconcileError> {
    let subnet = if service.is_internal() {
        let subnet = service
            .subnet
            .clone()
            .filter(|s| !s.is_empty())
            .or_else(|| config.default_internal_subnet.clone())
            .ok_or_else(|| ReconcileError::MissingSubnet(service.qualified_name()))?;
        Some(subnet)
    } else {
        None
    };

    Ok(names
        .frontend_names()
        .into_iter()
        .map(|(family, name)| {
            let address = match &subnet {
                Some(subnet) => ExpectedAddress::Private {
                    subnet: subnet.clone(),
                    static_ip: requested_ip_for(service, family),
                },
                None => ExpectedAddress::Public {
                    requested_ip: requested_ip_for(service, family),
                },
            };
            ExpectedFrontend {
                name,
                family,
                address,
            }
        })
        .collect())
}

/// Whether an owned frontend must be dropped and re-created
pub fn is_frontend_changed(config: &FrontendIpConfig, expected: &[ExpectedFrontend]) -> bool {
    let Some(spec) = expected
        .iter()
        .find(|spec| spec.name.eq_ignore_ascii_case(&config.name))
    else {
        // Owned under a name this service no longer uses
        return true;
    };

    if config.family != spec.family {
        return true;
    }

    match (&config.address, &spec.address) {
        (
            FrontendAddress::Private {
                subnet, static_ip, ..
            },
            ExpectedAddress::Private {
                subnet: want_subnet,
                static_ip: want_ip,
            },
        ) => {
            let same_static = match (static_ip, want_ip) {
                (Some(have), Some(want)) => same_ip(have, want),
                (None, None) => true,
                _ => false,
            };
            !subnet.eq_ignore_ascii_case(want_subnet) || !same_static
        }
        (FrontendAddress::Public { ip, .. }, ExpectedAddress::Public { requested_ip }) => {
            match requested_ip {
                Some(want) => !ip.as_deref().is_some_and(|have| same_ip(have, want)),
                None => false,
            }
        }
        _ => true,
    }
}

/// Addresses of the service's frontends, primary family first
pub fn ingress_addresses(load_balancer: &LoadBalancer, names: &ServiceNames) -> Vec<String> {
    names
        .frontend_names()
        .iter()
        .filter_map(|(_, name)| {
            load_balancer
                .frontend_configs
                .iter()
                .find(|config| config.name.eq_ignore_ascii_case(name))
        })
        .filter_map(|config| config.address.ip().map(str::to_string))
        .collect()
}
