//! Expected probes and forwarding rules for a service
//!
//! Built once per active address family and merged before diffing. Probes
//! are family-independent, so merging deduplicates them by protocol and port.

use lb_sync_common::naming::{self, SubResource};
use lb_sync_common::validation::{validate_idle_timeout, validate_port};
use lb_sync_common::{
    AddressFamily, Probe, ProbeProtocol, Protocol, ResourceScope, Rule, ServiceIntent,
    ServicePort, ValidationResult,
};

use crate::config::ProbeDefaults;

/// Path served by kube-proxy on the health check node port
pub const HEALTH_CHECK_PATH: &str = "/healthz";

/// Everything the builder needs for one address family
#[derive(Debug, Clone)]
pub struct ExpectationInput<'a> {
    pub service: &'a ServiceIntent,
    pub want_lb: bool,
    pub family: AddressFamily,
    pub frontend_config_id: &'a str,
    pub backend_pool_id: &'a str,
    pub lb_name: &'a str,
    pub scope: &'a ResourceScope,
    pub probe_defaults: &'a ProbeDefaults,
    pub floating_ip: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expectations {
    pub probes: Vec<Probe>,
    pub rules: Vec<Rule>,
}

impl Expectations {
    /// Concatenate another family's expectations, keeping one probe per
    /// (protocol, port)
    pub fn merge(mut self, other: Expectations) -> Self {
        for probe in other.probes {
            push_probe(&mut self.probes, probe);
        }
        self.rules.extend(other.rules);
        self
    }
}

fn push_probe(probes: &mut Vec<Probe>, probe: Probe) {
    let duplicate = probes
        .iter()
        .any(|p| p.protocol == probe.protocol && p.port == probe.port);
    if !duplicate {
        probes.push(probe);
    }
}

/// Derive the probes and rules `input.family` should have
pub fn build(input: &ExpectationInput<'_>) -> ValidationResult<Expectations> {
    if !input.want_lb {
        return Ok(Expectations::default());
    }

    let service = input.service;
    let idle_timeout = service
        .idle_timeout_minutes
        .map(validate_idle_timeout)
        .transpose()?;

    let mut expected = Expectations::default();
    for port in &service.ports {
        validate_port(port.port)?;
        validate_port(port.node_port)?;

        let probe = expected_probe(input, port);
        let probe_id = probe.as_ref().map(|p| p.id.clone());
        if let Some(probe) = probe {
            push_probe(&mut expected.probes, probe);
        }

        let name = naming::rule_name(service, port, input.family);
        expected.rules.push(Rule {
            id: input
                .scope
                .sub_resource_id(input.lb_name, SubResource::Rule, &name),
            name,
            family: input.family,
            protocol: port.protocol,
            frontend_port: port.port,
            backend_port: if input.floating_ip {
                port.port
            } else {
                port.node_port
            },
            frontend_config_id: input.frontend_config_id.to_string(),
            backend_pool_id: input.backend_pool_id.to_string(),
            probe_id,
            // UDP rules carry no idle timeout
            idle_timeout_minutes: match port.protocol {
                Protocol::Tcp => idle_timeout,
                Protocol::Udp => None,
            },
            floating_ip: input.floating_ip,
            load_distribution: None,
        });
    }

    Ok(expected)
}

/// Node-local services are probed over HTTP on the health check port;
/// otherwise TCP ports get a TCP probe on their node port and UDP none.
fn expected_probe(input: &ExpectationInput<'_>, port: &ServicePort) -> Option<Probe> {
    let service = input.service;
    let (name, protocol, probe_port, request_path) = match service.health_check_node_port {
        Some(hc_port) => (
            naming::health_probe_name(service, hc_port),
            ProbeProtocol::Http,
            hc_port,
            Some(HEALTH_CHECK_PATH.to_string()),
        ),
        None if port.protocol == Protocol::Tcp => (
            naming::probe_name(service, port),
            ProbeProtocol::Tcp,
            port.node_port,
            None,
        ),
        None => return None,
    };

    Some(Probe {
        id: input
            .scope
            .sub_resource_id(input.lb_name, SubResource::Probe, &name),
        name,
        protocol,
        port: probe_port,
        request_path,
        interval_seconds: service
            .probe_interval_seconds
            .unwrap_or(input.probe_defaults.interval_seconds),
        probe_count: service
            .probe_count
            .unwrap_or(input.probe_defaults.probe_count),
    })
}

/// Probe equality: same name and the same health check definition
pub fn probe_matches(existing: &Probe, expected: &Probe) -> bool {
    existing.name.eq_ignore_ascii_case(&expected.name)
        && existing.protocol == expected.protocol
        && existing.port == expected.port
        && existing.request_path == expected.request_path
        && existing.interval_seconds == expected.interval_seconds
        && existing.probe_count == expected.probe_count
}

/// Rule equality; the traffic distribution mode is not compared
pub fn rule_matches(existing: &Rule, expected: &Rule) -> bool {
    existing.name.eq_ignore_ascii_case(&expected.name)
        && existing.family == expected.family
        && existing.protocol == expected.protocol
        && existing.frontend_port == expected.frontend_port
        && existing.backend_port == expected.backend_port
        && existing
            .frontend_config_id
            .eq_ignore_ascii_case(&expected.frontend_config_id)
        && existing
            .backend_pool_id
            .eq_ignore_ascii_case(&expected.backend_pool_id)
        && existing.probe_id == expected.probe_id
        && existing.idle_timeout_minutes == expected.idle_timeout_minutes
        && existing.floating_ip == expected.floating_ip
}
