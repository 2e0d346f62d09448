//! Conversion from `v1/Service` objects to the engine's service intent
//!
//! Only `type: LoadBalancer` Services are converted. Per-service tuning
//! comes from the `lb-sync.io/` annotations in [`crate::config::annotations`].

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Service, ServiceSpec};
use lb_sync_common::validation::{
    parse_idle_timeout, parse_probe_count, parse_probe_interval, validate_dns_label,
    validate_port,
};
use lb_sync_common::{
    validate_ip_address, IpFamilies, Placement, Protocol, ServiceIntent, ServicePort,
    ValidationError,
};
use thiserror::Error;

use crate::config::annotations;

const LOAD_BALANCER_TYPE: &str = "LoadBalancer";
const LOCAL_TRAFFIC_POLICY: &str = "Local";

#[derive(Debug, Error)]
pub enum IntentError {
    #[error("Service is missing {0}")]
    MissingField(&'static str),

    #[error("Service type {0} is not handled")]
    NotLoadBalancer(String),

    #[error("Port {port} has no node port allocated")]
    MissingNodePort { port: i32 },

    #[error("Port {port}: {reason}")]
    UnsupportedProtocol { port: i32, reason: String },

    #[error("Invalid annotation {annotation}: {source}")]
    InvalidAnnotation {
        annotation: &'static str,
        #[source]
        source: ValidationError,
    },

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Whether the Service asks for a load balancer
pub fn is_load_balancer(service: &Service) -> bool {
    service_type(service) == LOAD_BALANCER_TYPE
}

fn service_type(service: &Service) -> &str {
    service
        .spec
        .as_ref()
        .and_then(|spec| spec.type_.as_deref())
        .unwrap_or("ClusterIP")
}

fn annotation<'a>(annotations: Option<&'a BTreeMap<String, String>>, key: &str) -> Option<&'a str> {
    annotations
        .and_then(|annots| annots.get(key))
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

fn parse_annotation<T>(
    annotations: Option<&BTreeMap<String, String>>,
    key: &'static str,
    parse: impl Fn(&str) -> Result<T, ValidationError>,
) -> Result<Option<T>, IntentError> {
    annotation(annotations, key)
        .map(|value| {
            parse(value).map_err(|source| IntentError::InvalidAnnotation {
                annotation: key,
                source,
            })
        })
        .transpose()
}

fn ip_families(spec: Option<&ServiceSpec>) -> IpFamilies {
    let families = spec
        .and_then(|spec| spec.ip_families.as_deref())
        .unwrap_or_default();
    let has = |family: &str| families.iter().any(|f| f.eq_ignore_ascii_case(family));

    match (has("IPv4"), has("IPv6")) {
        (true, true) => IpFamilies::DualStack,
        (false, true) => IpFamilies::V6,
        _ => IpFamilies::V4,
    }
}

/// Identity, placement and address families; enough to find owned items
fn identity(service: &Service) -> Result<ServiceIntent, IntentError> {
    let meta = &service.metadata;
    let name = meta
        .name
        .as_deref()
        .ok_or(IntentError::MissingField("metadata.name"))?;
    let uid = meta
        .uid
        .as_deref()
        .ok_or(IntentError::MissingField("metadata.uid"))?;
    let namespace = meta.namespace.as_deref().unwrap_or("default");
    let annots = meta.annotations.as_ref();

    let mut intent = ServiceIntent::new(uid, namespace, name);
    intent.ip_families = ip_families(service.spec.as_ref());

    let internal = annotation(annots, annotations::INTERNAL)
        .is_some_and(|value| value.eq_ignore_ascii_case("true"));
    if internal {
        intent.placement = Placement::Internal;
        intent.subnet = annotation(annots, annotations::INTERNAL_SUBNET).map(str::to_string);
    }

    Ok(intent)
}

fn convert_port(port: &k8s_openapi::api::core::v1::ServicePort) -> Result<ServicePort, IntentError> {
    let protocol = port
        .protocol
        .as_deref()
        .unwrap_or("TCP")
        .parse::<Protocol>()
        .map_err(|reason| IntentError::UnsupportedProtocol {
            port: port.port,
            reason,
        })?;
    let node_port = port
        .node_port
        .ok_or(IntentError::MissingNodePort { port: port.port })?;

    Ok(ServicePort {
        name: port.name.clone(),
        protocol,
        port: validate_port(port.port)?,
        node_port: validate_port(node_port)?,
    })
}

/// Full intent for a `type: LoadBalancer` Service
pub fn intent_from_service(service: &Service) -> Result<ServiceIntent, IntentError> {
    if !is_load_balancer(service) {
        return Err(IntentError::NotLoadBalancer(service_type(service).to_string()));
    }

    let mut intent = identity(service)?;
    let annots = service.metadata.annotations.as_ref();
    let spec = service.spec.as_ref();

    intent.ports = spec
        .and_then(|spec| spec.ports.as_deref())
        .unwrap_or_default()
        .iter()
        .map(convert_port)
        .collect::<Result<_, _>>()?;

    intent.idle_timeout_minutes =
        parse_annotation(annots, annotations::TCP_IDLE_TIMEOUT, parse_idle_timeout)?;
    intent.probe_interval_seconds =
        parse_annotation(annots, annotations::HEALTH_PROBE_INTERVAL, parse_probe_interval)?;
    intent.probe_count =
        parse_annotation(annots, annotations::HEALTH_PROBE_NUM, parse_probe_count)?;
    intent.dns_label = parse_annotation(annots, annotations::DNS_LABEL_NAME, validate_dns_label)?;

    if let Some(ip) = spec
        .and_then(|spec| spec.load_balancer_ip.as_deref())
        .filter(|ip| !ip.is_empty())
    {
        intent.load_balancer_ip = Some(validate_ip_address(ip)?.to_string());
    }

    let local_traffic = spec
        .and_then(|spec| spec.external_traffic_policy.as_deref())
        .is_some_and(|policy| policy == LOCAL_TRAFFIC_POLICY);
    if local_traffic {
        intent.health_check_node_port = spec.and_then(|spec| spec.health_check_node_port);
    }

    Ok(intent)
}

/// Intent used to remove a Service's items
///
/// Tuning annotations and ports are ignored so that a Service with values
/// that no longer validate can still be cleaned up.
pub fn cleanup_intent(service: &Service) -> Result<ServiceIntent, IntentError> {
    identity(service)
}
