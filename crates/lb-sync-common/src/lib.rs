//! lb-sync-common: data model, naming and validation shared by the
//! reconciliation engine and the operator

pub mod model;
pub mod naming;
pub mod validation;

pub use model::{
    AddressFamily, BackendPool, FrontendAddress, FrontendIpConfig, IpFamilies, LoadBalancer,
    NodeRef, Placement, Probe, ProbeProtocol, Protocol, Rule, ServiceIntent, ServicePort,
};
pub use naming::{ResourceScope, SubResource};
pub use validation::{validate_ip_address, ValidationError, ValidationResult};
