//! lb-sync-engine: keeps a shared cloud load balancer in step with the
//! services exposed through it
//!
//! [`LoadBalancerReconciler::reconcile`] runs one pass for one service. The
//! cloud side is reached only through the traits in [`provider`].

pub mod cache;
pub mod config;
pub mod differ;
pub mod engine;
pub mod error;
pub mod expectation;
pub mod frontend;
pub mod ownership;
pub mod provider;

pub use cache::SnapshotCache;
pub use config::{CloudConfig, ConfigError};
pub use engine::{LoadBalancerReconciler, PassAction, ReconcileOutcome};
pub use error::{ProviderError, ReconcileError};
pub use ownership::ServiceNames;
pub use provider::{
    AddressRequest, CacheInvalidator, LoadBalancerClient, LoadBalancerSnapshot,
    NodeGroupMembership, PublicAddress,
};
