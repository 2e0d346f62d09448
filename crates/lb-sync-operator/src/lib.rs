//! lb-sync-operator: Kubernetes Service controller for shared cloud load balancers
//!
//! This crate is a library with no binary target. The provider SDK behind
//! [`lb_sync_engine::LoadBalancerClient`] and [`lb_sync_engine::NodeGroupMembership`]
//! is supplied by the embedding program, which wires the controller up in
//! this order:
//!
//! 1. [`telemetry::init`] installs the JSON tracing subscriber.
//! 2. Build a [`lb_sync_engine::LoadBalancerReconciler`] from the provider
//!    client, node group membership, snapshot cache and cloud config.
//! 3. [`ControllerContext::new`] takes the reconciler (as a [`LoadBalancerSync`]),
//!    a kube `Client` and an [`OperatorConfig`] loaded with
//!    [`OperatorConfig::from_file`].
//! 4. [`run`] drives the Service controller until a shutdown signal arrives.
//!
//! ```ignore
//! lb_sync_operator::telemetry::init()?;
//! let config = OperatorConfig::from_file("/etc/lb-sync/config.toml")?;
//! let engine = LoadBalancerReconciler::new(
//!     provider,
//!     membership,
//!     Arc::new(cache.clone()),
//!     Arc::new(config.cloud.clone()),
//! );
//! let client = kube::Client::try_default().await?;
//! let ctx = ControllerContext::new(Arc::new(engine), client.clone(), config);
//! lb_sync_operator::run(client, Arc::new(ctx)).await;
//! ```

pub mod balancer;
pub mod config;
pub mod controllers;
pub mod intent;
pub mod nodes;
pub mod telemetry;

pub use balancer::LoadBalancerSync;
pub use config::OperatorConfig;
pub use controllers::service::{run, ControllerError};
pub use controllers::ControllerContext;
