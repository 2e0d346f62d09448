//! Kubernetes controllers

pub mod retry;
pub mod service;

use std::sync::Arc;

use kube::Client;

use crate::balancer::LoadBalancerSync;
use crate::config::OperatorConfig;
use crate::nodes::{KubeNodeLister, NodeLister};
use retry::RetryTracker;

/// Shared state for the controllers
pub struct ControllerContext {
    /// Reconciliation engine
    pub balancer: Arc<dyn LoadBalancerSync>,
    /// Source of backend pool members
    pub nodes: Arc<dyn NodeLister>,
    pub config: Arc<OperatorConfig>,
    /// Kubernetes API client (shared across controllers)
    pub kube_client: Client,
    pub retry_tracker: Arc<RetryTracker>,
}

impl ControllerContext {
    /// Context listing nodes through `kube_client`
    pub fn new(
        balancer: Arc<dyn LoadBalancerSync>,
        kube_client: Client,
        config: OperatorConfig,
    ) -> Self {
        Self {
            balancer,
            nodes: Arc::new(KubeNodeLister::new(kube_client.clone())),
            config: Arc::new(config),
            kube_client,
            retry_tracker: Arc::new(RetryTracker::new()),
        }
    }
}
