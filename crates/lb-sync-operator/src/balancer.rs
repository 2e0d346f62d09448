//! Seam between the Service controller and the reconciliation engine

use async_trait::async_trait;
use lb_sync_common::{NodeRef, ServiceIntent};
use lb_sync_engine::frontend::ingress_addresses;
use lb_sync_engine::{LoadBalancerReconciler, ReconcileError, ServiceNames};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LoadBalancerSync: Send + Sync {
    /// Make the load balancer expose `service` on `nodes`
    ///
    /// Returns the service's frontend addresses, primary family first.
    async fn ensure(
        &self,
        cluster: &str,
        service: &ServiceIntent,
        nodes: &[NodeRef],
    ) -> Result<Vec<String>, ReconcileError>;

    /// Remove everything `service` owns on its load balancer
    async fn ensure_deleted(
        &self,
        cluster: &str,
        service: &ServiceIntent,
    ) -> Result<(), ReconcileError>;
}

#[async_trait]
impl LoadBalancerSync for LoadBalancerReconciler {
    async fn ensure(
        &self,
        cluster: &str,
        service: &ServiceIntent,
        nodes: &[NodeRef],
    ) -> Result<Vec<String>, ReconcileError> {
        let outcome = self.reconcile(cluster, service, nodes, true).await?;
        let names = ServiceNames::new(cluster, service);
        Ok(outcome
            .load_balancer
            .map(|lb| ingress_addresses(&lb, &names))
            .unwrap_or_default())
    }

    async fn ensure_deleted(
        &self,
        cluster: &str,
        service: &ServiceIntent,
    ) -> Result<(), ReconcileError> {
        self.reconcile(cluster, service, &[], false).await?;
        Ok(())
    }
}
