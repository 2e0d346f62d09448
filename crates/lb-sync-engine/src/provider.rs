//! Collaborator interfaces consumed by the reconciler
//!
//! Implementations talk to the cloud management API. The reconciler calls
//! them in a fixed order and never retries; a failed call aborts the pass.

use async_trait::async_trait;
use lb_sync_common::{AddressFamily, LoadBalancer, NodeRef, Placement, ServiceIntent};

use crate::error::ProviderError;

/// Current state of the load balancer a service maps to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadBalancerSnapshot {
    /// The resource, or an empty one named for the service when it does not exist
    pub load_balancer: LoadBalancer,
    pub exists: bool,
    pub placement: Placement,
}

/// Request for a public address backing an external frontend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRequest {
    pub name: String,
    pub family: AddressFamily,
    pub domain_label: Option<String>,
    pub cluster: String,
    /// The address must already exist (user-requested IP); never create it
    pub must_preexist: bool,
    pub requested_ip: Option<String>,
}

/// Reference to a provisioned public address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicAddress {
    pub id: String,
    pub ip: Option<String>,
}

/// Load balancer resource operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LoadBalancerClient: Send + Sync {
    /// Read the load balancer this service maps to
    async fn load_snapshot(
        &self,
        service: &ServiceIntent,
        cluster: &str,
        nodes: &[NodeRef],
        want_lb: bool,
    ) -> Result<LoadBalancerSnapshot, ProviderError>;

    /// Find or create the public address for an external frontend
    async fn provision_address(
        &self,
        service: &ServiceIntent,
        request: &AddressRequest,
    ) -> Result<PublicAddress, ProviderError>;

    /// Write the whole resource back, guarded by its etag
    async fn submit_update(
        &self,
        service: &ServiceIntent,
        load_balancer: &LoadBalancer,
    ) -> Result<(), ProviderError>;

    async fn delete_resource(&self, service: &ServiceIntent, name: &str)
        -> Result<(), ProviderError>;

    /// Read a load balancer by name, `None` if it does not exist
    async fn refetch(&self, name: &str) -> Result<Option<LoadBalancer>, ProviderError>;
}

/// Node-group level backend pool membership
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NodeGroupMembership: Send + Sync {
    /// Add the nodes of `node_group` to the backend pool
    async fn ensure_hosts_in_pool(
        &self,
        service: &ServiceIntent,
        nodes: &[NodeRef],
        pool_id: &str,
        node_group: &str,
        is_internal: bool,
    ) -> Result<(), ProviderError>;

    /// Detach the node group from the pool ahead of load balancer deletion
    async fn ensure_pool_deleted(
        &self,
        service: &ServiceIntent,
        pool_id: &str,
        node_group: &str,
        current_pools: &[String],
    ) -> Result<(), ProviderError>;
}

/// Notified after backend pool membership changes
#[cfg_attr(test, mockall::automock)]
pub trait CacheInvalidator: Send + Sync {
    fn invalidate(&self, name: &str);
}
