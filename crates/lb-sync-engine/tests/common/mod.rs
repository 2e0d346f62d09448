//! In-memory cloud shared by the reconciliation suites
//!
//! `FakeCloud` stores load balancers by name, enforces etags on update,
//! assigns private addresses the way the provider does, and records every
//! collaborator call so tests can assert on ordering.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use lb_sync_common::naming::load_balancer_name;
use lb_sync_common::{
    AddressFamily, FrontendAddress, LoadBalancer, NodeRef, Protocol, ResourceScope,
    ServiceIntent, ServicePort,
};
use lb_sync_engine::{
    AddressRequest, CloudConfig, LoadBalancerClient, LoadBalancerReconciler,
    LoadBalancerSnapshot, NodeGroupMembership, ProviderError, PublicAddress, SnapshotCache,
};
use parking_lot::Mutex;

pub const CLUSTER: &str = "prod";

/// Collaborator calls in the order they were made
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    LoadSnapshot(String),
    ProvisionAddress(String),
    SubmitUpdate(String),
    DeleteResource(String),
    Refetch(String),
    EnsureHostsInPool { pool_id: String, node_group: String },
    EnsurePoolDeleted { pool_id: String, node_group: String },
}

pub struct FakeCloud {
    scope: ResourceScope,
    resources: Mutex<HashMap<String, LoadBalancer>>,
    members: Mutex<HashMap<String, Vec<String>>>,
    calls: Mutex<Vec<Call>>,
    submitted: Mutex<Vec<LoadBalancer>>,
    cache: Arc<SnapshotCache>,
    next_etag: AtomicU32,
    next_address: AtomicU32,
    /// Bump the stored etag right after the next load, as a concurrent writer would
    interleave_writer: AtomicBool,
    /// Drop the resource right after the next update
    vanish_after_update: AtomicBool,
}

impl FakeCloud {
    pub fn new(config: &CloudConfig) -> Arc<Self> {
        Arc::new(Self {
            scope: config.scope(),
            resources: Mutex::new(HashMap::new()),
            members: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
            cache: Arc::new(SnapshotCache::from_config(&config.cache)),
            next_etag: AtomicU32::new(1),
            next_address: AtomicU32::new(1),
            interleave_writer: AtomicBool::new(false),
            vanish_after_update: AtomicBool::new(false),
        })
    }

    pub fn cache(&self) -> Arc<SnapshotCache> {
        Arc::clone(&self.cache)
    }

    /// Store a resource as if written by someone else, with a fresh etag
    pub fn seed(&self, mut load_balancer: LoadBalancer) {
        load_balancer.etag = Some(self.new_etag());
        self.cache.remove(&load_balancer.name);
        self.resources
            .lock()
            .insert(load_balancer.name.clone(), load_balancer);
    }

    pub fn stored(&self, name: &str) -> Option<LoadBalancer> {
        self.resources.lock().get(name).cloned()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Every resource passed to `submit_update`, in order
    pub fn submitted(&self) -> Vec<LoadBalancer> {
        self.submitted.lock().clone()
    }

    pub fn members(&self, pool_id: &str) -> Vec<String> {
        self.members.lock().get(pool_id).cloned().unwrap_or_default()
    }

    pub fn interleave_writer_once(&self) {
        self.interleave_writer.store(true, Ordering::SeqCst);
    }

    pub fn vanish_after_update_once(&self) {
        self.vanish_after_update.store(true, Ordering::SeqCst);
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }

    fn new_etag(&self) -> String {
        self.next_etag.fetch_add(1, Ordering::SeqCst).to_string()
    }

    fn bump_etag(&self, name: &str) {
        let etag = self.new_etag();
        if let Some(lb) = self.resources.lock().get_mut(name) {
            lb.etag = Some(etag);
        }
    }

    fn allocate_ip(&self, family: AddressFamily, private: bool) -> String {
        let n = self.next_address.fetch_add(1, Ordering::SeqCst);
        match (family, private) {
            (AddressFamily::IPv4, false) => format!("20.0.0.{n}"),
            (AddressFamily::IPv4, true) => format!("10.240.0.{n}"),
            (AddressFamily::IPv6, false) => format!("2001:db8::{n}"),
            (AddressFamily::IPv6, true) => format!("fd00::{n}"),
        }
    }
}

#[async_trait]
impl LoadBalancerClient for FakeCloud {
    async fn load_snapshot(
        &self,
        service: &ServiceIntent,
        cluster: &str,
        _nodes: &[NodeRef],
        _want_lb: bool,
    ) -> Result<LoadBalancerSnapshot, ProviderError> {
        let name = load_balancer_name(cluster, service.placement);
        self.record(Call::LoadSnapshot(name.clone()));

        let cached = self.cache.get(&name);
        let found = cached.or_else(|| {
            let stored = self.stored(&name);
            if let Some(lb) = &stored {
                self.cache.insert(lb.clone());
            }
            stored
        });

        if self.interleave_writer.swap(false, Ordering::SeqCst) {
            self.bump_etag(&name);
        }

        Ok(LoadBalancerSnapshot {
            exists: found.is_some(),
            load_balancer: found.unwrap_or_else(|| LoadBalancer::empty(&name)),
            placement: service.placement,
        })
    }

    async fn provision_address(
        &self,
        _service: &ServiceIntent,
        request: &AddressRequest,
    ) -> Result<PublicAddress, ProviderError> {
        self.record(Call::ProvisionAddress(request.name.clone()));
        // Provider reports addresses in canonical form
        let ip = match &request.requested_ip {
            Some(ip) => ip
                .parse::<IpAddr>()
                .map(|addr| addr.to_string())
                .unwrap_or_else(|_| ip.clone()),
            None => self.allocate_ip(request.family, false),
        };
        Ok(PublicAddress {
            id: format!(
                "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Network/publicIPAddresses/{}",
                self.scope.subscription_id, self.scope.resource_group, request.name
            ),
            ip: Some(ip),
        })
    }

    async fn submit_update(
        &self,
        _service: &ServiceIntent,
        load_balancer: &LoadBalancer,
    ) -> Result<(), ProviderError> {
        self.record(Call::SubmitUpdate(load_balancer.name.clone()));
        self.submitted.lock().push(load_balancer.clone());

        if load_balancer.frontend_configs.is_empty() {
            return Err(ProviderError::Rejected(
                "load balancer requires at least one frontend".to_string(),
            ));
        }

        let current_etag = self.stored(&load_balancer.name).and_then(|lb| lb.etag);
        if current_etag != load_balancer.etag {
            // Stale snapshot: drop it so the retry reads the live resource
            self.cache.remove(&load_balancer.name);
            return Err(ProviderError::Conflict {
                resource: load_balancer.name.clone(),
            });
        }

        let mut stored = load_balancer.clone();
        stored.etag = Some(self.new_etag());
        for config in &mut stored.frontend_configs {
            if let FrontendAddress::Private {
                static_ip,
                assigned_ip,
                ..
            } = &mut config.address
            {
                if assigned_ip.is_none() {
                    *assigned_ip = Some(match static_ip {
                        Some(ip) => ip.clone(),
                        None => self.allocate_ip(config.family, true),
                    });
                }
            }
        }

        self.cache.remove(&load_balancer.name);
        if self.vanish_after_update.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        self.resources
            .lock()
            .insert(load_balancer.name.clone(), stored);
        Ok(())
    }

    async fn delete_resource(
        &self,
        _service: &ServiceIntent,
        name: &str,
    ) -> Result<(), ProviderError> {
        self.record(Call::DeleteResource(name.to_string()));
        self.cache.remove(name);
        match self.resources.lock().remove(name) {
            Some(_) => Ok(()),
            None => Err(ProviderError::NotFound {
                resource: name.to_string(),
            }),
        }
    }

    async fn refetch(&self, name: &str) -> Result<Option<LoadBalancer>, ProviderError> {
        self.record(Call::Refetch(name.to_string()));
        Ok(self.stored(name))
    }
}

#[async_trait]
impl NodeGroupMembership for FakeCloud {
    async fn ensure_hosts_in_pool(
        &self,
        _service: &ServiceIntent,
        nodes: &[NodeRef],
        pool_id: &str,
        node_group: &str,
        _is_internal: bool,
    ) -> Result<(), ProviderError> {
        self.record(Call::EnsureHostsInPool {
            pool_id: pool_id.to_string(),
            node_group: node_group.to_string(),
        });
        {
            let mut members = self.members.lock();
            let pool = members.entry(pool_id.to_string()).or_default();
            for node in nodes {
                if !pool.contains(&node.name) {
                    pool.push(node.name.clone());
                }
            }
        }

        // Pool membership lives on the load balancer resource
        let lb_name = pool_id
            .split("/loadBalancers/")
            .nth(1)
            .and_then(|rest| rest.split('/').next())
            .unwrap_or_default()
            .to_string();
        self.bump_etag(&lb_name);
        Ok(())
    }

    async fn ensure_pool_deleted(
        &self,
        _service: &ServiceIntent,
        pool_id: &str,
        node_group: &str,
        _current_pools: &[String],
    ) -> Result<(), ProviderError> {
        self.record(Call::EnsurePoolDeleted {
            pool_id: pool_id.to_string(),
            node_group: node_group.to_string(),
        });
        self.members.lock().remove(pool_id);
        Ok(())
    }
}

pub fn cloud_config() -> CloudConfig {
    CloudConfig::from_toml_str(
        r#"
        subscription_id = "sub-1"
        resource_group = "rg-net"
        primary_node_group = "pool-main"
        default_internal_subnet = "nodes"
        "#,
    )
    .expect("valid test config")
}

pub fn reconciler(cloud: &Arc<FakeCloud>, config: CloudConfig) -> LoadBalancerReconciler {
    LoadBalancerReconciler::new(
        Arc::clone(cloud) as Arc<dyn LoadBalancerClient>,
        Arc::clone(cloud) as Arc<dyn NodeGroupMembership>,
        cloud.cache(),
        Arc::new(config),
    )
}

pub fn tcp(port: i32) -> ServicePort {
    ServicePort {
        name: None,
        protocol: Protocol::Tcp,
        port,
        node_port: 30000 + port,
    }
}

pub fn udp(port: i32) -> ServicePort {
    ServicePort {
        name: None,
        protocol: Protocol::Udp,
        port,
        node_port: 31000 + port,
    }
}

pub fn service(uid: &str, name: &str, ports: Vec<ServicePort>) -> ServiceIntent {
    let mut svc = ServiceIntent::new(uid, "default", name);
    svc.ports = ports;
    svc
}

pub fn nodes() -> Vec<NodeRef> {
    vec![NodeRef::new("node-1"), NodeRef::new("node-2")]
}
