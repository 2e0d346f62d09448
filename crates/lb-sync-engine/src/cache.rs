//! Short-lived load balancer snapshot cache
//!
//! Providers read through this cache when loading snapshots. Backend pool
//! membership changes bump the resource etag, so the reconciler invalidates
//! the entry after every membership sync.

use std::time::Duration;

use lb_sync_common::LoadBalancer;
use moka::sync::Cache;
use tracing::debug;

use crate::config::CacheConfig;
use crate::provider::CacheInvalidator;

/// TTL cache of load balancers keyed by name
#[derive(Clone)]
pub struct SnapshotCache {
    cache: Cache<String, LoadBalancer>,
}

impl SnapshotCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Cache::builder().time_to_live(ttl).build(),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(Duration::from_secs(config.ttl_seconds))
    }

    /// Fresh entry for `name`, if any
    pub fn get(&self, name: &str) -> Option<LoadBalancer> {
        self.cache.get(name)
    }

    pub fn insert(&self, load_balancer: LoadBalancer) {
        self.cache.insert(load_balancer.name.clone(), load_balancer);
    }

    /// Drop the entry; returns whether one was present
    pub fn remove(&self, name: &str) -> bool {
        self.cache.remove(name).is_some()
    }
}

impl CacheInvalidator for SnapshotCache {
    fn invalidate(&self, name: &str) {
        if self.remove(name) {
            debug!(lb = %name, "Invalidated cached load balancer");
        }
    }
}
