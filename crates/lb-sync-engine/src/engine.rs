//! Reconciliation engine
//!
//! A pass loads the load balancer the service maps to, diffs its four
//! sub-resource collections against the service's intent, and commits the
//! result with a single update or delete. Backend pool membership is synced
//! afterwards. Nothing is retried here; a failed pass is safe to re-run
//! from a fresh snapshot.

use std::sync::Arc;

use lb_sync_common::naming::{self, SubResource};
use lb_sync_common::{
    BackendPool, FrontendAddress, FrontendIpConfig, LoadBalancer, NodeRef, Probe,
    ResourceScope, Rule, ServiceIntent,
};
use tracing::{debug, info, instrument, warn};

use crate::config::CloudConfig;
use crate::differ::{self, Diff};
use crate::error::ReconcileError;
use crate::expectation::{self, ExpectationInput, Expectations};
use crate::frontend::{self, ExpectedAddress, ExpectedFrontend};
use crate::ownership::ServiceNames;
use crate::provider::{AddressRequest, CacheInvalidator, LoadBalancerClient, NodeGroupMembership};

/// What a pass did to the resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassAction {
    Unchanged,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub action: PassAction,
    /// Final resource state, `None` after deletion or when nothing exists
    pub load_balancer: Option<LoadBalancer>,
}

/// A load balancer without frontends cannot be submitted; it is deleted
pub fn resolve_action(load_balancer: &LoadBalancer, dirty: bool) -> PassAction {
    if !dirty {
        PassAction::Unchanged
    } else if load_balancer.is_empty_of_frontends() {
        PassAction::Delete
    } else {
        PassAction::Update
    }
}

/// Names and IDs fixed for the duration of one pass
struct Pass<'a> {
    cluster: &'a str,
    service: &'a ServiceIntent,
    names: ServiceNames,
    lb_name: String,
    scope: ResourceScope,
    pool_id: String,
}

impl<'a> Pass<'a> {
    fn new(
        cluster: &'a str,
        service: &'a ServiceIntent,
        lb_name: &str,
        config: &CloudConfig,
    ) -> Self {
        let names = ServiceNames::new(cluster, service);
        let scope = config.scope();
        let pool_id =
            scope.sub_resource_id(lb_name, SubResource::BackendAddressPool, &names.backend_pool);
        Self {
            cluster,
            service,
            names,
            lb_name: lb_name.to_string(),
            scope,
            pool_id,
        }
    }

    fn frontend_id(&self, name: &str) -> String {
        self.scope
            .sub_resource_id(&self.lb_name, SubResource::FrontendIpConfiguration, name)
    }
}

fn same_name<T: differ::Named>(a: &T, b: &T) -> bool {
    a.name().eq_ignore_ascii_case(b.name())
}

/// Pools are only ever added here; they go away with the whole resource
fn backend_pool_stage(current: &LoadBalancer, pass: &Pass<'_>, want_lb: bool) -> Diff<BackendPool> {
    let existing = Diff::unchanged(current.backend_pools.clone());
    if !want_lb {
        return existing;
    }
    let wanted = BackendPool {
        id: pass.pool_id.clone(),
        name: pass.names.backend_pool.clone(),
    };
    differ::append_missing(existing, &[wanted], same_name)
}

fn probe_stage(current: &LoadBalancer, pass: &Pass<'_>, expected: &[Probe]) -> Diff<Probe> {
    differ::reconcile_collection(
        &current.probes,
        expected,
        |probe| pass.names.owns_rule_name(&probe.name),
        expectation::probe_matches,
    )
}

fn rule_stage(current: &LoadBalancer, pass: &Pass<'_>, expected: &[Rule]) -> Diff<Rule> {
    differ::reconcile_collection(
        &current.rules,
        expected,
        |rule| pass.names.owns_rule_name(&rule.name),
        expectation::rule_matches,
    )
}

/// Drives reconciliation passes against the cloud collaborators
pub struct LoadBalancerReconciler {
    client: Arc<dyn LoadBalancerClient>,
    membership: Arc<dyn NodeGroupMembership>,
    cache: Arc<dyn CacheInvalidator>,
    config: Arc<CloudConfig>,
}

impl LoadBalancerReconciler {
    pub fn new(
        client: Arc<dyn LoadBalancerClient>,
        membership: Arc<dyn NodeGroupMembership>,
        cache: Arc<dyn CacheInvalidator>,
        config: Arc<CloudConfig>,
    ) -> Self {
        Self {
            client,
            membership,
            cache,
            config,
        }
    }

    pub fn config(&self) -> &CloudConfig {
        &self.config
    }

    /// Run one pass for `service`
    ///
    /// `want_lb = false` removes everything the service owns and deletes the
    /// load balancer once no frontends remain. `nodes` are only used when
    /// `want_lb` is set.
    #[instrument(skip(self, service, nodes), fields(service = %service.qualified_name()))]
    pub async fn reconcile(
        &self,
        cluster: &str,
        service: &ServiceIntent,
        nodes: &[NodeRef],
        want_lb: bool,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let snapshot = self
            .client
            .load_snapshot(service, cluster, nodes, want_lb)
            .await
            .map_err(|source| {
                warn!(error = %source, "Failed to load load balancer");
                ReconcileError::Snapshot {
                    service: service.qualified_name(),
                    source,
                }
            })?;
        let current = snapshot.load_balancer;
        let pass = Pass::new(cluster, service, &current.name, &self.config);
        debug!(
            lb = %pass.lb_name,
            exists = snapshot.exists,
            placement = %snapshot.placement,
            "Resolved load balancer"
        );

        // Computed up front so invalid intents fail before any address is provisioned
        let expected_frontends = if want_lb {
            frontend::expected_frontends(service, &pass.names, &self.config)?
        } else {
            Vec::new()
        };
        let expectations = self.expectations(&pass, want_lb)?;

        let pools = backend_pool_stage(&current, &pass, want_lb);
        let frontends = self
            .frontend_stage(&current, &pass, &expected_frontends, want_lb)
            .await?;
        let probes = probe_stage(&current, &pass, &expectations.probes);
        let rules = rule_stage(&current, &pass, &expectations.rules);

        let dirty = pools.changed;
        let dirty = frontends.merge_changed(dirty);
        let dirty = probes.merge_changed(dirty);
        let dirty = rules.merge_changed(dirty);

        let updated = LoadBalancer {
            name: current.name.clone(),
            etag: current.etag.clone(),
            backend_pools: pools.items,
            frontend_configs: frontends.items,
            probes: probes.items,
            rules: rules.items,
        };

        let action = resolve_action(&updated, dirty);
        let load_balancer = match action {
            PassAction::Unchanged => {
                debug!(lb = %pass.lb_name, "Load balancer unchanged");
                snapshot.exists.then_some(current)
            }
            PassAction::Delete => {
                self.delete(&pass, &updated).await?;
                None
            }
            PassAction::Update => Some(self.update(&pass, updated).await?),
        };

        if want_lb && !nodes.is_empty() {
            self.sync_membership(&pass, nodes).await?;
        }

        info!(lb = %pass.lb_name, want_lb, ?action, "Reconciled load balancer");
        Ok(ReconcileOutcome {
            action,
            load_balancer,
        })
    }

    /// Build and merge expectations for every active family
    fn expectations(&self, pass: &Pass<'_>, want_lb: bool) -> Result<Expectations, ReconcileError> {
        let mut merged = Expectations::default();
        for (family, name) in pass.names.frontend_names() {
            let frontend_config_id = pass.frontend_id(&name);
            let input = ExpectationInput {
                service: pass.service,
                want_lb,
                family,
                frontend_config_id: &frontend_config_id,
                backend_pool_id: &pass.pool_id,
                lb_name: &pass.lb_name,
                scope: &pass.scope,
                probe_defaults: &self.config.probe,
                floating_ip: self.config.enable_floating_ip,
            };
            merged = merged.merge(expectation::build(&input)?);
        }
        Ok(merged)
    }

    async fn frontend_stage(
        &self,
        current: &LoadBalancer,
        pass: &Pass<'_>,
        expected: &[ExpectedFrontend],
        want_lb: bool,
    ) -> Result<Diff<FrontendIpConfig>, ReconcileError> {
        let owns = |config: &FrontendIpConfig| pass.names.owns_frontend(config);
        if !want_lb {
            return Ok(differ::retain_owned(
                &current.frontend_configs,
                owns,
                |_| false,
            ));
        }

        let retained = differ::retain_owned(&current.frontend_configs, owns, |config| {
            !frontend::is_frontend_changed(config, expected)
        });

        // Checked per name so a half-created dual-stack pair gets completed
        let mut created = Vec::new();
        for spec in expected {
            let present = retained
                .items
                .iter()
                .any(|config| config.name.eq_ignore_ascii_case(&spec.name));
            if !present {
                created.push(self.create_frontend(pass, spec).await?);
            }
        }

        Ok(differ::append_missing(retained, &created, same_name))
    }

    async fn create_frontend(
        &self,
        pass: &Pass<'_>,
        spec: &ExpectedFrontend,
    ) -> Result<FrontendIpConfig, ReconcileError> {
        let address = match &spec.address {
            ExpectedAddress::Private { subnet, static_ip } => FrontendAddress::Private {
                subnet: subnet.clone(),
                static_ip: static_ip.clone(),
                assigned_ip: None,
            },
            ExpectedAddress::Public { requested_ip } => {
                let request = AddressRequest {
                    name: naming::address_name(pass.cluster, pass.service, spec.family),
                    family: spec.family,
                    domain_label: pass.service.dns_label.clone(),
                    cluster: pass.cluster.to_string(),
                    must_preexist: requested_ip.is_some(),
                    requested_ip: requested_ip.clone(),
                };
                let address = self
                    .client
                    .provision_address(pass.service, &request)
                    .await
                    .map_err(|source| {
                        warn!(address = %request.name, error = %source, "Failed to provision address");
                        ReconcileError::Provisioning {
                            name: request.name.clone(),
                            source,
                        }
                    })?;
                FrontendAddress::Public {
                    address_id: address.id,
                    ip: address.ip,
                }
            }
        };

        Ok(FrontendIpConfig {
            id: pass.frontend_id(&spec.name),
            name: spec.name.clone(),
            family: spec.family,
            address,
        })
    }

    fn node_group(&self, pass: &Pass<'_>) -> String {
        naming::node_group_for(&pass.lb_name, pass.cluster, &self.config.primary_node_group)
    }

    async fn delete(&self, pass: &Pass<'_>, updated: &LoadBalancer) -> Result<(), ReconcileError> {
        info!(lb = %pass.lb_name, "Deleting load balancer, no frontends remain");

        let node_group = self.node_group(pass);
        let current_pools: Vec<String> = updated.backend_pools.iter().map(|p| p.id.clone()).collect();
        self.membership
            .ensure_pool_deleted(pass.service, &pass.pool_id, &node_group, &current_pools)
            .await
            .map_err(|source| {
                warn!(pool = %pass.pool_id, error = %source, "Failed to detach backend pool");
                ReconcileError::Membership {
                    pool_id: pass.pool_id.clone(),
                    source,
                }
            })?;

        self.client
            .delete_resource(pass.service, &pass.lb_name)
            .await
            .map_err(|source| {
                warn!(lb = %pass.lb_name, error = %source, "Failed to delete load balancer");
                ReconcileError::Deletion {
                    name: pass.lb_name.clone(),
                    source,
                }
            })
    }

    async fn update(
        &self,
        pass: &Pass<'_>,
        updated: LoadBalancer,
    ) -> Result<LoadBalancer, ReconcileError> {
        info!(
            lb = %pass.lb_name,
            frontends = updated.frontend_configs.len(),
            probes = updated.probes.len(),
            rules = updated.rules.len(),
            "Updating load balancer"
        );

        self.client
            .submit_update(pass.service, &updated)
            .await
            .map_err(|source| {
                warn!(lb = %pass.lb_name, error = %source, "Failed to update load balancer");
                ReconcileError::Submission {
                    name: pass.lb_name.clone(),
                    source,
                }
            })?;

        if !pass.service.is_internal() {
            return Ok(updated);
        }

        // Private frontend addresses are assigned by the provider
        debug!(lb = %pass.lb_name, "Refetching internal load balancer");
        let refreshed = self
            .client
            .refetch(&pass.lb_name)
            .await
            .map_err(|source| {
                warn!(lb = %pass.lb_name, error = %source, "Failed to refetch load balancer");
                ReconcileError::Snapshot {
                    service: pass.service.qualified_name(),
                    source,
                }
            })?;
        refreshed.ok_or_else(|| {
            warn!(lb = %pass.lb_name, "Load balancer missing after update");
            ReconcileError::Disappeared(pass.lb_name.clone())
        })
    }

    async fn sync_membership(&self, pass: &Pass<'_>, nodes: &[NodeRef]) -> Result<(), ReconcileError> {
        let node_group = self.node_group(pass);
        debug!(
            pool = %pass.pool_id,
            node_group = %node_group,
            nodes = nodes.len(),
            "Ensuring hosts in backend pool"
        );

        self.membership
            .ensure_hosts_in_pool(
                pass.service,
                nodes,
                &pass.pool_id,
                &node_group,
                pass.service.is_internal(),
            )
            .await
            .map_err(|source| {
                warn!(pool = %pass.pool_id, error = %source, "Failed to sync backend pool");
                ReconcileError::Membership {
                    pool_id: pass.pool_id.clone(),
                    source,
                }
            })?;

        // Membership changes bump the etag
        self.cache.invalidate(&pass.lb_name);
        Ok(())
    }
}
