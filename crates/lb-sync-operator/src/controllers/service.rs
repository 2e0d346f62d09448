//! Service controller
//!
//! Watches v1/Service resources of type LoadBalancer and runs one engine
//! pass per change. Managed Services carry a finalizer so their items are
//! removed from the shared load balancer before the Service disappears.
//!
//! ## Passes
//!
//! - Apply: the Service's full intent and the eligible nodes go to the
//!   engine, then `status.loadBalancer.ingress` is set to the frontend
//!   addresses. A Service whose type changed away from LoadBalancer is
//!   released instead.
//! - Cleanup: the engine runs with `want_lb = false` and no nodes; the
//!   finalizer is dropped only once that pass succeeds.
//!
//! Failed passes are requeued with exponential backoff when the failure is
//! transient (see [`super::retry`]).

use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::api::core::v1::{LoadBalancerIngress, Service};
use kube::api::{Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::runtime::finalizer::{self, finalizer, Event};
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, ResourceExt};
use lb_sync_engine::ReconcileError;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::intent::{cleanup_intent, intent_from_service, is_load_balancer, IntentError};

use super::retry::{compute_backoff, ErrorKind};
use super::ControllerContext;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("Invalid service: {0}")]
    Intent(#[from] IntentError),

    #[error("Failed to list nodes: {0}")]
    Nodes(#[source] kube::Error),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error("Failed to publish ingress status: {0}")]
    Status(#[source] kube::Error),

    #[error("Finalizer error: {0}")]
    Finalizer(#[source] Box<finalizer::Error<ControllerError>>),
}

fn has_finalizer(service: &Service, name: &str) -> bool {
    service.finalizers().iter().any(|f| f == name)
}

/// Run the engine for a LoadBalancer Service; returns its ingress addresses
async fn sync_service(
    service: &Service,
    ctx: &ControllerContext,
) -> Result<Vec<String>, ControllerError> {
    let intent = intent_from_service(service)?;
    let nodes = ctx
        .nodes
        .eligible_nodes()
        .await
        .map_err(ControllerError::Nodes)?;
    debug!(nodes = nodes.len(), ports = intent.ports.len(), "Built service intent");

    let addresses = ctx
        .balancer
        .ensure(&ctx.config.cluster_name, &intent, &nodes)
        .await?;
    Ok(addresses)
}

/// Remove everything the Service owns on its load balancer
async fn release_service(service: &Service, ctx: &ControllerContext) -> Result<(), ControllerError> {
    let intent = cleanup_intent(service)?;
    ctx.balancer
        .ensure_deleted(&ctx.config.cluster_name, &intent)
        .await?;
    Ok(())
}

/// Status patch for `addresses`, or `None` when the status already matches
fn ingress_patch(service: &Service, addresses: &[String]) -> Option<serde_json::Value> {
    let desired: Vec<LoadBalancerIngress> = addresses
        .iter()
        .map(|ip| LoadBalancerIngress {
            ip: Some(ip.clone()),
            ..Default::default()
        })
        .collect();
    let current = service
        .status
        .as_ref()
        .and_then(|status| status.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_deref())
        .unwrap_or_default();

    if current == desired.as_slice() {
        return None;
    }
    Some(serde_json::json!({
        "status": { "loadBalancer": { "ingress": desired } }
    }))
}

async fn publish_ingress(
    services: &Api<Service>,
    service: &Service,
    addresses: &[String],
) -> Result<(), ControllerError> {
    let Some(patch) = ingress_patch(service, addresses) else {
        debug!("Ingress status unchanged");
        return Ok(());
    };

    services
        .patch_status(
            &service.name_any(),
            &PatchParams::default(),
            &Patch::Merge(&patch),
        )
        .await
        .map_err(ControllerError::Status)?;
    info!(addresses = ?addresses, "Published ingress status");
    Ok(())
}

async fn apply(
    services: &Api<Service>,
    service: &Service,
    ctx: &ControllerContext,
) -> Result<Action, ControllerError> {
    if !is_load_balancer(service) {
        info!("Service is no longer a LoadBalancer, releasing");
        release_service(service, ctx).await?;
        publish_ingress(services, service, &[]).await?;
        ctx.retry_tracker.reset(&service.uid().unwrap_or_default());
        return Ok(Action::await_change());
    }

    let addresses = sync_service(service, ctx).await?;
    publish_ingress(services, service, &addresses).await?;

    ctx.retry_tracker.reset(&service.uid().unwrap_or_default());
    Ok(Action::requeue(ctx.config.resync_interval()))
}

async fn cleanup(service: &Service, ctx: &ControllerContext) -> Result<Action, ControllerError> {
    release_service(service, ctx).await?;
    info!("Released load balancer items");

    ctx.retry_tracker.reset(&service.uid().unwrap_or_default());
    Ok(Action::await_change())
}

#[instrument(skip(service, ctx), fields(service = %service.name_any(), namespace = %service.namespace().unwrap_or_default()))]
pub(crate) async fn reconcile(
    service: Arc<Service>,
    ctx: Arc<ControllerContext>,
) -> Result<Action, ControllerError> {
    // Services we never managed carry no finalizer and are left alone
    if !is_load_balancer(&service) && !has_finalizer(&service, &ctx.config.finalizer) {
        debug!("Not a LoadBalancer service, skipping");
        return Ok(Action::await_change());
    }

    let namespace = service.namespace().unwrap_or_else(|| "default".to_string());
    let services: Api<Service> = Api::namespaced(ctx.kube_client.clone(), &namespace);

    finalizer(&services, &ctx.config.finalizer, service, |event| async {
        match event {
            Event::Apply(service) => apply(&services, &service, &ctx).await,
            Event::Cleanup(service) => cleanup(&service, &ctx).await,
        }
    })
    .await
    .map_err(|e| ControllerError::Finalizer(Box::new(e)))
}

/// Classify error type for retry behavior
fn classify_error(error: &ControllerError) -> ErrorKind {
    match error {
        ControllerError::Intent(_) => ErrorKind::Permanent,
        ControllerError::Nodes(_) | ControllerError::Status(_) => ErrorKind::Transient,
        ControllerError::Reconcile(e) if e.is_retryable() => ErrorKind::Transient,
        ControllerError::Reconcile(_) => ErrorKind::Permanent,
        ControllerError::Finalizer(e) => match e.as_ref() {
            finalizer::Error::ApplyFailed(inner) | finalizer::Error::CleanupFailed(inner) => {
                classify_error(inner)
            }
            finalizer::Error::UnnamedObject => ErrorKind::Permanent,
            _ => ErrorKind::Transient,
        },
    }
}

/// Error policy for the controller with exponential backoff
fn error_policy(service: Arc<Service>, error: &ControllerError, ctx: Arc<ControllerContext>) -> Action {
    let uid = service.metadata.uid.as_deref().unwrap_or("unknown");
    let kind = classify_error(error);

    let attempt = ctx.retry_tracker.increment(uid);

    warn!(
        error = %error,
        attempt = attempt,
        error_kind = ?kind,
        "Reconciliation error"
    );

    compute_backoff(attempt, kind)
}

/// Run the Service controller
pub async fn run(client: Client, ctx: Arc<ControllerContext>) {
    let services: Api<Service> = Api::all(client.clone());

    info!(cluster = %ctx.config.cluster_name, "Starting Service controller");

    Controller::new(services, WatcherConfig::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            if let Err(e) = result {
                error!(error = ?e, "Service controller stream error");
            }
        })
        .await;
}
