//! Engine error types
//!
//! [`ProviderError`] is what collaborators return. [`ReconcileError`] tags it
//! with the pass stage that failed and keeps the original as its source.

use std::error::Error as StdError;

use lb_sync_common::ValidationError;
use thiserror::Error;

/// Boxed error for wrapping SDK-specific failures
pub type BoxedError = Box<dyn StdError + Send + Sync>;

/// Failures reported by the cloud-facing collaborators
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Optimistic concurrency conflict (stale etag)
    #[error("concurrent modification of {resource}: etag mismatch")]
    Conflict { resource: String },

    /// Resource does not exist
    #[error("not found: {resource}")]
    NotFound { resource: String },

    /// Subscription quota exhausted
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Provider rejected the request as invalid
    #[error("request rejected: {0}")]
    Rejected(String),

    /// Transport or API failure
    #[error("cloud API call failed: {message}")]
    Api {
        message: String,
        #[source]
        source: Option<BoxedError>,
    },
}

impl ProviderError {
    /// Create an API error with source
    pub fn api(message: impl Into<String>, source: impl StdError + Send + Sync + 'static) -> Self {
        Self::Api {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Whether re-running the pass from a fresh snapshot can succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Conflict { .. } | Self::NotFound { .. } | Self::Api { .. } => true,
            Self::QuotaExceeded(_) | Self::Rejected(_) => false,
        }
    }
}

/// A failed reconciliation pass
///
/// Nothing is committed before the final update/delete call, so every variant
/// leaves the resource as it was before the pass.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("loading load balancer snapshot for {service} failed: {source}")]
    Snapshot {
        service: String,
        #[source]
        source: ProviderError,
    },

    #[error("provisioning address {name} failed: {source}")]
    Provisioning {
        name: String,
        #[source]
        source: ProviderError,
    },

    #[error("updating load balancer {name} failed: {source}")]
    Submission {
        name: String,
        #[source]
        source: ProviderError,
    },

    #[error("deleting load balancer {name} failed: {source}")]
    Deletion {
        name: String,
        #[source]
        source: ProviderError,
    },

    #[error("syncing backend pool {pool_id} membership failed: {source}")]
    Membership {
        pool_id: String,
        #[source]
        source: ProviderError,
    },

    #[error("load balancer {0} not found after update")]
    Disappeared(String),

    #[error("internal service {0} names no subnet and no default subnet is configured")]
    MissingSubnet(String),

    #[error("invalid service configuration: {0}")]
    InvalidService(#[from] ValidationError),
}

impl ReconcileError {
    /// The collaborator error exactly as it was returned
    pub fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            Self::Snapshot { source, .. }
            | Self::Provisioning { source, .. }
            | Self::Submission { source, .. }
            | Self::Deletion { source, .. }
            | Self::Membership { source, .. } => Some(source),
            Self::Disappeared(_) | Self::MissingSubnet(_) | Self::InvalidService(_) => None,
        }
    }

    /// Stale snapshot; the caller should reload and re-run the pass
    pub fn is_conflict(&self) -> bool {
        self.provider_error()
            .is_some_and(ProviderError::is_conflict)
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Disappeared(_) => true,
            Self::MissingSubnet(_) | Self::InvalidService(_) => false,
            _ => self
                .provider_error()
                .is_some_and(ProviderError::is_retryable),
        }
    }
}
