//! Liveness and readiness checks.

use thiserror::Error;

use crate::context::RequestContext;
use crate::db::{RecordStore, StoreError};

/// The backend did not answer a ping.
#[derive(Debug, Error)]
#[error("backend unreachable: {0}")]
pub struct HealthError(#[from] pub StoreError);

/// Health checks against the key-value backend.
#[derive(Clone)]
pub struct HealthService {
    records: RecordStore,
}

impl HealthService {
    /// Create a new health service.
    #[must_use]
    pub const fn new(records: RecordStore) -> Self {
        Self { records }
    }

    /// Liveness: the process is up and can reach its backend.
    ///
    /// # Errors
    ///
    /// Returns `HealthError` if the backend ping fails.
    pub async fn alive(&self, ctx: &RequestContext) -> Result<(), HealthError> {
        self.ping(ctx).await
    }

    /// Readiness: the service can take traffic.
    ///
    /// # Errors
    ///
    /// Returns `HealthError` if the backend ping fails.
    pub async fn ready(&self, ctx: &RequestContext) -> Result<(), HealthError> {
        self.ping(ctx).await
    }

    async fn ping(&self, ctx: &RequestContext) -> Result<(), HealthError> {
        self.records.ping(ctx).await.map_err(|e| {
            tracing::debug!(parent: ctx.span(), error = %e, "Backend ping failed");
            HealthError(e)
        })
    }
}
