//! Service construction and teardown.
//!
//! [`Services`] builds the key-value backend, hasher and [`Handlers`] from
//! configuration, and owns every resource that has to be released on
//! shutdown.

use std::sync::Arc;

use thiserror::Error;

use crate::config::{ApiConfig, StoreKind};
use crate::context::RequestContext;
use crate::db::{BackendError, KvBackend, MemoryBackend, RecordStore, RedisBackend, StoreError};
use crate::services::Handlers;
use crate::services::hasher::{Argon2Hasher, PasswordHasher};
use crate::shutdown::{Closeable, ShutdownCoordinator, ShutdownError};

/// Errors while bringing the services up.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The backend could not be opened.
    #[error("failed to open backend: {0}")]
    Backend(#[from] BackendError),

    /// The backend opened but did not answer a ping.
    #[error("backend did not answer startup ping: {0}")]
    Ping(#[from] StoreError),
}

/// Running services plus the resources they hold.
pub struct Services {
    handlers: Handlers,
    shutdown: ShutdownCoordinator,
}

impl Services {
    /// Open the configured backend and build the service facade.
    ///
    /// The backend is pinged once before returning. If that fails, anything
    /// already opened is closed again.
    ///
    /// # Errors
    ///
    /// Returns `ConnectError` if the backend cannot be opened or reached.
    pub async fn connect(config: &ApiConfig) -> Result<Self, ConnectError> {
        let services = match config.store {
            StoreKind::Redis => {
                let redis = Arc::new(RedisBackend::connect(&config.redis).await?);
                Self::with_backend(redis, Arc::new(Argon2Hasher::new()), config)
            }
            StoreKind::Memory => {
                tracing::warn!("Using in-memory store; data is lost on restart");
                let memory = Arc::new(MemoryBackend::new());
                Self::with_backend(memory, Arc::new(Argon2Hasher::new()), config)
            }
        };

        let ctx = RequestContext::background("startup").with_timeout(config.request_timeout);
        if let Err(e) = services.handlers.health().ready(&ctx).await {
            tracing::error!(error = %e, "Startup ping failed, closing resources");
            if let Err(close_err) = services.close().await {
                tracing::error!(error = %close_err, "Cleanup after failed startup");
            }
            return Err(ConnectError::Ping(e.0));
        }

        Ok(services)
    }

    /// Build the facade over an already-open backend. The backend is
    /// registered for shutdown.
    #[must_use]
    pub fn with_backend<B>(
        backend: Arc<B>,
        hasher: Arc<dyn PasswordHasher>,
        config: &ApiConfig,
    ) -> Self
    where
        B: KvBackend + Closeable + 'static,
    {
        let mut shutdown = ShutdownCoordinator::new();
        shutdown.register(Box::new(Arc::clone(&backend)));

        let records = RecordStore::new(backend);
        let handlers = Handlers::new(records, hasher, config.sso_confirm_url.clone());

        Self { handlers, shutdown }
    }

    /// The service facade.
    #[must_use]
    pub const fn handlers(&self) -> &Handlers {
        &self.handlers
    }

    /// Register an extra resource to be closed with the services.
    pub fn register(&mut self, resource: Box<dyn Closeable>) {
        self.shutdown.register(resource);
    }

    /// Close every owned resource concurrently.
    ///
    /// # Errors
    ///
    /// Returns `ShutdownError` listing every resource that failed to close.
    pub async fn close(self) -> Result<(), ShutdownError> {
        tracing::info!(resources = self.shutdown.len(), "Closing resources");
        self.shutdown.close_all().await
    }
}
