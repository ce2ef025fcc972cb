//! Orion IAM API - user identity and password authentication.
//!
//! This binary serves the identity API on port 8080 by default.
//!
//! # Architecture
//!
//! - Axum web framework, JSON request and response bodies
//! - Redis (or an in-process map) as the user record store
//! - Argon2id password hashes
//! - Successful logins are redirected to an external SSO confirmation page;
//!   this service holds no sessions

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use orion_api::config::ApiConfig;
use orion_api::connect::Services;
use orion_api::shutdown::{CloseError, Closeable};
use orion_api::state::AppState;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ApiConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

/// Flushes queued Sentry events on shutdown.
struct SentryFlush {
    guard: Mutex<Option<sentry::ClientInitGuard>>,
}

#[async_trait]
impl Closeable for SentryFlush {
    fn name(&self) -> &str {
        "sentry"
    }

    async fn close(&self) -> Result<(), CloseError> {
        let guard = self
            .guard
            .lock()
            .map_err(|_| "sentry guard lock poisoned")?
            .take();
        let Some(guard) = guard else {
            return Ok(());
        };

        let flushed =
            tokio::task::spawn_blocking(move || guard.flush(Some(Duration::from_secs(2)))).await?;
        if flushed {
            Ok(())
        } else {
            Err("timed out flushing events".into())
        }
    }
}

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = ApiConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let sentry_guard = init_sentry(&config);

    // Defaults to info level for our crate if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "orion_api=info,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let mut services = Services::connect(&config)
        .await
        .expect("Failed to connect services");
    if let Some(guard) = sentry_guard {
        services.register(Box::new(SentryFlush {
            guard: Mutex::new(Some(guard)),
        }));
    }

    let state = AppState::new(config.clone(), services.handlers().clone());

    let app = orion_api::app(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    let addr = config.socket_addr();
    tracing::info!("iam listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server error");
    }

    match services.close().await {
        Ok(()) => tracing::info!("Shutdown complete"),
        Err(e) => {
            tracing::error!(error = %e, "Shutdown finished with errors");
            std::process::exit(1);
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
