//! Integration tests for the Orion IAM service.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p orion-integration-tests
//! ```
//!
//! Everything runs in-process against [`MemoryBackend`]; no Redis is needed.
//!
//! # Test Categories
//!
//! - `identity_lifecycle` - User create/read/update/delete through the facade
//! - `login_flow` - Password login and the uniform failure signal
//! - `shutdown` - Concurrent resource teardown
//! - `http_routes` - Status codes and bodies for every route

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use orion_api::config::{ApiConfig, RedisConfig, StoreKind};
use orion_api::connect::Services;
use orion_api::db::MemoryBackend;
use orion_api::services::Handlers;
use orion_api::services::hasher::Argon2Hasher;
use orion_api::state::AppState;
use tower::ServiceExt;
use url::Url;

/// SSO confirmation URL every test app redirects to.
pub const SSO_CONFIRM_URL: &str = "https://sso.example.test/confirm";

/// Configuration for an in-memory test instance.
///
/// # Panics
///
/// Never in practice; the literals are valid.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn test_config() -> ApiConfig {
    ApiConfig {
        host: "127.0.0.1".parse().unwrap(),
        port: 0,
        store: StoreKind::Memory,
        redis: RedisConfig {
            host: "localhost".to_string(),
            port: 6379,
            db: 0,
            password: None,
        },
        sso_confirm_url: Url::parse(SSO_CONFIRM_URL).unwrap(),
        request_timeout: Duration::from_secs(5),
        sentry_dsn: None,
        sentry_environment: None,
    }
}

/// Services over a fresh in-memory backend, with the cheapest Argon2
/// parameters so tests stay fast.
///
/// # Panics
///
/// Never in practice; the hasher parameters are in range.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn test_services() -> (Services, Arc<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new());
    let hasher = Arc::new(Argon2Hasher::with_params(8, 1, 1).unwrap());
    let services = Services::with_backend(Arc::clone(&backend), hasher, &test_config());
    (services, backend)
}

/// A router over fresh services, plus the handles tests poke at directly.
pub struct TestApp {
    pub router: Router,
    pub handlers: Handlers,
    pub backend: Arc<MemoryBackend>,
    pub services: Services,
}

impl TestApp {
    /// Build a new app over an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        let (services, backend) = test_services();
        let handlers = services.handlers().clone();
        let router = orion_api::app(AppState::new(test_config(), handlers.clone()));
        Self {
            router,
            handlers,
            backend,
            services,
        }
    }

    /// Send one request through the router.
    ///
    /// # Panics
    ///
    /// If the request cannot be built or the body cannot be read.
    #[allow(clippy::unwrap_used)]
    pub async fn send(&self, method: Method, uri: &str, body: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        let request = builder
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_owned())))
            .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();

        TestResponse {
            status,
            headers,
            body: String::from_utf8(bytes.to_vec()).unwrap(),
        }
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

/// A fully-read response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    /// Parse the body as JSON.
    ///
    /// # Panics
    ///
    /// If the body is not valid JSON.
    #[must_use]
    #[allow(clippy::unwrap_used)]
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}
