//! HTTP route handlers for the IAM API.
//!
//! # Route Structure
//!
//! ```text
//! # Users
//! POST   /v1/user                   - Create user
//! GET    /v1/user/{email}           - Get user profile
//! PUT    /v1/user/{email}           - Update profile (may change email)
//! DELETE /v1/user/{email}           - Delete user
//! PUT    /v1/user/password/{email}  - Replace password
//!
//! # Auth
//! POST   /v1/login                  - Password login, 302 to SSO confirmation
//! POST   /v1/logout                 - No-op acknowledgment
//!
//! # Health
//! GET    /v1/health/alive           - Liveness (pings backend)
//! GET    /v1/health/ready           - Readiness (pings backend)
//! ```

pub mod auth;
pub mod health;
pub mod user;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::state::AppState;

/// Create the user routes router.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(user::create_user))
        .route(
            "/{email}",
            get(user::get_user)
                .put(user::update_user)
                .delete(user::delete_user),
        )
        .route("/password/{email}", put(user::update_user_password))
}

/// Create the health routes router.
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/alive", get(health::alive))
        .route("/ready", get(health::ready))
}

/// Create all routes for the IAM API.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/v1/user", user_routes())
        .route("/v1/login", post(auth::login))
        .route("/v1/logout", post(auth::logout))
        .nest("/v1/health", health_routes())
}
