//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server-side errors to
//! Sentry before responding to the client. All route handlers return
//! `Result<T, AppError>`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::db::StoreError;
use crate::services::authn::AuthnError;
use crate::services::health::HealthError;
use crate::services::identity::IdentityError;

/// Application-level error type for the IAM API.
#[derive(Debug, Error)]
pub enum AppError {
    /// User lifecycle operation failed.
    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    /// Login failed.
    #[error("Authn error: {0}")]
    Authn(#[from] AuthnError),

    /// Backend health check failed.
    #[error("Health error: {0}")]
    Health(#[from] HealthError),

    /// Bad request from client (unparseable body or path).
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Identity(err) => match err {
                IdentityError::BadInput(_) => StatusCode::BAD_REQUEST,
                IdentityError::Conflict => StatusCode::CONFLICT,
                IdentityError::NotFound => StatusCode::NOT_FOUND,
                IdentityError::Store(store) => store_status(store),
                IdentityError::Hashing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Authn(err) => match err {
                AuthnError::Unauthorized => StatusCode::UNAUTHORIZED,
                AuthnError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
                AuthnError::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            },
            Self::Health(HealthError(StoreError::DeadlineExceeded)) => StatusCode::GATEWAY_TIMEOUT,
            Self::Health(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Whether this is a fault on our side worth reporting to Sentry.
    /// Client mistakes and abandoned requests are not.
    const fn is_server_fault(&self) -> bool {
        match self {
            Self::Identity(IdentityError::Store(store)) => !matches!(
                store,
                StoreError::Cancelled | StoreError::DeadlineExceeded
            ),
            Self::Identity(IdentityError::Hashing(_)) | Self::Health(_) => true,
            _ => false,
        }
    }
}

const fn store_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::Unavailable(_) | StoreError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        StoreError::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        StoreError::Corrupt { .. } | StoreError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_server_fault() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = self.status();

        // Don't expose internal error details to clients
        let message = match &self {
            // Uniform, empty: nothing distinguishes the failure cause
            Self::Authn(AuthnError::Unauthorized) => String::new(),
            Self::Identity(IdentityError::BadInput(msg)) | Self::BadRequest(msg) => msg.clone(),
            Self::Identity(IdentityError::Conflict) => "User already exists".to_string(),
            Self::Identity(IdentityError::NotFound) => "User not found".to_string(),
            _ => match status {
                StatusCode::GATEWAY_TIMEOUT => "Request timed out".to_string(),
                StatusCode::SERVICE_UNAVAILABLE => "Service unavailable".to_string(),
                _ => "Internal server error".to_string(),
            },
        };

        (status, message).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
