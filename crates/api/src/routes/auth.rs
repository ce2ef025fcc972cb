//! Login and logout route handlers.
//!
//! Login never explains a failure: a bad body, a bad email, an unknown user
//! and a wrong password all answer `401` with an empty body.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use orion_core::Email;
use secrecy::SecretString;
use serde::Deserialize;

use crate::context::RequestContext;
use crate::error::{AppError, Result};
use crate::models::Credentials;
use crate::services::AuthnOperations;
use crate::services::authn::{AuthnError, LoginOutcome};
use crate::state::AppState;

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// `POST /v1/login`
///
/// Answers `302 Found` to the SSO confirmation URL on success.
pub async fn login(
    State(state): State<AppState>,
    ctx: RequestContext,
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response> {
    let Ok(Json(body)) = payload else {
        tracing::debug!(parent: ctx.span(), "Login rejected: malformed body");
        return Err(AuthnError::Unauthorized.into());
    };
    let Ok(email) = Email::parse(&body.email) else {
        tracing::debug!(parent: ctx.span(), "Login rejected: malformed email");
        return Err(AuthnError::Unauthorized.into());
    };

    let credentials = Credentials {
        email,
        password: SecretString::from(body.password),
    };

    match state.handlers().login(&ctx, credentials).await {
        Ok(LoginOutcome::RedirectToSso(url)) => {
            Ok((StatusCode::FOUND, [(header::LOCATION, url.to_string())]).into_response())
        }
        Err(e) => Err(AppError::from(e)),
    }
}

/// `POST /v1/logout`
pub async fn logout(State(state): State<AppState>, ctx: RequestContext) -> StatusCode {
    state.handlers().logout(&ctx);
    StatusCode::NO_CONTENT
}
