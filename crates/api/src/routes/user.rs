//! User lifecycle route handlers.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use orion_core::{Email, UserProfile};
use secrecy::SecretString;
use serde::Deserialize;

use crate::context::RequestContext;
use crate::error::{AppError, Result};
use crate::models::{NewUser, UserUpdate};
use crate::services::IdentityOperations;
use crate::state::AppState;

// =============================================================================
// Request Types
// =============================================================================

// Missing fields decode as empty strings and are rejected by validation,
// so a partial body gets the same 400 as a bad value.

/// Create user request body.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub password: String,
}

/// Update user request body. `email` is the new address, which may differ
/// from the one in the path.
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// Update password request body.
#[derive(Debug, Deserialize)]
pub struct UpdatePasswordRequest {
    /// Optional; when present it must match the path.
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: String,
}

// =============================================================================
// Helpers
// =============================================================================

fn parse_email(raw: &str) -> Result<Email> {
    Email::parse(raw).map_err(|e| AppError::BadRequest(format!("Invalid email: {e}")))
}

fn json_body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

// =============================================================================
// Handlers
// =============================================================================

/// `POST /v1/user`
pub async fn create_user(
    State(state): State<AppState>,
    ctx: RequestContext,
    payload: std::result::Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserProfile>)> {
    let body = json_body(payload)?;
    let new_user = NewUser {
        email: parse_email(&body.email)?,
        first_name: body.first_name,
        last_name: body.last_name,
        password: SecretString::from(body.password),
    };

    let profile = state.handlers().create_user(&ctx, new_user).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// `GET /v1/user/{email}`
pub async fn get_user(
    State(state): State<AppState>,
    Path(email): Path<String>,
    ctx: RequestContext,
) -> Result<Json<UserProfile>> {
    let email = parse_email(&email)?;
    let profile = state.handlers().get_user(&ctx, &email).await?;
    Ok(Json(profile))
}

/// `PUT /v1/user/{email}`
pub async fn update_user(
    State(state): State<AppState>,
    Path(email): Path<String>,
    ctx: RequestContext,
    payload: std::result::Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let email = parse_email(&email)?;
    let body = json_body(payload)?;
    let update = UserUpdate {
        email: parse_email(&body.email)?,
        first_name: body.first_name,
        last_name: body.last_name,
    };

    state.handlers().update_user(&ctx, &email, update).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `PUT /v1/user/password/{email}`
pub async fn update_user_password(
    State(state): State<AppState>,
    Path(email): Path<String>,
    ctx: RequestContext,
    payload: std::result::Result<Json<UpdatePasswordRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let email = parse_email(&email)?;
    let body = json_body(payload)?;

    if let Some(body_email) = body.email.as_deref().filter(|e| !e.is_empty())
        && body_email != email.as_str()
    {
        return Err(AppError::BadRequest(
            "Email in body does not match path".to_string(),
        ));
    }

    let password = SecretString::from(body.password);
    state
        .handlers()
        .update_user_password(&ctx, &email, &password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /v1/user/{email}`
pub async fn delete_user(
    State(state): State<AppState>,
    Path(email): Path<String>,
    ctx: RequestContext,
) -> Result<impl IntoResponse> {
    let email = parse_email(&email)?;
    state.handlers().delete_user(&ctx, &email).await?;
    Ok(StatusCode::NO_CONTENT)
}
