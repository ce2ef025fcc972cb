//! Health check route handlers.

use axum::{Json, extract::State};
use serde::Serialize;

use crate::context::RequestContext;
use crate::error::Result;
use crate::services::HealthOperations;
use crate::state::AppState;

/// Health check response body.
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
}

/// `GET /v1/health/alive`
pub async fn alive(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Json<HealthStatus>> {
    state.handlers().alive(&ctx).await?;
    Ok(Json(HealthStatus { status: "alive" }))
}

/// `GET /v1/health/ready`
pub async fn ready(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Json<HealthStatus>> {
    state.handlers().ready(&ctx).await?;
    Ok(Json(HealthStatus { status: "ready" }))
}
