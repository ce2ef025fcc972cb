//! [`RequestContext`] extractor.

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use super::RequestId;
use crate::context::RequestContext;
use crate::state::AppState;

impl FromRequestParts<AppState> for RequestContext {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let request_id = parts
            .extensions
            .get::<RequestId>()
            .map_or_else(|| Uuid::new_v4().to_string(), |id| id.0.clone());

        let span = tracing::info_span!(
            "iam",
            request_id = %request_id,
            method = %parts.method,
            path = %parts.uri.path(),
        );

        Ok(Self::new(request_id, span).with_timeout(state.config().request_timeout))
    }
}
