//! Reset endpoint

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;

use super::{method_not_allowed, Owner};
use crate::error::ApiResult;
use crate::services::reset::{reset_owner, ResetSummary};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub success: bool,
    pub deleted: ResetSummary,
}

/// POST /api/reset
///
/// Deletes every class, note, reminder and schedule upload of the owner.
pub async fn reset_schedule(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> ApiResult<Json<ResetResponse>> {
    let deleted = reset_owner(state.store.as_ref(), state.objects.as_ref(), owner).await?;
    Ok(Json(ResetResponse {
        success: true,
        deleted,
    }))
}

/// Build reset routes
pub fn reset_routes() -> Router<AppState> {
    Router::new().route("/api/reset", post(reset_schedule).fallback(method_not_allowed))
}
