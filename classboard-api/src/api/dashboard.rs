//! Dashboard endpoint

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use classboard_common::time::Language;
use serde::Deserialize;

use super::Owner;
use crate::error::ApiResult;
use crate::services::dashboard::{self, Dashboard};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    /// "en" (default) or "ar"
    pub lang: Option<String>,
}

/// GET /api/dashboard?lang=
pub async fn get_dashboard(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Query(query): Query<DashboardQuery>,
) -> ApiResult<Json<Dashboard>> {
    let language = match query.lang.as_deref() {
        Some(raw) => raw.parse::<Language>()?,
        None => Language::default(),
    };

    let summary = dashboard::dashboard(
        state.store.as_ref(),
        owner,
        classboard_common::time::now(),
        state.settings.zone,
        language,
    )
    .await?;

    Ok(Json(summary))
}

/// Build dashboard routes
pub fn dashboard_routes() -> Router<AppState> {
    Router::new().route("/api/dashboard", get(get_dashboard))
}
