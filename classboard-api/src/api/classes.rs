//! Class listing endpoints

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use classboard_common::time::today_in;

use super::Owner;
use crate::error::ApiResult;
use crate::services::dashboard::{self, ClassView, DayView};
use crate::AppState;

/// GET /api/classes
pub async fn list_classes(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> ApiResult<Json<Vec<ClassView>>> {
    Ok(Json(dashboard::all_classes(state.store.as_ref(), owner).await?))
}

/// GET /api/classes/today
pub async fn classes_today(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> ApiResult<Json<Vec<ClassView>>> {
    let today = today_in(state.settings.zone);
    Ok(Json(
        dashboard::classes_for_date(state.store.as_ref(), owner, today).await?,
    ))
}

/// GET /api/classes/week
pub async fn classes_week(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> ApiResult<Json<Vec<DayView>>> {
    Ok(Json(dashboard::week(state.store.as_ref(), owner).await?))
}

/// Build class routes
pub fn class_routes() -> Router<AppState> {
    Router::new()
        .route("/api/classes", get(list_classes))
        .route("/api/classes/today", get(classes_today))
        .route("/api/classes/week", get(classes_week))
}
