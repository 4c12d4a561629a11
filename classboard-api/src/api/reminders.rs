//! Reminder endpoints

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use classboard_common::time::today_in;
use serde::Deserialize;

use super::Owner;
use crate::error::{ApiError, ApiResult};
use crate::services::reminders::{self, ReminderRequest, ReminderView};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ReminderListQuery {
    /// Only reminders not yet resolved
    #[serde(default)]
    pub unresolved: bool,
}

/// POST /api/reminders request body
#[derive(Debug, Deserialize)]
pub struct CreateReminderRequest {
    #[serde(default)]
    pub class_code: String,
    #[serde(default)]
    pub message: String,
    /// YYYY-MM-DD; defaults to today
    #[serde(default)]
    pub remind_date: Option<NaiveDate>,
}

/// GET /api/reminders?unresolved=
pub async fn list_reminders(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Query(query): Query<ReminderListQuery>,
) -> ApiResult<Json<Vec<ReminderView>>> {
    let views = reminders::list_reminders(state.store.as_ref(), owner, query.unresolved).await?;
    Ok(Json(views))
}

/// POST /api/reminders
pub async fn create_reminder(
    State(state): State<AppState>,
    Owner(owner): Owner,
    body: Result<Json<CreateReminderRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ReminderView>)> {
    let Json(body) = body.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    let remind_date = body
        .remind_date
        .unwrap_or_else(|| today_in(state.settings.zone));

    let view = reminders::create_reminder(
        state.store.as_ref(),
        ReminderRequest {
            owner,
            class_code: body.class_code,
            message: body.message,
            remind_date,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(view)))
}

/// POST /api/reminders/:id/resolve
pub async fn resolve_reminder(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<i64>,
) -> ApiResult<Json<ReminderView>> {
    Ok(Json(
        reminders::resolve_reminder(state.store.as_ref(), owner, id).await?,
    ))
}

/// DELETE /api/reminders/:id
pub async fn delete_reminder(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    reminders::delete_reminder(state.store.as_ref(), owner, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Build reminder routes
pub fn reminder_routes() -> Router<AppState> {
    Router::new()
        .route("/api/reminders", get(list_reminders).post(create_reminder))
        .route("/api/reminders/:id/resolve", post(resolve_reminder))
        .route("/api/reminders/:id", delete(delete_reminder))
}
