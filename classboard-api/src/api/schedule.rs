//! Schedule image endpoints
//!
//! `POST /api/process-schedule` runs the pipeline on an image already in the
//! `schedules` bucket. `POST /api/schedule/upload` takes the raw image body,
//! validates and stores it, then runs the same pipeline.

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap};
use axum::routing::post;
use axum::{Json, Router};
use classboard_common::models::ClassRecord;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::{method_not_allowed, Owner};
use crate::error::{ApiError, ApiResult};
use crate::services::validation::{validate_file_name, validate_schedule_image};
use crate::services::{ExtractionOutcome, ExtractionRequest};
use crate::store::Bucket;
use crate::AppState;

/// POST /api/process-schedule request body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessScheduleRequest {
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
}

/// Pipeline result as returned to the upload page
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessScheduleResponse {
    pub success: bool,
    pub classes_found: usize,
    pub classes_inserted: usize,
    pub classes_skipped: usize,
    /// Inserted rows; null when nothing was inserted
    pub classes: Option<Vec<ClassRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

impl From<ExtractionOutcome> for ProcessScheduleResponse {
    fn from(outcome: ExtractionOutcome) -> Self {
        Self {
            success: true,
            classes_found: outcome.classes_found,
            classes_inserted: outcome.classes_inserted,
            classes_skipped: outcome.classes_skipped,
            classes: (!outcome.classes.is_empty()).then_some(outcome.classes),
            file_path: None,
        }
    }
}

/// POST /api/process-schedule
pub async fn process_schedule(
    State(state): State<AppState>,
    Owner(owner): Owner,
    body: Result<Json<ProcessScheduleRequest>, JsonRejection>,
) -> ApiResult<Json<ProcessScheduleResponse>> {
    let Json(request) = body.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    let non_blank = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
    let (Some(file_path), Some(file_name)) =
        (non_blank(request.file_path), non_blank(request.file_name))
    else {
        return Err(ApiError::BadRequest("Missing filePath or fileName".to_string()));
    };

    let outcome = state
        .extractor
        .process(&ExtractionRequest {
            owner,
            file_path,
            file_name,
        })
        .await?;

    Ok(Json(outcome.into()))
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub file_name: Option<String>,
}

/// POST /api/schedule/upload?file_name=
pub async fn upload_schedule(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<ProcessScheduleResponse>> {
    let file_name = validate_file_name(query.file_name.as_deref().unwrap_or("schedule"))?;
    let declared_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());
    let mime_type = validate_schedule_image(
        declared_type,
        &body,
        state.settings.uploads.schedule_max_bytes,
    )?;

    let file_path = format!("{}/{}_{}", owner, Uuid::new_v4(), file_name);
    state
        .objects
        .upload(Bucket::Schedules, &file_path, mime_type, body.to_vec())
        .await?;
    info!(%owner, file_path = %file_path, size = body.len(), "Schedule image stored");

    let outcome = state
        .extractor
        .process(&ExtractionRequest {
            owner,
            file_path: file_path.clone(),
            file_name,
        })
        .await
        .map_err(|source| ApiError::StoredImage {
            file_path: file_path.clone(),
            source,
        })?;

    let mut response = ProcessScheduleResponse::from(outcome);
    response.file_path = Some(file_path);
    Ok(Json(response))
}

/// Build schedule routes
pub fn schedule_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/process-schedule",
            post(process_schedule).fallback(method_not_allowed),
        )
        .route(
            "/api/schedule/upload",
            post(upload_schedule).fallback(method_not_allowed),
        )
}
