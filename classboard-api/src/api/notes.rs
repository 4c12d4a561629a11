//! Notes endpoints

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use classboard_common::time::today_in;
use serde::Deserialize;

use super::{method_not_allowed, Owner};
use crate::error::{ApiError, ApiResult};
use crate::services::notes::{self, NoteUploadRequest, NoteView};
use crate::store::Bucket;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct NotesUploadQuery {
    /// YYYY-MM-DD; defaults to today
    pub date: Option<NaiveDate>,
    pub code: Option<String>,
    pub file_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NotesListQuery {
    pub date: Option<NaiveDate>,
    pub code: Option<String>,
}

fn today(state: &AppState) -> NaiveDate {
    today_in(state.settings.zone)
}

/// POST /api/notes/upload?date=&code=&file_name=
pub async fn upload_notes(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Query(query): Query<NotesUploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<NoteView>> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let request = NoteUploadRequest {
        owner,
        class_date: query.date.unwrap_or_else(|| today(&state)),
        class_code: query.code.unwrap_or_default(),
        file_name: query.file_name.unwrap_or_default(),
        content_type,
        bytes: body.to_vec(),
    };

    let view = notes::upload_note(
        state.store.as_ref(),
        state.objects.as_ref(),
        state.settings.uploads.notes_max_bytes,
        request,
    )
    .await?;

    Ok(Json(view))
}

/// GET /api/notes?date=&code=
pub async fn list_notes(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Query(query): Query<NotesListQuery>,
) -> ApiResult<Json<Vec<NoteView>>> {
    let date = query.date.unwrap_or_else(|| today(&state));
    let views = notes::list_notes(
        state.store.as_ref(),
        state.objects.as_ref(),
        owner,
        date,
        query.code,
    )
    .await?;
    Ok(Json(views))
}

/// GET /api/files/notes/*path
///
/// Serves stored notes files when the store has no public file host of its
/// own. Only the requesting owner's files are reachable.
pub async fn download_note_file(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(path): Path<String>,
) -> ApiResult<Response> {
    let own_prefix = format!("{}/", owner);
    if !path.starts_with(&own_prefix) || path.split('/').any(|segment| segment == "..") {
        return Err(ApiError::NotFound(format!("File {}", path)));
    }

    let bytes = state.objects.download(Bucket::Notes, &path).await?;
    let content_type = infer::get(&bytes)
        .map(|kind| kind.mime_type())
        .unwrap_or("application/octet-stream");

    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

/// Build notes routes
pub fn notes_routes() -> Router<AppState> {
    Router::new()
        .route("/api/notes", get(list_notes))
        .route(
            "/api/notes/upload",
            post(upload_notes).fallback(method_not_allowed),
        )
        .route("/api/files/notes/*path", get(download_note_file))
}
