//! Lecture notes uploads
//!
//! Files land in the `notes` bucket at `{owner}/{date}/{code}/{file_name}`;
//! uploading the same name again for the same class and day replaces the
//! file. Each upload also gets a metadata row.

use chrono::NaiveDate;
use classboard_common::models::{NewNoteUpload, NoteUpload};
use classboard_common::time::format_file_size;
use classboard_common::OwnerId;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::services::validation::{
    validate_class_code, validate_file_name, validate_notes_file, UploadRejected,
};
use crate::store::{Bucket, NoteFilter, ObjectStore, Store, StoreError};

#[derive(Debug, Error)]
pub enum NotesError {
    #[error(transparent)]
    Rejected(#[from] UploadRejected),

    #[error("Class code is required")]
    MissingClassCode,

    #[error("Failed to store notes file: {0}")]
    Store(#[from] StoreError),
}

/// A notes file as received
#[derive(Debug, Clone)]
pub struct NoteUploadRequest {
    pub owner: OwnerId,
    pub class_date: NaiveDate,
    pub class_code: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Metadata row plus the fields the notes page shows
#[derive(Debug, Clone, Serialize)]
pub struct NoteView {
    #[serde(flatten)]
    pub upload: NoteUpload,
    pub public_url: String,
    pub size_display: String,
}

/// Storage path of a notes file
pub fn note_path(owner: OwnerId, class_date: NaiveDate, class_code: &str, file_name: &str) -> String {
    format!(
        "{}/{}/{}/{}",
        owner,
        class_date.format("%Y-%m-%d"),
        class_code,
        file_name
    )
}

fn view(objects: &dyn ObjectStore, upload: NoteUpload) -> NoteView {
    NoteView {
        public_url: objects.public_url(Bucket::Notes, &upload.storage_path),
        size_display: format_file_size(upload.size_bytes.unwrap_or(0).max(0) as u64),
        upload,
    }
}

/// Validate, store and record a notes file
pub async fn upload_note(
    store: &dyn Store,
    objects: &dyn ObjectStore,
    max_bytes: u64,
    request: NoteUploadRequest,
) -> Result<NoteView, NotesError> {
    if request.class_code.trim().is_empty() {
        return Err(NotesError::MissingClassCode);
    }
    let class_code = validate_class_code(&request.class_code)?;
    let file_name = validate_file_name(&request.file_name)?;
    validate_notes_file(&request.bytes, max_bytes)?;

    let storage_path = note_path(request.owner, request.class_date, &class_code, &file_name);
    let size_bytes = request.bytes.len() as i64;
    let mime_type = request
        .content_type
        .filter(|t| !t.trim().is_empty())
        .or_else(|| infer::get(&request.bytes).map(|kind| kind.mime_type().to_string()));

    objects
        .upload(
            Bucket::Notes,
            &storage_path,
            mime_type.as_deref().unwrap_or("application/octet-stream"),
            request.bytes,
        )
        .await?;

    let class_name = store
        .find_class_by_code(request.owner, &class_code)
        .await?
        .map(|class| class.display_name().to_string())
        .or_else(|| Some(class_code.clone()));

    let upload = store
        .insert_note_upload(&NewNoteUpload {
            user_id: request.owner,
            class_code,
            class_name,
            class_date: request.class_date,
            file_name,
            size_bytes,
            mime_type,
            storage_path,
        })
        .await?;

    info!(
        owner = %upload.user_id,
        path = %upload.storage_path,
        size = size_bytes,
        "Notes file uploaded"
    );

    Ok(view(objects, upload))
}

/// Notes for a day (and optionally one class), newest first
pub async fn list_notes(
    store: &dyn Store,
    objects: &dyn ObjectStore,
    owner: OwnerId,
    class_date: NaiveDate,
    class_code: Option<String>,
) -> Result<Vec<NoteView>, StoreError> {
    let filter = NoteFilter {
        class_date: Some(class_date),
        class_code: class_code
            .map(|code| code.trim().to_string())
            .filter(|code| !code.is_empty()),
    };

    Ok(store
        .list_note_uploads(owner, &filter)
        .await?
        .into_iter()
        .map(|upload| view(objects, upload))
        .collect())
}
