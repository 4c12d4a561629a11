//! Schedule extraction pipeline
//!
//! Stored schedule image → vision model → validated entries → new class
//! rows. Entries already stored for the owner (same code, day and start
//! time) are skipped, so re-submitting an image inserts nothing new.
//!
//! The source image is removed once the insert step has run, whatever its
//! outcome. If the model call or the reply parse fails the image is kept,
//! so the same upload can be processed again.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use classboard_common::models::{
    ClassRecord, NewClass, NewScheduleUpload, ScheduleUploadStatus,
    DEFAULT_REMIND_BEFORE_MINUTES,
};
use classboard_common::OwnerId;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::services::reply_parser::{parse_reply, ReplyParseError, ScheduleEntry};
use crate::services::validation::sniff_image_mime;
use crate::store::{Bucket, ObjectStore, Store, StoreError};
use crate::vision::{InlineImage, VisionError, VisionModel, SCHEDULE_PROMPT};

/// Fallback when the image bytes match no known signature
const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

/// Pipeline errors, one per step
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Failed to download image: {0}")]
    Download(StoreError),

    #[error("Failed to read schedule image: {0}")]
    Vision(#[from] VisionError),

    #[error("Failed to parse schedule data from AI response: {0}")]
    Parse(#[from] ReplyParseError),

    #[error("Failed to check existing classes: {0}")]
    Lookup(StoreError),

    #[error("Failed to insert classes: {0}")]
    Insert(StoreError),
}

/// A stored schedule image to process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRequest {
    pub owner: OwnerId,
    /// Path inside the `schedules` bucket
    pub file_path: String,
    /// Original file name, for logs
    pub file_name: String,
}

/// Result of one pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionOutcome {
    /// Entries in the model reply
    pub classes_found: usize,
    pub classes_inserted: usize,
    /// Entries already stored, or repeated within the reply
    pub classes_skipped: usize,
    /// Rows as inserted
    pub classes: Vec<ClassRecord>,
}

/// Runs the schedule-image pipeline
pub struct ScheduleExtractor {
    store: Arc<dyn Store>,
    objects: Arc<dyn ObjectStore>,
    vision: Arc<dyn VisionModel>,
}

impl ScheduleExtractor {
    pub fn new(
        store: Arc<dyn Store>,
        objects: Arc<dyn ObjectStore>,
        vision: Arc<dyn VisionModel>,
    ) -> Self {
        Self {
            store,
            objects,
            vision,
        }
    }

    /// Process one stored image
    pub async fn process(
        &self,
        request: &ExtractionRequest,
    ) -> Result<ExtractionOutcome, ExtractionError> {
        info!(
            owner = %request.owner,
            file_path = %request.file_path,
            file_name = %request.file_name,
            model = self.vision.model_name(),
            "Processing schedule image"
        );

        let bytes = self
            .objects
            .download(Bucket::Schedules, &request.file_path)
            .await
            .map_err(ExtractionError::Download)?;

        let image = inline_image(&bytes);
        debug!(mime_type = %image.mime_type, size = bytes.len(), "Schedule image loaded");

        let reply = match self.vision.generate(SCHEDULE_PROMPT, &image).await {
            Ok(reply) => reply,
            Err(e) => {
                self.record_run(request, None, None, ScheduleUploadStatus::Failed)
                    .await;
                return Err(e.into());
            }
        };

        let parsed = match parse_reply(&reply) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, reply_len = reply.len(), "Model reply rejected");
                self.record_run(request, Some(reply), None, ScheduleUploadStatus::Failed)
                    .await;
                return Err(e.into());
            }
        };

        let classes_found = parsed.entries.len();
        let result = self.store_entries(request.owner, &parsed.entries).await;

        self.remove_image(&request.file_path).await;

        let status = if result.is_ok() {
            ScheduleUploadStatus::Processed
        } else {
            ScheduleUploadStatus::Failed
        };
        self.record_run(request, Some(reply), Some(parsed.json), status)
            .await;

        let (classes, skipped) = result?;
        info!(
            found = classes_found,
            inserted = classes.len(),
            skipped,
            "Schedule image processed"
        );

        Ok(ExtractionOutcome {
            classes_found,
            classes_inserted: classes.len(),
            classes_skipped: skipped,
            classes,
        })
    }

    /// Stage new rows and insert them; returns the rows and the skip count
    async fn store_entries(
        &self,
        owner: OwnerId,
        entries: &[ScheduleEntry],
    ) -> Result<(Vec<ClassRecord>, usize), ExtractionError> {
        let mut staged: Vec<NewClass> = Vec::new();
        let mut seen = HashSet::new();
        let mut skipped = 0;

        for entry in entries {
            let row = new_class(owner, entry);
            let key = row.key();

            if !seen.insert(key.clone()) {
                debug!(class_code = %row.class_code, day = %row.days_of_week, "Repeated in reply, skipping");
                skipped += 1;
                continue;
            }

            let existing = self
                .store
                .find_class(&key)
                .await
                .map_err(ExtractionError::Lookup)?;
            if existing.is_some() {
                info!(
                    class_code = %row.class_code,
                    day = %row.days_of_week,
                    start = %row.start_time,
                    "Class already exists, skipping"
                );
                skipped += 1;
                continue;
            }

            staged.push(row);
        }

        if staged.is_empty() {
            return Ok((Vec::new(), skipped));
        }

        let inserted = self
            .store
            .insert_classes(&staged)
            .await
            .map_err(ExtractionError::Insert)?;

        Ok((inserted, skipped))
    }

    async fn remove_image(&self, file_path: &str) {
        if let Err(e) = self
            .objects
            .remove(Bucket::Schedules, &[file_path.to_string()])
            .await
        {
            warn!(file_path, error = %e, "Failed to delete processed schedule image");
        }
    }

    async fn record_run(
        &self,
        request: &ExtractionRequest,
        reply: Option<String>,
        parsed_json: Option<Value>,
        status: ScheduleUploadStatus,
    ) {
        let row = NewScheduleUpload {
            user_id: request.owner,
            file_path: request.file_path.clone(),
            ocr_text: reply,
            parsed_json,
            status,
        };

        if let Err(e) = self.store.insert_schedule_upload(&row).await {
            warn!(file_path = %request.file_path, error = %e, "Failed to record schedule upload");
        }
    }
}

/// Base64 image with its sniffed MIME type
pub fn inline_image(bytes: &[u8]) -> InlineImage {
    InlineImage {
        mime_type: sniff_image_mime(bytes)
            .unwrap_or(DEFAULT_IMAGE_MIME)
            .to_string(),
        data: STANDARD.encode(bytes),
    }
}

/// Class row for a validated entry
pub fn new_class(owner: OwnerId, entry: &ScheduleEntry) -> NewClass {
    NewClass {
        user_id: owner,
        class_code: entry.course_code.clone(),
        class_name: entry.class_name(),
        location: entry.location(),
        days_of_week: entry.weekday.code().to_string(),
        start_time: entry.start_time.clone(),
        end_time: entry.end_time.clone(),
        remind_before_minutes: DEFAULT_REMIND_BEFORE_MINUTES,
        active: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use classboard_common::Weekday;

    #[test]
    fn test_inline_image_sniffs_png() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        let image = inline_image(&png);
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(STANDARD.decode(&image.data).unwrap(), png);
    }

    #[test]
    fn test_inline_image_falls_back_to_jpeg() {
        let image = inline_image(b"not an image");
        assert_eq!(image.mime_type, "image/jpeg");
    }

    #[test]
    fn test_new_class_mapping() {
        let owner: OwnerId = "797281cf-9397-4fca-b983-300825cde186".parse().unwrap();
        let entry = ScheduleEntry {
            course_code: "1203".to_string(),
            course_name_arabic: Some("مهارات التعلم".to_string()),
            course_name_english: Some("Learning Skills".to_string()),
            weekday: Weekday::Mon,
            start_time: "13:00:00".to_string(),
            end_time: "14:50:00".to_string(),
            building: Some("02".to_string()),
            floor: None,
            wing: Some("A".to_string()),
            room: Some("320".to_string()),
            instructor_name: None,
        };

        let row = new_class(owner, &entry);
        assert_eq!(row.class_name.as_deref(), Some("مهارات التعلم"));
        assert_eq!(row.location.as_deref(), Some("Building 02, Wing A, Room 320"));
        assert_eq!(row.days_of_week, "Mon");
        assert_eq!(row.remind_before_minutes, 30);
        assert!(row.active);
    }
}
