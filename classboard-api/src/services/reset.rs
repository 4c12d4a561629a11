//! Schedule reset
//!
//! Removes everything an owner has stored, leaving the same state as a
//! brand-new owner. Files are removed best-effort: the notes files named by
//! the owner's rows, and any schedule images still under the owner's folder
//! (kept there when an extraction failed). Rows are always deleted.

use classboard_common::OwnerId;
use serde::Serialize;
use tracing::{info, warn};

use crate::store::{Bucket, NoteFilter, ObjectStore, Store, StoreError};

/// Rows removed per table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResetSummary {
    pub classes: u64,
    pub notes: u64,
    pub reminders: u64,
    pub schedule_uploads: u64,
    /// Schedule images removed from storage
    pub schedule_images: usize,
    /// Files that could not be removed from storage
    pub files_left_behind: usize,
}

/// Remove files, returning how many could not be removed
async fn remove_files(
    objects: &dyn ObjectStore,
    owner: OwnerId,
    bucket: Bucket,
    paths: &[String],
) -> usize {
    match objects.remove(bucket, paths).await {
        Ok(()) => 0,
        Err(e) => {
            warn!(
                %owner,
                bucket = bucket.as_str(),
                count = paths.len(),
                error = %e,
                "Failed to delete files"
            );
            paths.len()
        }
    }
}

pub async fn reset_owner(
    store: &dyn Store,
    objects: &dyn ObjectStore,
    owner: OwnerId,
) -> Result<ResetSummary, StoreError> {
    let note_paths: Vec<String> = store
        .list_note_uploads(owner, &NoteFilter::default())
        .await?
        .into_iter()
        .map(|note| note.storage_path)
        .collect();
    let mut files_left_behind = remove_files(objects, owner, Bucket::Notes, &note_paths).await;

    let image_paths = match objects.list(Bucket::Schedules, &owner.to_string()).await {
        Ok(paths) => paths,
        Err(e) => {
            warn!(%owner, error = %e, "Failed to list schedule images");
            Vec::new()
        }
    };
    let images_left = remove_files(objects, owner, Bucket::Schedules, &image_paths).await;
    files_left_behind += images_left;

    let summary = ResetSummary {
        notes: store.delete_note_uploads(owner).await?,
        reminders: store.delete_reminders(owner).await?,
        classes: store.delete_classes(owner).await?,
        schedule_uploads: store.delete_schedule_uploads(owner).await?,
        schedule_images: image_paths.len() - images_left,
        files_left_behind,
    };

    info!(
        %owner,
        classes = summary.classes,
        notes = summary.notes,
        reminders = summary.reminders,
        schedule_uploads = summary.schedule_uploads,
        schedule_images = summary.schedule_images,
        files_left_behind = summary.files_left_behind,
        "Schedule reset"
    );

    Ok(summary)
}
