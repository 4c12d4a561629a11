//! Table and object storage
//!
//! The service talks to its system of record through two traits:
//! [`Store`] for the four tables and [`ObjectStore`] for the two file
//! buckets. The hosted REST backend is used in production; the SQLite
//! backend serves local development and the test-suite.

pub mod rest;
pub mod sqlite;

use async_trait::async_trait;
use chrono::NaiveDate;
use classboard_common::models::{
    ClassKey, ClassRecord, NewClass, NewNoteUpload, NewReminder, NewScheduleUpload, NoteUpload,
    Reminder, ScheduleUpload,
};
use classboard_common::OwnerId;
use thiserror::Error;

pub use rest::RestStore;
pub use sqlite::SqliteStore;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Store returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unexpected store response: {0}")]
    Parse(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// File buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    /// Uploaded schedule images, removed once processed
    Schedules,
    /// Lecture notes, kept until reset
    Notes,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Schedules => "schedules",
            Bucket::Notes => "notes",
        }
    }
}

/// Optional narrowing for the notes listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteFilter {
    pub class_date: Option<NaiveDate>,
    pub class_code: Option<String>,
}

/// Table access, every call scoped to one owner
#[async_trait]
pub trait Store: Send + Sync {
    /// All classes of an owner, oldest first
    async fn list_classes(&self, owner: OwnerId) -> StoreResult<Vec<ClassRecord>>;

    /// Row with exactly this owner, code, day string and start time
    async fn find_class(&self, key: &ClassKey) -> StoreResult<Option<ClassRecord>>;

    /// Any row carrying this course code
    async fn find_class_by_code(
        &self,
        owner: OwnerId,
        class_code: &str,
    ) -> StoreResult<Option<ClassRecord>>;

    /// Insert all rows in one call and return them as stored
    async fn insert_classes(&self, rows: &[NewClass]) -> StoreResult<Vec<ClassRecord>>;

    async fn delete_classes(&self, owner: OwnerId) -> StoreResult<u64>;

    /// Note uploads, newest first
    async fn list_note_uploads(
        &self,
        owner: OwnerId,
        filter: &NoteFilter,
    ) -> StoreResult<Vec<NoteUpload>>;

    async fn insert_note_upload(&self, row: &NewNoteUpload) -> StoreResult<NoteUpload>;

    async fn delete_note_uploads(&self, owner: OwnerId) -> StoreResult<u64>;

    /// Reminders, newest first
    async fn list_reminders(
        &self,
        owner: OwnerId,
        unresolved_only: bool,
    ) -> StoreResult<Vec<Reminder>>;

    async fn insert_reminder(&self, row: &NewReminder) -> StoreResult<Reminder>;

    /// Mark one reminder resolved; `NotFound` if the owner has no such id
    async fn resolve_reminder(&self, owner: OwnerId, id: i64) -> StoreResult<Reminder>;

    /// Delete one reminder; `NotFound` if the owner has no such id
    async fn delete_reminder(&self, owner: OwnerId, id: i64) -> StoreResult<()>;

    async fn delete_reminders(&self, owner: OwnerId) -> StoreResult<u64>;

    async fn insert_schedule_upload(&self, row: &NewScheduleUpload)
        -> StoreResult<ScheduleUpload>;

    async fn list_schedule_uploads(&self, owner: OwnerId) -> StoreResult<Vec<ScheduleUpload>>;

    async fn delete_schedule_uploads(&self, owner: OwnerId) -> StoreResult<u64>;
}

/// File access
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write a file, replacing any existing file at the same path
    async fn upload(
        &self,
        bucket: Bucket,
        path: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> StoreResult<()>;

    /// Read a file; `NotFound` when absent
    async fn download(&self, bucket: Bucket, path: &str) -> StoreResult<Vec<u8>>;

    /// Full paths of the files directly inside `folder`
    async fn list(&self, bucket: Bucket, folder: &str) -> StoreResult<Vec<String>>;

    /// Remove files; paths that do not exist are ignored
    async fn remove(&self, bucket: Bucket, paths: &[String]) -> StoreResult<()>;

    /// Address a browser can fetch the file from
    fn public_url(&self, bucket: Bucket, path: &str) -> String;
}

/// Path of a file inside a folder
pub fn join_path(folder: &str, name: &str) -> String {
    let folder = folder.trim_matches('/');
    if folder.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", folder, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_names() {
        assert_eq!(Bucket::Schedules.as_str(), "schedules");
        assert_eq!(Bucket::Notes.as_str(), "notes");
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("owner", "a.png"), "owner/a.png");
        assert_eq!(join_path("/owner/", "a.png"), "owner/a.png");
        assert_eq!(join_path("", "a.png"), "a.png");
    }

    #[test]
    fn test_error_messages() {
        let err = StoreError::Api {
            status: 409,
            message: "duplicate key".to_string(),
        };
        assert_eq!(err.to_string(), "Store returned 409: duplicate key");
    }
}
