//! Row types persisted in the hosted store
//!
//! Field names follow the hosted store's column names so rows serialize
//! directly into insert payloads and deserialize straight from query
//! results. Columns the hosted schema declares nullable are read through
//! lenient helpers so a stray `null` never fails a whole listing.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::{Error, Result};

/// Reminder lead applied to every class created from a schedule image
pub const DEFAULT_REMIND_BEFORE_MINUTES: i32 = 30;

/// Identity that partitions every row in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(Uuid);

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for OwnerId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| Error::InvalidInput(format!("Invalid owner id '{}': {}", s, e)))
    }
}

/// Class row as stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassRecord {
    pub id: i64,
    pub user_id: OwnerId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub class_code: String,
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    /// Three-letter weekday codes, e.g. "Mon" or "Sun,Tue"
    #[serde(default, deserialize_with = "null_as_default")]
    pub days_of_week: String,
    /// "HH:MM:SS"
    #[serde(default, deserialize_with = "null_as_default")]
    pub start_time: String,
    /// "HH:MM:SS"
    #[serde(default, deserialize_with = "null_as_default")]
    pub end_time: String,
    #[serde(default)]
    pub remind_before_minutes: Option<i32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl ClassRecord {
    /// Name for display, falling back to the course code
    pub fn display_name(&self) -> &str {
        self.class_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.class_code)
    }
}

/// Insert payload for the classes table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewClass {
    pub user_id: OwnerId,
    pub class_code: String,
    pub class_name: Option<String>,
    pub location: Option<String>,
    pub days_of_week: String,
    pub start_time: String,
    pub end_time: String,
    pub remind_before_minutes: i32,
    pub active: bool,
}

impl NewClass {
    /// Identity used to detect an already stored copy of this class
    pub fn key(&self) -> ClassKey {
        ClassKey {
            owner: self.user_id,
            class_code: self.class_code.clone(),
            days_of_week: self.days_of_week.clone(),
            start_time: self.start_time.clone(),
        }
    }
}

/// Exact-match identity of a class occurrence
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassKey {
    pub owner: OwnerId,
    pub class_code: String,
    pub days_of_week: String,
    pub start_time: String,
}

/// Metadata row for an uploaded notes file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteUpload {
    pub id: i64,
    pub user_id: OwnerId,
    #[serde(default)]
    pub class_code: Option<String>,
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(deserialize_with = "date_prefix")]
    pub class_date: NaiveDate,
    pub file_name: String,
    #[serde(default)]
    pub size_bytes: Option<i64>,
    #[serde(default)]
    pub mime_type: Option<String>,
    pub storage_path: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Insert payload for the notes_uploads table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNoteUpload {
    pub user_id: OwnerId,
    pub class_code: String,
    pub class_name: Option<String>,
    pub class_date: NaiveDate,
    pub file_name: String,
    pub size_bytes: i64,
    pub mime_type: Option<String>,
    pub storage_path: String,
}

/// Reminder row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: i64,
    pub user_id: OwnerId,
    #[serde(default)]
    pub class_id: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(default, deserialize_with = "optional_date_prefix")]
    pub remind_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub resolved: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Insert payload for the reminders table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReminder {
    pub user_id: OwnerId,
    pub class_id: Option<i64>,
    pub message: String,
    pub remind_date: NaiveDate,
    pub resolved: bool,
}

/// Outcome recorded for one schedule image run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleUploadStatus {
    Processed,
    Failed,
}

impl ScheduleUploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::Failed => "failed",
        }
    }
}

/// Staging row capturing a schedule image and what the model made of it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleUpload {
    pub id: i64,
    pub user_id: OwnerId,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub ocr_text: Option<String>,
    #[serde(default)]
    pub parsed_json: Option<serde_json::Value>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Insert payload for the schedule_uploads table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewScheduleUpload {
    pub user_id: OwnerId,
    pub file_path: String,
    pub ocr_text: Option<String>,
    pub parsed_json: Option<serde_json::Value>,
    pub status: ScheduleUploadStatus,
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

// Date columns may come back as plain dates or as full timestamps.
fn parse_date_prefix(raw: &str) -> Option<NaiveDate> {
    raw.get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}

fn date_prefix<'de, D>(deserializer: D) -> std::result::Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_date_prefix(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid date: {}", raw)))
}

fn optional_date_prefix<'de, D>(deserializer: D) -> std::result::Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) => parse_date_prefix(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid date: {}", raw))),
    }
}
