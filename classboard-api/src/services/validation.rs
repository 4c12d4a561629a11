//! Upload checks
//!
//! Run on the request body before anything touches the network.

use classboard_common::time::format_file_size;
use thiserror::Error;

/// Why an upload was refused
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadRejected {
    #[error("File is empty")]
    Empty,

    #[error("File is too large ({size}); the limit is {limit}")]
    TooLarge { size: String, limit: String },

    #[error("Schedule must be an image file (got {0})")]
    NotAnImage(String),

    #[error("Invalid file name: '{0}'")]
    BadFileName(String),

    #[error("Invalid class code: '{0}'")]
    BadClassCode(String),
}

/// MIME type of the bytes when they are a recognised image format
pub fn sniff_image_mime(bytes: &[u8]) -> Option<&'static str> {
    infer::get(bytes)
        .filter(|kind| kind.matcher_type() == infer::MatcherType::Image)
        .map(|kind| kind.mime_type())
}

fn check_size(len: usize, limit: u64) -> Result<(), UploadRejected> {
    if len == 0 {
        return Err(UploadRejected::Empty);
    }
    if len as u64 > limit {
        return Err(UploadRejected::TooLarge {
            size: format_file_size(len as u64),
            limit: format_file_size(limit),
        });
    }
    Ok(())
}

/// Trimmed value when it can stand as one storage path segment
fn path_segment(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let bad = trimmed.is_empty()
        || trimmed == "."
        || trimmed == ".."
        || trimmed.contains(['/', '\\'])
        || trimmed.chars().any(char::is_control);

    (!bad).then(|| trimmed.to_string())
}

/// File name usable as the last segment of a storage path
pub fn validate_file_name(name: &str) -> Result<String, UploadRejected> {
    path_segment(name).ok_or_else(|| UploadRejected::BadFileName(name.to_string()))
}

/// Class code usable as a folder in a notes path
pub fn validate_class_code(code: &str) -> Result<String, UploadRejected> {
    path_segment(code).ok_or_else(|| UploadRejected::BadClassCode(code.to_string()))
}

/// Check a schedule image; returns the sniffed MIME type
pub fn validate_schedule_image(
    declared_type: Option<&str>,
    bytes: &[u8],
    max_bytes: u64,
) -> Result<&'static str, UploadRejected> {
    check_size(bytes.len(), max_bytes)?;

    let declared = declared_type.unwrap_or("none").trim();
    if !declared.to_ascii_lowercase().starts_with("image/") {
        return Err(UploadRejected::NotAnImage(declared.to_string()));
    }

    sniff_image_mime(bytes)
        .ok_or_else(|| UploadRejected::NotAnImage(format!("{} with non-image content", declared)))
}

/// Check a notes file; any type is accepted
pub fn validate_notes_file(bytes: &[u8], max_bytes: u64) -> Result<(), UploadRejected> {
    check_size(bytes.len(), max_bytes)
}
