//! Model reply parser
//!
//! Turns the vision model's reply text into validated schedule entries.
//! The reply is first read strictly as a JSON array. When the model wraps
//! the array in prose or a code fence, the first top-level array is located
//! with a bracket scan that skips over string contents, then read strictly.
//! Any entry that fails validation rejects the whole reply.

use classboard_common::time::normalize_time_of_day;
use classboard_common::Weekday;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

/// Reply parse errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReplyParseError {
    #[error("No JSON array found in model reply")]
    NoArray,

    #[error("Model reply is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("Entry {index}: {reason}")]
    InvalidEntry { index: usize, reason: String },
}

/// One class entry exactly as the model reported it
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawEntry {
    #[serde(deserialize_with = "required_text")]
    pub course_code: String,
    #[serde(default, deserialize_with = "optional_text")]
    pub course_name_arabic: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub course_name_english: Option<String>,
    #[serde(deserialize_with = "integer")]
    pub day_number: i64,
    #[serde(deserialize_with = "required_text")]
    pub start_time: String,
    #[serde(deserialize_with = "required_text")]
    pub end_time: String,
    #[serde(default, deserialize_with = "optional_text")]
    pub building: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub floor: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub wing: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub room: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub instructor_name: Option<String>,
}

/// Validated entry, ready to become a class row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub course_code: String,
    pub course_name_arabic: Option<String>,
    pub course_name_english: Option<String>,
    pub weekday: Weekday,
    /// "HH:MM:SS"
    pub start_time: String,
    /// "HH:MM:SS"
    pub end_time: String,
    pub building: Option<String>,
    pub floor: Option<String>,
    pub wing: Option<String>,
    pub room: Option<String>,
    pub instructor_name: Option<String>,
}

impl ScheduleEntry {
    /// "Building 02, Floor 2, Wing A, Room 320", omitting missing parts
    pub fn location(&self) -> Option<String> {
        let parts: Vec<String> = [
            ("Building", &self.building),
            ("Floor", &self.floor),
            ("Wing", &self.wing),
            ("Room", &self.room),
        ]
        .into_iter()
        .filter_map(|(label, value)| value.as_ref().map(|v| format!("{} {}", label, v)))
        .collect();

        (!parts.is_empty()).then(|| parts.join(", "))
    }

    /// Arabic course name, falling back to the English one
    pub fn class_name(&self) -> Option<String> {
        self.course_name_arabic
            .clone()
            .or_else(|| self.course_name_english.clone())
    }
}

/// Parsed reply: the entries plus the JSON they came from
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReply {
    pub entries: Vec<ScheduleEntry>,
    pub json: Value,
}

/// Parse and validate a model reply
pub fn parse_reply(reply: &str) -> Result<ParsedReply, ReplyParseError> {
    let items = match serde_json::from_str::<Value>(reply.trim()) {
        Ok(Value::Array(items)) => items,
        _ => {
            let slice = find_first_array(reply).ok_or(ReplyParseError::NoArray)?;
            match serde_json::from_str::<Value>(slice) {
                Ok(Value::Array(items)) => items,
                Ok(_) => return Err(ReplyParseError::NoArray),
                Err(e) => return Err(ReplyParseError::InvalidJson(e.to_string())),
            }
        }
    };

    let entries = items
        .iter()
        .enumerate()
        .map(|(index, item)| validate_entry(index, item))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ParsedReply {
        entries,
        json: Value::Array(items),
    })
}

fn validate_entry(index: usize, item: &Value) -> Result<ScheduleEntry, ReplyParseError> {
    let invalid = |reason: String| ReplyParseError::InvalidEntry { index, reason };

    let raw = RawEntry::deserialize(item).map_err(|e| invalid(e.to_string()))?;

    if raw.course_code.is_empty() {
        return Err(invalid("empty course_code".to_string()));
    }

    let weekday = Weekday::from_day_number(raw.day_number)
        .ok_or_else(|| invalid(format!("day_number {} outside 1..7", raw.day_number)))?;

    let start_time = normalize_time_of_day(&raw.start_time)
        .ok_or_else(|| invalid(format!("malformed start_time '{}'", raw.start_time)))?;
    let end_time = normalize_time_of_day(&raw.end_time)
        .ok_or_else(|| invalid(format!("malformed end_time '{}'", raw.end_time)))?;

    Ok(ScheduleEntry {
        course_code: raw.course_code,
        course_name_arabic: raw.course_name_arabic,
        course_name_english: raw.course_name_english,
        weekday,
        start_time,
        end_time,
        building: raw.building,
        floor: raw.floor,
        wing: raw.wing,
        room: raw.room,
        instructor_name: raw.instructor_name,
    })
}

/// Slice of the first balanced `[...]` in `text`
///
/// Brackets inside JSON strings (including escaped quotes) do not count.
pub fn find_first_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    None
}

// Text fields arrive as strings or bare numbers ("building": 2).
fn text_value(value: Value) -> Result<Option<String>, String> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => {
            let trimmed = s.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(format!("expected text, got {}", other)),
    }
}

fn optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    text_value(Value::deserialize(deserializer)?).map_err(serde::de::Error::custom)
}

fn required_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    text_value(Value::deserialize(deserializer)?)
        .map_err(serde::de::Error::custom)
        .map(Option::unwrap_or_default)
}

fn integer<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| serde::de::Error::custom(format!("expected integer, got {}", n))),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("expected integer, got '{}'", s))),
        other => Err(serde::de::Error::custom(format!(
            "expected integer, got {}",
            other
        ))),
    }
}
