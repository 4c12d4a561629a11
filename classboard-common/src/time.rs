//! Date and time display helpers
//!
//! Every "today" in Classboard is the campus calendar day, not the server's.
//! The campus zone is a fixed UTC offset (Asia/Riyadh observes no DST).

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::schedule::Weekday;
use crate::{Error, Result};

/// Asia/Riyadh, UTC+03:00
pub const CAMPUS_UTC_OFFSET_MINUTES: i32 = 180;

const MONTHS_EN: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

const MONTHS_AR: [&str; 12] = [
    "يناير", "فبراير", "مارس", "أبريل", "مايو", "يونيو", "يوليو", "أغسطس", "سبتمبر",
    "أكتوبر", "نوفمبر", "ديسمبر",
];

/// Display language for long-form dates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Ar,
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Language::En),
            "ar" => Ok(Language::Ar),
            other => Err(Error::InvalidInput(format!("Unsupported language: {}", other))),
        }
    }
}

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Build the campus offset from minutes east of UTC
pub fn zone_offset(minutes_east: i32) -> Result<FixedOffset> {
    FixedOffset::east_opt(minutes_east * 60)
        .ok_or_else(|| Error::Config(format!("UTC offset out of range: {} minutes", minutes_east)))
}

/// Wall-clock time in `zone` at the instant `at`
pub fn local_datetime(at: DateTime<Utc>, zone: FixedOffset) -> NaiveDateTime {
    at.with_timezone(&zone).naive_local()
}

/// Calendar date in `zone` at the instant `at`
pub fn local_date(at: DateTime<Utc>, zone: FixedOffset) -> NaiveDate {
    local_datetime(at, zone).date()
}

/// Today's date in `zone`
pub fn today_in(zone: FixedOffset) -> NaiveDate {
    local_date(now(), zone)
}

/// Weekday code of a calendar date
pub fn day_of_week(date: NaiveDate) -> Weekday {
    Weekday::from(date.weekday())
}

/// Parse "H:MM", "HH:MM" or "HH:MM:SS"
pub fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()
}

/// Normalise a time of day to the stored "HH:MM:SS" form
pub fn normalize_time_of_day(raw: &str) -> Option<String> {
    parse_time_of_day(raw).map(|time| time.format("%H:%M:%S").to_string())
}

/// Format a stored time as "HH:MM"; unparseable input is returned as-is
pub fn format_time(raw: &str) -> String {
    match parse_time_of_day(raw) {
        Some(time) => time.format("%H:%M").to_string(),
        None => raw.to_string(),
    }
}

/// Format a byte count as "0 bytes", "512 bytes", "1.5 KB", "2 MB", ...
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["bytes", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 bytes".to_string();
    }

    let mut unit = 0;
    let mut value = bytes as f64;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = (value * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{:.0} {}", rounded, UNITS[unit])
    } else {
        format!("{:.1} {}", rounded, UNITS[unit])
    }
}

/// Short date as "YYYY-MM-DD"
pub fn format_date_for_display(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Long date, e.g. "October 18, 2026" or "١٨ أكتوبر ٢٠٢٦"
pub fn format_date_time_for_display(
    at: DateTime<Utc>,
    zone: FixedOffset,
    language: Language,
) -> String {
    format_long_date(local_date(at, zone), language)
}

/// Long date for an already-local calendar date
pub fn format_long_date(date: NaiveDate, language: Language) -> String {
    let month = date.month0() as usize;
    match language {
        Language::En => format!("{} {}, {}", MONTHS_EN[month], date.day(), date.year()),
        Language::Ar => format!(
            "{} {} {}",
            arabic_digits(&date.day().to_string()),
            MONTHS_AR[month],
            arabic_digits(&date.year().to_string())
        ),
    }
}

fn arabic_digits(ascii: &str) -> String {
    ascii
        .chars()
        .map(|c| match c.to_digit(10) {
            Some(d) => char::from_u32(0x0660 + d).unwrap_or(c),
            None => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn riyadh() -> FixedOffset {
        zone_offset(CAMPUS_UTC_OFFSET_MINUTES).unwrap()
    }

    #[test]
    fn test_now_returns_recent_timestamp() {
        let timestamp = now();
        assert!(timestamp.timestamp() > 946_684_800); // 2000-01-01
        assert!(timestamp.timestamp() < 4_102_444_800); // 2100-01-01
    }

    #[test]
    fn test_zone_offset_rejects_out_of_range() {
        assert!(zone_offset(24 * 60).is_err());
        assert!(zone_offset(-300).is_ok());
    }

    #[test]
    fn test_local_date_crosses_midnight() {
        // 22:30 UTC is already the next day in Riyadh
        let at = Utc.with_ymd_and_hms(2025, 10, 12, 22, 30, 0).unwrap();
        assert_eq!(local_date(at, riyadh()), NaiveDate::from_ymd_opt(2025, 10, 13).unwrap());
        assert_eq!(
            local_datetime(at, riyadh()).time(),
            NaiveTime::from_hms_opt(1, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_day_of_week() {
        let monday = NaiveDate::from_ymd_opt(2025, 10, 13).unwrap();
        assert_eq!(day_of_week(monday), Weekday::Mon);
        let sunday = NaiveDate::from_ymd_opt(2025, 10, 12).unwrap();
        assert_eq!(day_of_week(sunday), Weekday::Sun);
    }

    #[test]
    fn test_format_time_variants() {
        assert_eq!(format_time("09:05:00"), "09:05");
        assert_eq!(format_time("9:05"), "09:05");
        assert_eq!(format_time("13:00"), "13:00");
        assert_eq!(format_time(""), "");
        assert_eq!(format_time("later"), "later");
    }

    #[test]
    fn test_normalize_time_of_day() {
        assert_eq!(normalize_time_of_day("09:00").as_deref(), Some("09:00:00"));
        assert_eq!(normalize_time_of_day("14:50:00").as_deref(), Some("14:50:00"));
        assert_eq!(normalize_time_of_day("25:00"), None);
        assert_eq!(normalize_time_of_day("noon"), None);
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 bytes");
        assert_eq!(format_file_size(512), "512 bytes");
        assert_eq!(format_file_size(1024), "1 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(10 * 1024 * 1024), "10 MB");
        assert_eq!(format_file_size(3 * 1024 * 1024 * 1024), "3 GB");
    }

    #[test]
    fn test_format_date_for_display() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(format_date_for_display(date), "2025-03-07");
    }

    #[test]
    fn test_long_date_english_and_arabic() {
        let at = Utc.with_ymd_and_hms(2026, 10, 17, 22, 0, 0).unwrap();
        assert_eq!(
            format_date_time_for_display(at, riyadh(), Language::En),
            "October 18, 2026"
        );
        assert_eq!(
            format_date_time_for_display(at, riyadh(), Language::Ar),
            "١٨ أكتوبر ٢٠٢٦"
        );
    }

    #[test]
    fn test_language_from_str() {
        assert_eq!("AR".parse::<Language>().unwrap(), Language::Ar);
        assert!("fr".parse::<Language>().is_err());
    }
}
