//! Business logic behind the HTTP handlers

pub mod dashboard;
pub mod extraction;
pub mod notes;
pub mod reminders;
pub mod reply_parser;
pub mod reset;
pub mod validation;

pub use extraction::{ExtractionError, ExtractionOutcome, ExtractionRequest, ScheduleExtractor};
pub use reply_parser::{parse_reply, ReplyParseError};
