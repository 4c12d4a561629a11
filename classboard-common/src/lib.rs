//! # Classboard Common Library
//!
//! Shared code for the Classboard service and its tests:
//! - Row types persisted in the hosted store
//! - Weekday codes and schedule views (today, next class, weekly grid)
//! - Date/time display helpers pinned to the campus timezone
//! - Display colour selection per class code
//! - Bootstrap configuration loading

pub mod color;
pub mod config;
pub mod error;
pub mod models;
pub mod schedule;
pub mod time;

pub use error::{Error, Result};
pub use models::OwnerId;
pub use schedule::Weekday;
