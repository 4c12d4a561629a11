//! Reminders attached to classes

use chrono::NaiveDate;
use classboard_common::models::{ClassRecord, NewReminder, Reminder};
use classboard_common::OwnerId;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;
use tracing::info;

use crate::store::{Store, StoreError};

#[derive(Debug, Error)]
pub enum ReminderError {
    #[error("Class code is required")]
    MissingClassCode,

    #[error("Reminder message is required")]
    MissingMessage,

    #[error("No class with code {0}")]
    UnknownClass(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A reminder as entered on the reminders page
#[derive(Debug, Clone)]
pub struct ReminderRequest {
    pub owner: OwnerId,
    pub class_code: String,
    pub message: String,
    pub remind_date: NaiveDate,
}

/// Reminder with the class it points at
#[derive(Debug, Clone, Serialize)]
pub struct ReminderView {
    #[serde(flatten)]
    pub reminder: Reminder,
    pub class_code: Option<String>,
    pub class_name: Option<String>,
}

fn view(reminder: Reminder, classes: &HashMap<i64, ClassRecord>) -> ReminderView {
    let class = reminder.class_id.and_then(|id| classes.get(&id));
    ReminderView {
        class_code: class.map(|c| c.class_code.clone()),
        class_name: class.map(|c| c.display_name().to_string()),
        reminder,
    }
}

async fn classes_by_id(
    store: &dyn Store,
    owner: OwnerId,
) -> Result<HashMap<i64, ClassRecord>, StoreError> {
    Ok(store
        .list_classes(owner)
        .await?
        .into_iter()
        .map(|class| (class.id, class))
        .collect())
}

pub async fn create_reminder(
    store: &dyn Store,
    request: ReminderRequest,
) -> Result<ReminderView, ReminderError> {
    let class_code = request.class_code.trim();
    if class_code.is_empty() {
        return Err(ReminderError::MissingClassCode);
    }
    let message = request.message.trim();
    if message.is_empty() {
        return Err(ReminderError::MissingMessage);
    }

    let class = store
        .find_class_by_code(request.owner, class_code)
        .await?
        .ok_or_else(|| ReminderError::UnknownClass(class_code.to_string()))?;

    let reminder = store
        .insert_reminder(&NewReminder {
            user_id: request.owner,
            class_id: Some(class.id),
            message: message.to_string(),
            remind_date: request.remind_date,
            resolved: false,
        })
        .await?;

    info!(id = reminder.id, class_code, date = %request.remind_date, "Reminder created");

    Ok(ReminderView {
        class_code: Some(class.class_code.clone()),
        class_name: Some(class.display_name().to_string()),
        reminder,
    })
}

pub async fn list_reminders(
    store: &dyn Store,
    owner: OwnerId,
    unresolved_only: bool,
) -> Result<Vec<ReminderView>, StoreError> {
    let classes = classes_by_id(store, owner).await?;
    Ok(store
        .list_reminders(owner, unresolved_only)
        .await?
        .into_iter()
        .map(|reminder| view(reminder, &classes))
        .collect())
}

pub async fn resolve_reminder(
    store: &dyn Store,
    owner: OwnerId,
    id: i64,
) -> Result<ReminderView, StoreError> {
    let reminder = store.resolve_reminder(owner, id).await?;
    let classes = classes_by_id(store, owner).await?;
    info!(id, "Reminder resolved");
    Ok(view(reminder, &classes))
}

pub async fn delete_reminder(store: &dyn Store, owner: OwnerId, id: i64) -> Result<(), StoreError> {
    store.delete_reminder(owner, id).await?;
    info!(id, "Reminder deleted");
    Ok(())
}
