//! Class views and the dashboard summary
//!
//! Every view is computed from a fresh store query. Whether the owner has
//! a schedule is never remembered between requests.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use classboard_common::color::{color_for_code, ClassColor};
use classboard_common::models::ClassRecord;
use classboard_common::schedule::{classes_on, next_class, weekly_grid};
use classboard_common::time::{
    day_of_week, format_date_for_display, format_date_time_for_display, format_time,
    local_date, local_datetime, Language,
};
use classboard_common::{OwnerId, Weekday};
use serde::Serialize;

use crate::store::{NoteFilter, Store, StoreError};

/// Class row with display fields
#[derive(Debug, Clone, Serialize)]
pub struct ClassView {
    #[serde(flatten)]
    pub class: ClassRecord,
    pub display_name: String,
    /// "HH:MM"
    pub start: String,
    /// "HH:MM"
    pub end: String,
    pub color: ClassColor,
}

impl From<ClassRecord> for ClassView {
    fn from(class: ClassRecord) -> Self {
        Self {
            display_name: class.display_name().to_string(),
            start: format_time(&class.start_time),
            end: format_time(&class.end_time),
            color: color_for_code(&class.class_code),
            class,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DayView {
    pub day: Weekday,
    pub classes: Vec<ClassView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NextClassView {
    #[serde(flatten)]
    pub class: ClassView,
    pub starts_at: NaiveDateTime,
    pub days_until: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total_classes: usize,
    pub notes_uploaded: usize,
    pub reminders_set: usize,
}

/// Everything the dashboard page shows
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    /// YYYY-MM-DD in the campus zone
    pub date: String,
    pub display_date: String,
    pub weekday: Weekday,
    pub has_schedule: bool,
    pub today: Vec<ClassView>,
    pub next_class: Option<NextClassView>,
    pub stats: Stats,
}

fn views(classes: Vec<ClassRecord>) -> Vec<ClassView> {
    classes.into_iter().map(ClassView::from).collect()
}

pub async fn all_classes(store: &dyn Store, owner: OwnerId) -> Result<Vec<ClassView>, StoreError> {
    Ok(views(store.list_classes(owner).await?))
}

/// Active classes meeting on `date`, earliest first
pub async fn classes_for_date(
    store: &dyn Store,
    owner: OwnerId,
    date: NaiveDate,
) -> Result<Vec<ClassView>, StoreError> {
    let classes = store.list_classes(owner).await?;
    Ok(views(classes_on(&classes, day_of_week(date))))
}

/// Active classes grouped Sunday..Saturday
pub async fn week(store: &dyn Store, owner: OwnerId) -> Result<Vec<DayView>, StoreError> {
    let classes = store.list_classes(owner).await?;
    Ok(weekly_grid(&classes)
        .into_iter()
        .map(|day| DayView {
            day: day.day,
            classes: views(day.classes),
        })
        .collect())
}

pub async fn dashboard(
    store: &dyn Store,
    owner: OwnerId,
    now: DateTime<Utc>,
    zone: FixedOffset,
    language: Language,
) -> Result<Dashboard, StoreError> {
    let today = local_date(now, zone);
    let weekday = day_of_week(today);

    let classes = store.list_classes(owner).await?;
    let active_classes = classes.iter().filter(|class| class.active).count();
    let notes = store.list_note_uploads(owner, &NoteFilter::default()).await?;
    let reminders = store.list_reminders(owner, false).await?;

    let next = next_class(&classes, local_datetime(now, zone)).map(|next| NextClassView {
        class: ClassView::from(next.class),
        starts_at: next.starts_at,
        days_until: next.days_until,
    });

    Ok(Dashboard {
        date: format_date_for_display(today),
        display_date: format_date_time_for_display(now, zone, language),
        weekday,
        has_schedule: active_classes > 0,
        today: views(classes_on(&classes, weekday)),
        next_class: next,
        stats: Stats {
            total_classes: active_classes,
            notes_uploaded: notes.len(),
            reminders_set: reminders.len(),
        },
    })
}
