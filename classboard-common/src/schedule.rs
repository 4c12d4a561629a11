//! Weekday codes and schedule views
//!
//! Classes carry their meeting days as three-letter codes ("Sun".."Sat").
//! The extraction model reports days as numbers where 1 is Sunday, matching
//! a week that starts on Sunday.

use chrono::{Duration, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::ClassRecord;
use crate::time::parse_time_of_day;

/// Day of the week, Sunday first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Weekday {
    Sun,
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
}

impl Weekday {
    /// All days in display order
    pub const ALL: [Weekday; 7] = [
        Weekday::Sun,
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
    ];

    /// Map a model day number (1 = Sunday .. 7 = Saturday)
    pub fn from_day_number(day_number: i64) -> Option<Self> {
        if (1..=7).contains(&day_number) {
            Some(Self::ALL[(day_number - 1) as usize])
        } else {
            None
        }
    }

    /// Three-letter code stored in `days_of_week`
    pub fn code(&self) -> &'static str {
        match self {
            Weekday::Sun => "Sun",
            Weekday::Mon => "Mon",
            Weekday::Tue => "Tue",
            Weekday::Wed => "Wed",
            Weekday::Thu => "Thu",
            Weekday::Fri => "Fri",
            Weekday::Sat => "Sat",
        }
    }

    /// Parse a three-letter code (case-insensitive)
    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim();
        Self::ALL
            .into_iter()
            .find(|day| day.code().eq_ignore_ascii_case(code))
    }

    /// Whether this day appears in a `days_of_week` value such as "Sun,Tue"
    pub fn occurs_in(&self, days_of_week: &str) -> bool {
        days_of_week
            .split(|c: char| !c.is_ascii_alphabetic())
            .any(|token| Weekday::from_code(token) == Some(*self))
    }

    fn index(&self) -> i64 {
        Self::ALL.iter().position(|day| day == self).unwrap_or(0) as i64
    }
}

impl From<chrono::Weekday> for Weekday {
    fn from(day: chrono::Weekday) -> Self {
        Self::ALL[day.num_days_from_sunday() as usize]
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Upcoming class occurrence
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NextClass {
    pub class: ClassRecord,
    /// Local date and time the class next starts
    pub starts_at: NaiveDateTime,
    /// 0 for today, 1 for tomorrow, ...
    pub days_until: i64,
}

/// Classes meeting on one weekday
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaySchedule {
    pub day: Weekday,
    pub classes: Vec<ClassRecord>,
}

fn start_of(class: &ClassRecord) -> Option<NaiveTime> {
    parse_time_of_day(&class.start_time)
}

fn by_start_time(a: &ClassRecord, b: &ClassRecord) -> std::cmp::Ordering {
    start_of(a)
        .cmp(&start_of(b))
        .then_with(|| a.class_code.cmp(&b.class_code))
}

/// Active classes meeting on `day`, earliest first
pub fn classes_on(classes: &[ClassRecord], day: Weekday) -> Vec<ClassRecord> {
    let mut matching: Vec<ClassRecord> = classes
        .iter()
        .filter(|class| class.active && day.occurs_in(&class.days_of_week))
        .cloned()
        .collect();
    matching.sort_by(by_start_time);
    matching
}

/// Active classes grouped Sunday..Saturday
pub fn weekly_grid(classes: &[ClassRecord]) -> Vec<DaySchedule> {
    Weekday::ALL
        .into_iter()
        .map(|day| DaySchedule {
            day,
            classes: classes_on(classes, day),
        })
        .collect()
}

/// Earliest class start within the next seven days
///
/// Classes later today count only if they have not started yet. Rows with an
/// unparseable start time are ignored.
pub fn next_class(classes: &[ClassRecord], now: NaiveDateTime) -> Option<NextClass> {
    let today = now.date();
    let today_index = Weekday::from(chrono::Datelike::weekday(&today)).index();

    let mut best: Option<NextClass> = None;

    for days_until in 0..7i64 {
        let date = today + Duration::days(days_until);
        let day = Weekday::ALL[((today_index + days_until) % 7) as usize];

        for class in classes_on(classes, day) {
            let Some(start) = start_of(&class) else {
                continue;
            };
            if days_until == 0 && start <= now.time() {
                continue;
            }

            let starts_at = date.and_time(start);
            let earlier = best
                .as_ref()
                .map(|current| starts_at < current.starts_at)
                .unwrap_or(true);
            if earlier {
                best = Some(NextClass {
                    class,
                    starts_at,
                    days_until,
                });
            }
        }

        // Days are visited in order, so the first hit is the earliest.
        if best.is_some() {
            break;
        }
    }

    best
}
