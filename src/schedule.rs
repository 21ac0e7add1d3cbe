use chrono::{Datelike, NaiveDate, Weekday};

use crate::model::{ClassDay, ScheduleSlot};

/// Weekday label for a calendar date, or None on weekends.
pub fn class_day_of(date: NaiveDate) -> Option<ClassDay> {
    match date.weekday() {
        Weekday::Mon => Some(ClassDay::Mon),
        Weekday::Tue => Some(ClassDay::Tue),
        Weekday::Wed => Some(ClassDay::Wed),
        Weekday::Thu => Some(ClassDay::Thu),
        Weekday::Fri => Some(ClassDay::Fri),
        Weekday::Sat | Weekday::Sun => None,
    }
}

/// Whether a class group with these weekly slots is in session on `date`.
/// An empty slot list never matches.
pub fn meets_on(slots: &[ScheduleSlot], date: NaiveDate) -> bool {
    match class_day_of(date) {
        Some(day) => slots.iter().any(|slot| slot.day == day),
        None => false,
    }
}
