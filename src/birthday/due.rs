//! Due-date calculation: how many days until a birthday comes around again.

use crate::birthday::date::BirthDate;
use chrono::{Datelike, NaiveDate};

/// The next day on or after `today` on which `date` occurs.
pub fn next_occurrence(today: NaiveDate, date: BirthDate) -> NaiveDate {
    let candidate = date.occurrence_in(today.year());
    if candidate < today {
        date.occurrence_in(today.year() + 1)
    } else {
        candidate
    }
}

/// Whole days from `today` until the next occurrence of `date`. Zero means
/// the birthday is today.
pub fn days_until(today: NaiveDate, date: BirthDate) -> u32 {
    let days = (next_occurrence(today, date) - today).num_days();
    u32::try_from(days).unwrap_or(0)
}

/// Returns `true` when `date` occurs on `today`.
pub fn is_due(today: NaiveDate, date: BirthDate) -> bool {
    days_until(today, date) == 0
}
