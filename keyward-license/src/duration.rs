//! Expiration date arithmetic.

use chrono::{Days, NaiveDate};

/// Computes a new effective end date `duration` days from `today`.
///
/// With `extend_existing`, a positive `duration` is added on top of the
/// whole days still remaining before `current_end`. A zero or negative
/// `duration` never extends and yields a date at or before `today`.
#[must_use]
pub fn new_end_date(
    today: NaiveDate,
    current_end: NaiveDate,
    duration: i64,
    extend_existing: bool,
) -> NaiveDate {
    let mut days = duration;
    if duration > 0 && extend_existing {
        let remaining = (current_end - today).num_days();
        if remaining > 0 {
            days = days.saturating_add(remaining);
        }
    }
    add_days(today, days)
}

/// Adds a signed number of days, saturating at the calendar bounds.
pub(crate) fn add_days(date: NaiveDate, days: i64) -> NaiveDate {
    let magnitude = Days::new(days.unsigned_abs());
    let shifted = if days >= 0 {
        date.checked_add_days(magnitude)
    } else {
        date.checked_sub_days(magnitude)
    };
    shifted.unwrap_or(if days >= 0 {
        NaiveDate::MAX
    } else {
        NaiveDate::MIN
    })
}
