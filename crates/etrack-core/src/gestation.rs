//! Gestation date arithmetic.
//!
//! All gestation math is anchored on the FIV lot opening date (D0), not on
//! the transfer date itself.

use chrono::{Duration, NaiveDate};

/// Bovine gestation length used for the expected due date.
pub const GESTATION_DAYS: i64 = 275;

/// Expected due date: D0 + 275 days.
pub fn due_date(reference: NaiveDate) -> NaiveDate {
    reference + Duration::days(GESTATION_DAYS)
}

/// Days of gestation elapsed on a given day.
pub fn days_pregnant(reference: NaiveDate, on: NaiveDate) -> i64 {
    (on - reference).num_days()
}
