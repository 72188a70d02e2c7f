//! Calendar-day helpers.
//!
//! Every "day difference" in the engines is an integer subtraction of
//! [`NaiveDate`]s. Timestamps are only turned into days through a single
//! reference offset, so daylight-saving shifts never change a day count.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

use crate::error::ValidationError;

/// Whole calendar days from `from` to `to` (negative when `to` is earlier).
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// The calendar day `at` falls on in the reference timezone.
pub fn calendar_day(at: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    at.with_timezone(&offset).date_naive()
}

/// Build the reference offset from minutes east of UTC.
///
/// # Errors
/// Returns a validation error if the offset is outside +/- 24h.
pub fn reference_offset(utc_offset_minutes: i32) -> Result<FixedOffset, ValidationError> {
    utc_offset_minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| {
            ValidationError::invalid_value(
                "calendar.utc_offset_minutes",
                format!("{utc_offset_minutes} is outside -1439..=1439"),
            )
        })
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(value: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|e| {
        ValidationError::invalid_value("date", format!("'{value}' is not YYYY-MM-DD: {e}"))
    })
}
