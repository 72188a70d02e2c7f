//! Recurrence engine.
//!
//! Computes next-occurrence dates from a [`RecurrencePattern`] and decides
//! when a recurring record materializes its successor. Recurrence is always
//! forward-only: completing or sweeping a record produces the next
//! occurrence(s) up to a bound, never a batch of future ones.
//!
//! - [`task`]: successor generation when a recurring task is completed
//! - [`transaction`]: the sweep that materializes due recurring transactions

pub mod task;
pub mod transaction;

use std::fmt;
use std::str::FromStr;

use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// How often a recurring record repeats.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Biweekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub const ALL: [Frequency; 5] = [
        Frequency::Daily,
        Frequency::Weekly,
        Frequency::Biweekly,
        Frequency::Monthly,
        Frequency::Yearly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Biweekly => "biweekly",
            Frequency::Monthly => "monthly",
            Frequency::Yearly => "yearly",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Frequency::ALL
            .into_iter()
            .find(|f| f.as_str() == wanted)
            .ok_or_else(|| ValidationError::UnknownFrequency(s.to_string()))
    }
}

/// A validated recurrence rule: frequency, interval and optional inclusive end date.
///
/// The only ways to obtain one are [`RecurrencePattern::new`] and
/// deserialization, both of which reject `interval < 1` and unknown
/// frequencies, so date math never sees an invalid pattern.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", try_from = "RawRecurrencePattern")]
pub struct RecurrencePattern {
    frequency: Frequency,
    interval: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_date: Option<NaiveDate>,
}

/// Wire shape accepted before validation.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecurrencePattern {
    frequency: String,
    #[serde(default = "default_interval")]
    interval: i64,
    #[serde(default)]
    end_date: Option<NaiveDate>,
}

fn default_interval() -> i64 {
    1
}

impl TryFrom<RawRecurrencePattern> for RecurrencePattern {
    type Error = ValidationError;

    fn try_from(raw: RawRecurrencePattern) -> Result<Self, Self::Error> {
        let frequency = raw.frequency.parse()?;
        RecurrencePattern::new(frequency, raw.interval, raw.end_date)
    }
}

impl RecurrencePattern {
    /// Build a pattern, failing fast on `interval < 1`.
    pub fn new(
        frequency: Frequency,
        interval: i64,
        end_date: Option<NaiveDate>,
    ) -> Result<Self, ValidationError> {
        let interval = u32::try_from(interval)
            .ok()
            .filter(|i| *i >= 1)
            .ok_or(ValidationError::InvalidInterval(interval))?;
        Ok(Self {
            frequency,
            interval,
            end_date,
        })
    }

    /// Shorthand for an unbounded pattern with interval 1.
    pub fn every(frequency: Frequency) -> Self {
        Self {
            frequency,
            interval: 1,
            end_date: None,
        }
    }

    pub fn with_end_date(mut self, end_date: Option<NaiveDate>) -> Self {
        self.end_date = end_date;
        self
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        self.end_date
    }

    /// Whether an occurrence on `date` is still inside the inclusive end bound.
    pub fn allows(&self, date: NaiveDate) -> bool {
        self.end_date.map_or(true, |end| date <= end)
    }

    /// The occurrence after `current` (see [`compute_next_date`]).
    pub fn next_after(&self, current: NaiveDate) -> Result<NaiveDate, ValidationError> {
        compute_next_date(current, self)
    }
}

/// Advance `current` by `pattern.interval` units of `pattern.frequency`.
///
/// Monthly and yearly steps keep the day of month, clamped to the last day of
/// a shorter target month (Jan 31 + 1 month = Feb 28/29, Feb 29 + 1 year =
/// Feb 28 in a non-leap year).
///
/// # Errors
/// Returns [`ValidationError::DateOutOfRange`] if the result leaves chrono's
/// representable range.
pub fn compute_next_date(
    current: NaiveDate,
    pattern: &RecurrencePattern,
) -> Result<NaiveDate, ValidationError> {
    let n = pattern.interval;
    let next = match pattern.frequency {
        Frequency::Daily => current.checked_add_days(Days::new(u64::from(n))),
        Frequency::Weekly => current.checked_add_days(Days::new(u64::from(n) * 7)),
        Frequency::Biweekly => current.checked_add_days(Days::new(u64::from(n) * 14)),
        Frequency::Monthly => current.checked_add_months(Months::new(n)),
        Frequency::Yearly => n
            .checked_mul(12)
            .and_then(|months| current.checked_add_months(Months::new(months))),
    };
    next.ok_or_else(|| ValidationError::DateOutOfRange {
        date: current,
        amount: format!("{n} x {}", pattern.frequency),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn pattern(frequency: Frequency, interval: i64) -> RecurrencePattern {
        RecurrencePattern::new(frequency, interval, None).unwrap()
    }

    #[test]
    fn daily_weekly_biweekly_steps() {
        let start = date(2024, 12, 30);
        assert_eq!(
            compute_next_date(start, &pattern(Frequency::Daily, 3)).unwrap(),
            date(2025, 1, 2)
        );
        assert_eq!(
            compute_next_date(start, &pattern(Frequency::Weekly, 1)).unwrap(),
            date(2025, 1, 6)
        );
        assert_eq!(
            compute_next_date(start, &pattern(Frequency::Weekly, 2)).unwrap(),
            date(2025, 1, 13)
        );
        assert_eq!(
            compute_next_date(start, &pattern(Frequency::Biweekly, 1)).unwrap(),
            date(2025, 1, 13)
        );
        assert_eq!(
            compute_next_date(start, &pattern(Frequency::Biweekly, 2)).unwrap(),
            date(2025, 1, 27)
        );
    }

    #[test]
    fn monthly_clamps_to_month_end() {
        let monthly = pattern(Frequency::Monthly, 1);
        assert_eq!(compute_next_date(date(2024, 1, 31), &monthly).unwrap(), date(2024, 2, 29));
        assert_eq!(compute_next_date(date(2023, 1, 31), &monthly).unwrap(), date(2023, 2, 28));
        assert_eq!(compute_next_date(date(2024, 3, 31), &monthly).unwrap(), date(2024, 4, 30));
        assert_eq!(compute_next_date(date(2024, 11, 30), &monthly).unwrap(), date(2024, 12, 30));
    }

    #[test]
    fn monthly_interval_crosses_years() {
        let quarterly = pattern(Frequency::Monthly, 3);
        assert_eq!(compute_next_date(date(2024, 11, 30), &quarterly).unwrap(), date(2025, 2, 28));
        assert_eq!(
            compute_next_date(date(2024, 10, 15), &pattern(Frequency::Monthly, 14)).unwrap(),
            date(2025, 12, 15)
        );
    }

    #[test]
    fn yearly_leap_day_clamps() {
        let yearly = pattern(Frequency::Yearly, 1);
        assert_eq!(compute_next_date(date(2024, 2, 29), &yearly).unwrap(), date(2025, 2, 28));
        assert_eq!(
            compute_next_date(date(2024, 2, 29), &pattern(Frequency::Yearly, 4)).unwrap(),
            date(2028, 2, 29)
        );
        assert_eq!(compute_next_date(date(2023, 6, 1), &yearly).unwrap(), date(2024, 6, 1));
    }

    #[test]
    fn input_date_is_untouched() {
        let current = date(2024, 1, 31);
        let _ = compute_next_date(current, &pattern(Frequency::Monthly, 1)).unwrap();
        assert_eq!(current, date(2024, 1, 31));
    }

    #[test]
    fn non_positive_interval_is_rejected() {
        assert_eq!(
            RecurrencePattern::new(Frequency::Daily, 0, None),
            Err(ValidationError::InvalidInterval(0))
        );
        assert_eq!(
            RecurrencePattern::new(Frequency::Weekly, -2, None),
            Err(ValidationError::InvalidInterval(-2))
        );
    }

    #[test]
    fn overflow_is_reported() {
        let result = compute_next_date(NaiveDate::MAX, &pattern(Frequency::Daily, 1));
        assert!(matches!(result, Err(ValidationError::DateOutOfRange { .. })));
    }

    #[test]
    fn frequency_parses_case_insensitively() {
        assert_eq!("Monthly".parse::<Frequency>().unwrap(), Frequency::Monthly);
        assert_eq!(
            "fortnightly".parse::<Frequency>(),
            Err(ValidationError::UnknownFrequency("fortnightly".into()))
        );
    }

    #[test]
    fn deserialize_validates_pattern() {
        let ok: RecurrencePattern = serde_json::from_str(
            r#"{"frequency":"weekly","interval":2,"endDate":"2025-01-01"}"#,
        )
        .unwrap();
        assert_eq!(ok.interval(), 2);
        assert_eq!(ok.end_date(), Some(date(2025, 1, 1)));

        let defaulted: RecurrencePattern =
            serde_json::from_str(r#"{"frequency":"daily"}"#).unwrap();
        assert_eq!(defaulted.interval(), 1);

        let zero =
            serde_json::from_str::<RecurrencePattern>(r#"{"frequency":"daily","interval":0}"#);
        assert!(zero.unwrap_err().to_string().contains("interval"));

        let unknown = serde_json::from_str::<RecurrencePattern>(r#"{"frequency":"hourly"}"#);
        assert!(unknown.unwrap_err().to_string().contains("hourly"));
    }

    #[test]
    fn serializes_camel_case() {
        let p = RecurrencePattern::new(Frequency::Monthly, 1, Some(date(2024, 6, 30))).unwrap();
        let json = serde_json::to_value(p).unwrap();
        assert_eq!(json["frequency"], "monthly");
        assert_eq!(json["endDate"], "2024-06-30");
        let unbounded = serde_json::to_value(RecurrencePattern::every(Frequency::Daily)).unwrap();
        assert!(unbounded.get("endDate").is_none());
    }

    #[test]
    fn end_date_bound_is_inclusive() {
        let p = RecurrencePattern::every(Frequency::Daily).with_end_date(Some(date(2024, 5, 10)));
        assert!(p.allows(date(2024, 5, 10)));
        assert!(!p.allows(date(2024, 5, 11)));
        assert!(RecurrencePattern::every(Frequency::Daily).allows(NaiveDate::MAX));
    }
}
