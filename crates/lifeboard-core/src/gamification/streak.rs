//! Per-habit completion streaks.
//!
//! A streak counts consecutive calendar days. Days are compared with
//! [`days_between`], so the rule is the same in every timezone and across
//! daylight-saving changes.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calendar::days_between;

/// Streak state for one habit.
///
/// Invariant: `longest_streak >= current_streak`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakData {
    pub habit_id: String,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_completed_date: Option<NaiveDate>,
}

/// How a completion on a given date changed the streak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakChange {
    /// First completion ever recorded for the habit
    Started,
    /// Same calendar day as the last completion
    Unchanged,
    /// Exactly one day after the last completion
    Extended,
    /// Any other gap, including a date before the last completion
    Reset,
}

impl StreakData {
    pub fn new(habit_id: impl Into<String>) -> Self {
        Self {
            habit_id: habit_id.into(),
            current_streak: 0,
            longest_streak: 0,
            last_completed_date: None,
        }
    }

    /// Apply a completion on `date`.
    pub fn record(&mut self, date: NaiveDate) -> StreakChange {
        let change = match self.last_completed_date {
            None => StreakChange::Started,
            Some(last) => match days_between(last, date) {
                0 => StreakChange::Unchanged,
                1 => StreakChange::Extended,
                _ => StreakChange::Reset,
            },
        };

        match change {
            StreakChange::Unchanged => {}
            StreakChange::Extended => {
                self.current_streak = self.current_streak.saturating_add(1);
                self.last_completed_date = Some(date);
            }
            StreakChange::Started | StreakChange::Reset => {
                self.current_streak = 1;
                self.last_completed_date = Some(date);
            }
        }
        self.longest_streak = self.longest_streak.max(self.current_streak);
        change
    }

    /// Reconcile two copies of the same habit's streak (max-merge).
    ///
    /// The copy with the later `last_completed_date` supplies the current
    /// streak; equal dates keep the larger current streak. The longest streak
    /// is the max of both. The result does not depend on argument order.
    pub fn merge(&self, other: &StreakData) -> StreakData {
        let newer = match (self.last_completed_date, other.last_completed_date) {
            (Some(a), Some(b)) if a != b => {
                if a > b {
                    self
                } else {
                    other
                }
            }
            (Some(_), None) => self,
            (None, Some(_)) => other,
            _ => {
                if self.current_streak >= other.current_streak {
                    self
                } else {
                    other
                }
            }
        };

        StreakData {
            habit_id: self.habit_id.clone(),
            current_streak: newer.current_streak,
            longest_streak: self
                .longest_streak
                .max(other.longest_streak)
                .max(newer.current_streak),
            last_completed_date: newer.last_completed_date,
        }
    }
}
