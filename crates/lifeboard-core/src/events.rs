use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::gamification::streak::StreakChange;

/// Why XP was awarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XpReason {
    HabitCompleted,
    TaskCompleted,
    AchievementUnlocked,
    Manual,
}

/// Every gamification state change produces an Event.
/// The engine queues them; callers drain the queue after each operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    XpAwarded {
        amount: u64,
        reason: XpReason,
        total_xp: u64,
        at: DateTime<Utc>,
    },
    LevelChanged {
        from: u32,
        to: u32,
        at: DateTime<Utc>,
    },
    StreakUpdated {
        habit_id: String,
        date: NaiveDate,
        change: StreakChange,
        current_streak: u32,
        longest_streak: u32,
        at: DateTime<Utc>,
    },
    AchievementUnlocked {
        achievement_type: String,
        at: DateTime<Utc>,
    },
}
