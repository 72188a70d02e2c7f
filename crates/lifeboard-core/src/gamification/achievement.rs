//! Achievement catalog and requirement evaluation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Display rarity of an achievement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

/// What a requirement measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementKind {
    FirstHabit,
    FirstTask,
    HabitsCompleted,
    TasksCompleted,
    Streak,
    Level,
    PerfectDay,
    PerfectWeek,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requirement {
    pub kind: RequirementKind,
    #[serde(default)]
    pub threshold: u64,
}

/// Snapshot evaluated by the achievement checker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementContext {
    pub habits_completed: u64,
    pub tasks_completed: u64,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub level: u32,
    /// Habits currently active
    pub active_habits: u32,
    /// Active habits completed on the evaluation day
    pub completed_today: u32,
    /// Consecutive days, ending on the evaluation day, on which every active
    /// habit was completed
    pub trailing_perfect_days: u32,
}

impl Requirement {
    pub const fn new(kind: RequirementKind, threshold: u64) -> Self {
        Self { kind, threshold }
    }

    pub fn is_satisfied(&self, ctx: &AchievementContext) -> bool {
        match self.kind {
            RequirementKind::FirstHabit => ctx.habits_completed >= 1,
            RequirementKind::FirstTask => ctx.tasks_completed >= 1,
            RequirementKind::HabitsCompleted => ctx.habits_completed >= self.threshold,
            RequirementKind::TasksCompleted => ctx.tasks_completed >= self.threshold,
            RequirementKind::Streak => {
                u64::from(ctx.current_streak) >= self.threshold
                    || u64::from(ctx.longest_streak) >= self.threshold
            }
            RequirementKind::Level => u64::from(ctx.level) >= self.threshold,
            RequirementKind::PerfectDay => {
                ctx.active_habits > 0 && ctx.completed_today == ctx.active_habits
            }
            RequirementKind::PerfectWeek => {
                ctx.active_habits > 0 && u64::from(ctx.trailing_perfect_days) >= self.threshold
            }
        }
    }
}

/// Static catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementDefinition {
    #[serde(rename = "type")]
    pub achievement_type: String,
    pub title: String,
    pub description: String,
    pub requirement: Requirement,
    pub xp_reward: u64,
    pub rarity: Rarity,
}

/// An unlocked achievement. At most one exists per `achievement_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: String,
    #[serde(rename = "type")]
    pub achievement_type: String,
    pub unlocked_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

fn definition(
    achievement_type: &str,
    title: &str,
    description: &str,
    requirement: Requirement,
    xp_reward: u64,
    rarity: Rarity,
) -> AchievementDefinition {
    AchievementDefinition {
        achievement_type: achievement_type.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        requirement,
        xp_reward,
        rarity,
    }
}

/// The built-in catalog, in evaluation order.
pub fn default_catalog() -> Vec<AchievementDefinition> {
    use Rarity::*;
    use RequirementKind::*;

    vec![
        definition(
            "first_habit",
            "First Step",
            "Complete your first habit",
            Requirement::new(FirstHabit, 1),
            50,
            Common,
        ),
        definition(
            "first_task",
            "Getting Things Done",
            "Complete your first task",
            Requirement::new(FirstTask, 1),
            50,
            Common,
        ),
        definition(
            "habits_10",
            "Habit Builder",
            "Complete 10 habits",
            Requirement::new(HabitsCompleted, 10),
            50,
            Common,
        ),
        definition(
            "habits_50",
            "Habit Master",
            "Complete 50 habits",
            Requirement::new(HabitsCompleted, 50),
            50,
            Rare,
        ),
        definition(
            "habits_100",
            "Centurion",
            "Complete 100 habits",
            Requirement::new(HabitsCompleted, 100),
            50,
            Epic,
        ),
        definition(
            "tasks_10",
            "Task Tackler",
            "Complete 10 tasks",
            Requirement::new(TasksCompleted, 10),
            50,
            Common,
        ),
        definition(
            "tasks_50",
            "Productivity Pro",
            "Complete 50 tasks",
            Requirement::new(TasksCompleted, 50),
            50,
            Rare,
        ),
        definition(
            "tasks_100",
            "Unstoppable",
            "Complete 100 tasks",
            Requirement::new(TasksCompleted, 100),
            50,
            Epic,
        ),
        definition(
            "streak_3",
            "On a Roll",
            "Reach a 3-day streak",
            Requirement::new(Streak, 3),
            50,
            Common,
        ),
        definition(
            "streak_7",
            "Week Warrior",
            "Reach a 7-day streak",
            Requirement::new(Streak, 7),
            50,
            Rare,
        ),
        definition(
            "streak_30",
            "Monthly Devotion",
            "Reach a 30-day streak",
            Requirement::new(Streak, 30),
            50,
            Epic,
        ),
        definition(
            "streak_100",
            "Legendary Consistency",
            "Reach a 100-day streak",
            Requirement::new(Streak, 100),
            50,
            Legendary,
        ),
        definition(
            "level_5",
            "Rising Star",
            "Reach level 5",
            Requirement::new(Level, 5),
            50,
            Common,
        ),
        definition(
            "level_10",
            "Seasoned",
            "Reach level 10",
            Requirement::new(Level, 10),
            50,
            Rare,
        ),
        definition(
            "level_20",
            "Grandmaster",
            "Reach level 20",
            Requirement::new(Level, 20),
            50,
            Legendary,
        ),
        definition(
            "perfect_day",
            "Perfect Day",
            "Complete every active habit in one day",
            Requirement::new(PerfectDay, 1),
            50,
            Rare,
        ),
        definition(
            "perfect_week",
            "Perfect Week",
            "Complete every active habit for 7 days in a row",
            Requirement::new(PerfectWeek, 7),
            50,
            Epic,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn satisfied(kind: RequirementKind, threshold: u64, ctx: AchievementContext) -> bool {
        Requirement::new(kind, threshold).is_satisfied(&ctx)
    }

    #[test]
    fn catalog_types_are_unique() {
        let catalog = default_catalog();
        let types: HashSet<_> = catalog.iter().map(|d| d.achievement_type.as_str()).collect();
        assert_eq!(types.len(), catalog.len());
        assert_eq!(catalog[0].achievement_type, "first_habit");
    }

    #[test]
    fn counter_requirements() {
        let ctx = AchievementContext {
            habits_completed: 10,
            tasks_completed: 0,
            ..Default::default()
        };
        assert!(satisfied(RequirementKind::FirstHabit, 1, ctx));
        assert!(!satisfied(RequirementKind::FirstTask, 1, ctx));
        assert!(satisfied(RequirementKind::HabitsCompleted, 10, ctx));
        assert!(!satisfied(RequirementKind::HabitsCompleted, 11, ctx));
    }

    #[test]
    fn streak_uses_current_or_longest() {
        let ctx = AchievementContext {
            current_streak: 1,
            longest_streak: 7,
            ..Default::default()
        };
        assert!(satisfied(RequirementKind::Streak, 7, ctx));
        assert!(!satisfied(RequirementKind::Streak, 8, ctx));
    }

    #[test]
    fn perfect_day_needs_active_habits() {
        let none_active = AchievementContext::default();
        assert!(!satisfied(RequirementKind::PerfectDay, 1, none_active));

        let partial = AchievementContext {
            active_habits: 3,
            completed_today: 2,
            ..Default::default()
        };
        assert!(!satisfied(RequirementKind::PerfectDay, 1, partial));

        let all = AchievementContext {
            active_habits: 3,
            completed_today: 3,
            ..Default::default()
        };
        assert!(satisfied(RequirementKind::PerfectDay, 1, all));
    }

    #[test]
    fn perfect_week_counts_trailing_days() {
        let six = AchievementContext {
            active_habits: 2,
            completed_today: 2,
            trailing_perfect_days: 6,
            ..Default::default()
        };
        assert!(!satisfied(RequirementKind::PerfectWeek, 7, six));
        let seven = AchievementContext {
            trailing_perfect_days: 7,
            ..six
        };
        assert!(satisfied(RequirementKind::PerfectWeek, 7, seven));
    }

    #[test]
    fn definition_serializes_type_key() {
        let json = serde_json::to_value(&default_catalog()[8]).unwrap();
        assert_eq!(json["type"], "streak_3");
        assert_eq!(json["requirement"]["kind"], "streak");
        assert_eq!(json["xpReward"], 50);
    }
}
