//! Gamification engine.
//!
//! Holds accumulated XP, the derived level, per-habit streaks and unlocked
//! achievements for one user. The state is a plain value ([`GamificationState`])
//! owned by a [`GamificationEngine`]; the caller loads it, applies events,
//! and persists it again. Nothing here touches storage.
//!
//! Achievement checking is never automatic. Callers apply a completion
//! (counter, XP, streak) first and then call
//! [`GamificationEngine::check_achievements`] against the resulting state.

pub mod achievement;
pub mod level;
pub mod streak;

pub use achievement::{
    default_catalog, Achievement, AchievementContext, AchievementDefinition, Rarity, Requirement,
    RequirementKind,
};
pub use level::{LevelCurve, LevelOverflow};
pub use streak::{StreakChange, StreakData};

use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::events::{Event, XpReason};

/// XP granted per event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XpRewards {
    pub habit_completed: u64,
    pub task_completed: u64,
    pub achievement_unlocked: u64,
}

impl Default for XpRewards {
    fn default() -> Self {
        Self {
            habit_completed: 10,
            task_completed: 15,
            achievement_unlocked: 50,
        }
    }
}

/// User-level counters. `current_streak` and `longest_streak` are the maxima
/// across all habits, never separately tracked values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_xp: u64,
    pub level: u32,
    pub habits_completed: u64,
    pub tasks_completed: u64,
    pub current_streak: u32,
    pub longest_streak: u32,
}

impl Default for UserStats {
    fn default() -> Self {
        Self {
            total_xp: 0,
            level: 1,
            habits_completed: 0,
            tasks_completed: 0,
            current_streak: 0,
            longest_streak: 0,
        }
    }
}

/// Everything the engine mutates, as one serializable snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GamificationState {
    #[serde(default)]
    pub stats: UserStats,
    #[serde(default)]
    pub streaks: BTreeMap<String, StreakData>,
    #[serde(default)]
    pub achievements: Vec<Achievement>,
}

impl GamificationState {
    pub fn is_unlocked(&self, achievement_type: &str) -> bool {
        self.achievements
            .iter()
            .any(|a| a.achievement_type == achievement_type)
    }

    pub fn streak(&self, habit_id: &str) -> Option<&StreakData> {
        self.streaks.get(habit_id)
    }
}

/// Applies gamification events to a [`GamificationState`].
#[derive(Debug, Clone)]
pub struct GamificationEngine {
    state: GamificationState,
    curve: LevelCurve,
    rewards: XpRewards,
    catalog: Vec<AchievementDefinition>,
    events: Vec<Event>,
}

impl GamificationEngine {
    /// Wrap a state with the standard curve, rewards and catalog.
    pub fn new(state: GamificationState) -> Self {
        Self {
            state,
            curve: LevelCurve::standard(),
            rewards: XpRewards::default(),
            catalog: default_catalog(),
            events: Vec::new(),
        }
    }

    /// Replace the level curve. The stored level is re-derived from XP.
    pub fn with_curve(mut self, curve: LevelCurve) -> Self {
        self.state.stats.level = curve.level_for_xp(self.state.stats.total_xp);
        self.curve = curve;
        self
    }

    pub fn with_rewards(mut self, rewards: XpRewards) -> Self {
        self.rewards = rewards;
        self
    }

    pub fn with_catalog(mut self, catalog: Vec<AchievementDefinition>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn state(&self) -> &GamificationState {
        &self.state
    }

    pub fn into_state(self) -> GamificationState {
        self.state
    }

    pub fn stats(&self) -> &UserStats {
        &self.state.stats
    }

    pub fn curve(&self) -> &LevelCurve {
        &self.curve
    }

    pub fn catalog(&self) -> &[AchievementDefinition] {
        &self.catalog
    }

    /// Take all events queued since the last drain.
    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Award XP and re-derive the level. Returns the new level.
    pub fn add_xp(&mut self, amount: u64) -> u32 {
        self.award(amount, XpReason::Manual)
    }

    fn award(&mut self, amount: u64, reason: XpReason) -> u32 {
        let stats = &mut self.state.stats;
        let before = stats.level;
        stats.total_xp = stats.total_xp.saturating_add(amount);
        stats.level = self.curve.level_for_xp(stats.total_xp);

        let now = Utc::now();
        self.events.push(Event::XpAwarded {
            amount,
            reason,
            total_xp: stats.total_xp,
            at: now,
        });
        if stats.level != before {
            info!(from = before, to = stats.level, "level changed");
            self.events.push(Event::LevelChanged {
                from: before,
                to: stats.level,
                at: now,
            });
        }
        stats.level
    }

    /// Count one qualifying habit completion and award its XP.
    ///
    /// The caller must invoke this once per completion event; toggling a
    /// habit off and on again is not detected here.
    pub fn increment_habits_completed(&mut self) {
        self.state.stats.habits_completed += 1;
        self.award(self.rewards.habit_completed, XpReason::HabitCompleted);
    }

    /// Count one task completion and award its XP.
    pub fn increment_tasks_completed(&mut self) {
        self.state.stats.tasks_completed += 1;
        self.award(self.rewards.task_completed, XpReason::TaskCompleted);
    }

    /// Record a completion of `habit_id` on `date` and refresh user-level streaks.
    pub fn update_streak(&mut self, habit_id: &str, date: NaiveDate) -> StreakChange {
        let streak = self
            .state
            .streaks
            .entry(habit_id.to_string())
            .or_insert_with(|| StreakData::new(habit_id));
        let change = streak.record(date);
        debug!(
            habit_id,
            %date,
            ?change,
            current = streak.current_streak,
            longest = streak.longest_streak,
            "streak updated"
        );
        self.events.push(Event::StreakUpdated {
            habit_id: habit_id.to_string(),
            date,
            change,
            current_streak: streak.current_streak,
            longest_streak: streak.longest_streak,
            at: Utc::now(),
        });
        self.refresh_streak_totals();
        change
    }

    /// Fold a concurrently written copy of a habit's streak into the state.
    pub fn merge_streak(&mut self, remote: StreakData) -> &StreakData {
        let merged = match self.state.streaks.get(&remote.habit_id) {
            Some(local) => local.merge(&remote),
            None => remote,
        };
        let habit_id = merged.habit_id.clone();
        self.state.streaks.insert(habit_id.clone(), merged);
        self.refresh_streak_totals();
        &self.state.streaks[&habit_id]
    }

    fn refresh_streak_totals(&mut self) {
        let stats = &mut self.state.stats;
        stats.current_streak = self
            .state
            .streaks
            .values()
            .map(|s| s.current_streak)
            .max()
            .unwrap_or(0);
        stats.longest_streak = self
            .state
            .streaks
            .values()
            .map(|s| s.longest_streak)
            .max()
            .unwrap_or(0);
    }

    /// Unlock `achievement_type` once. Returns false if it was already unlocked.
    pub fn unlock_achievement(&mut self, achievement_type: &str) -> bool {
        self.unlock_achievement_with(achievement_type, None)
    }

    /// Like [`unlock_achievement`](Self::unlock_achievement), attaching a payload.
    pub fn unlock_achievement_with(
        &mut self,
        achievement_type: &str,
        data: Option<serde_json::Value>,
    ) -> bool {
        if self.state.is_unlocked(achievement_type) {
            debug!(achievement_type, "achievement already unlocked");
            return false;
        }

        let now = Utc::now();
        self.state.achievements.push(Achievement {
            id: uuid::Uuid::new_v4().to_string(),
            achievement_type: achievement_type.to_string(),
            unlocked_at: now,
            data,
        });
        info!(achievement_type, "achievement unlocked");
        self.events.push(Event::AchievementUnlocked {
            achievement_type: achievement_type.to_string(),
            at: now,
        });
        self.award(self.rewards.achievement_unlocked, XpReason::AchievementUnlocked);
        true
    }

    /// Build an evaluation snapshot from the current state plus habit context.
    pub fn snapshot(
        &self,
        active_habits: u32,
        completed_today: u32,
        trailing_perfect_days: u32,
    ) -> AchievementContext {
        let stats = &self.state.stats;
        AchievementContext {
            habits_completed: stats.habits_completed,
            tasks_completed: stats.tasks_completed,
            current_streak: stats.current_streak,
            longest_streak: stats.longest_streak,
            level: stats.level,
            active_habits,
            completed_today,
            trailing_perfect_days,
        }
    }

    /// Unlock every catalog entry newly satisfied by `ctx`, in catalog order.
    ///
    /// Returns the types unlocked by this call; a repeat call on the same
    /// state returns nothing.
    pub fn check_achievements(&mut self, ctx: &AchievementContext) -> Vec<String> {
        let satisfied: Vec<String> = self
            .catalog
            .iter()
            .filter(|def| !self.state.is_unlocked(&def.achievement_type))
            .filter(|def| def.requirement.is_satisfied(ctx))
            .map(|def| def.achievement_type.clone())
            .collect();

        satisfied
            .into_iter()
            .filter(|t| self.unlock_achievement(t))
            .collect()
    }
}

impl Default for GamificationEngine {
    fn default() -> Self {
        Self::new(GamificationState::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn fresh_state_is_level_one() {
        let engine = GamificationEngine::default();
        assert_eq!(engine.stats().level, 1);
        assert_eq!(engine.stats().total_xp, 0);
    }

    #[test]
    fn add_xp_recomputes_level() {
        let mut engine = GamificationEngine::default();
        assert_eq!(engine.add_xp(99), 1);
        assert_eq!(engine.add_xp(1), 2);
        assert_eq!(engine.add_xp(0), 2);
        assert_eq!(engine.stats().total_xp, 100);

        let events = engine.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::LevelChanged { from: 1, to: 2, .. })));
        assert!(engine.drain_events().is_empty());
    }

    #[test]
    fn completions_award_fixed_xp() {
        let mut engine = GamificationEngine::default();
        engine.increment_habits_completed();
        engine.increment_tasks_completed();
        assert_eq!(engine.stats().habits_completed, 1);
        assert_eq!(engine.stats().tasks_completed, 1);
        assert_eq!(engine.stats().total_xp, 25);
    }

    #[test]
    fn custom_rewards_apply() {
        let mut engine = GamificationEngine::default().with_rewards(XpRewards {
            habit_completed: 1,
            task_completed: 2,
            achievement_unlocked: 3,
        });
        engine.increment_habits_completed();
        engine.unlock_achievement("first_habit");
        assert_eq!(engine.stats().total_xp, 4);
    }

    #[test]
    fn streak_totals_are_max_across_habits() {
        let mut engine = GamificationEngine::default();
        engine.update_streak("a", date(2024, 5, 1));
        engine.update_streak("a", date(2024, 5, 2));
        engine.update_streak("a", date(2024, 5, 3));
        engine.update_streak("b", date(2024, 5, 3));
        assert_eq!(engine.stats().current_streak, 3);
        assert_eq!(engine.stats().longest_streak, 3);

        engine.update_streak("a", date(2024, 5, 6));
        engine.update_streak("b", date(2024, 5, 4));
        assert_eq!(engine.stats().current_streak, 2);
        assert_eq!(engine.stats().longest_streak, 3);
    }

    #[test]
    fn streak_sequence_one_two_then_reset() {
        let mut engine = GamificationEngine::default();
        let d = date(2024, 7, 1);
        engine.update_streak("h", d);
        assert_eq!(engine.update_streak("h", date(2024, 7, 2)), StreakChange::Extended);
        assert_eq!(engine.state().streak("h").unwrap().current_streak, 2);

        let mut other = GamificationEngine::default();
        other.update_streak("h", d);
        assert_eq!(other.update_streak("h", date(2024, 7, 4)), StreakChange::Reset);
        assert_eq!(other.state().streak("h").unwrap().current_streak, 1);
    }

    #[test]
    fn unlock_is_idempotent() {
        let mut engine = GamificationEngine::default();
        assert!(engine.unlock_achievement("streak_7"));
        assert!(!engine.unlock_achievement("streak_7"));
        assert_eq!(engine.state().achievements.len(), 1);
        assert_eq!(engine.stats().total_xp, 50);
    }

    #[test]
    fn check_achievements_first_habit_once() {
        let mut engine = GamificationEngine::default();
        engine.increment_habits_completed();
        let ctx = engine.snapshot(0, 0, 0);
        assert_eq!(engine.check_achievements(&ctx), vec!["first_habit".to_string()]);
        assert!(engine.check_achievements(&ctx).is_empty());
        assert_eq!(engine.stats().total_xp, 60);
    }

    #[test]
    fn check_achievements_follows_catalog_order() {
        let mut engine = GamificationEngine::default();
        let ctx = AchievementContext {
            habits_completed: 10,
            tasks_completed: 1,
            current_streak: 3,
            longest_streak: 3,
            level: 5,
            active_habits: 1,
            completed_today: 1,
            trailing_perfect_days: 1,
        };
        assert_eq!(
            engine.check_achievements(&ctx),
            vec!["first_habit", "first_task", "habits_10", "streak_3", "level_5", "perfect_day"]
        );
    }

    #[test]
    fn merge_streak_updates_totals() {
        let mut engine = GamificationEngine::default();
        engine.update_streak("h", date(2024, 5, 1));
        let merged = engine
            .merge_streak(StreakData {
                habit_id: "h".into(),
                current_streak: 4,
                longest_streak: 6,
                last_completed_date: Some(date(2024, 5, 2)),
            })
            .clone();
        assert_eq!(merged.current_streak, 4);
        assert_eq!(engine.stats().longest_streak, 6);
    }

    #[test]
    fn with_curve_rederives_level() {
        let mut state = GamificationState::default();
        state.stats.total_xp = 30_000;
        state.stats.level = 20;
        let engine = GamificationEngine::new(state)
            .with_curve(LevelCurve::standard().with_overflow(LevelOverflow::Capped));
        assert_eq!(engine.stats().level, 20);
        let linear =
            GamificationEngine::new(engine.into_state()).with_curve(LevelCurve::standard());
        assert_eq!(linear.stats().level, 22);
    }

    #[test]
    fn state_round_trips_through_json() {
        let mut engine = GamificationEngine::default();
        engine.update_streak("h", date(2024, 5, 1));
        engine.unlock_achievement("first_habit");
        let json = serde_json::to_string(engine.state()).unwrap();
        assert!(json.contains("\"totalXp\""));
        let back: GamificationState = serde_json::from_str(&json).unwrap();
        assert_eq!(&back, engine.state());
    }
}
