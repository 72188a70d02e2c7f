//! Habit completions driving the gamification engine end to end.

use chrono::{Duration, NaiveDate};
use lifeboard_core::gamification::{GamificationEngine, StreakChange, StreakData};
use lifeboard_core::habit::{complete_habit, Habit, HabitCompletion};
use lifeboard_core::storage::store::{self, EntityFilter, EntityKind, EntityStore};
use lifeboard_core::{CoreError, Database, Event};
use proptest::prelude::*;
use serde_json::{json, Value};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn habit(db: &Database, name: &str) -> Habit {
    store::create(db, EntityKind::Habit, &Habit::new(name)).unwrap()
}

fn completions(db: &Database) -> Vec<HabitCompletion> {
    store::list(db, EntityKind::HabitCompletion, &EntityFilter::all()).unwrap()
}

/// Delegates to a real database but cannot list every habit completion, so
/// the achievement snapshot fails while the same-day check still works.
struct FailingCompletionScan<'a> {
    inner: &'a Database,
}

impl EntityStore for FailingCompletionScan<'_> {
    fn load_entity(&self, kind: EntityKind, id: &str) -> lifeboard_core::Result<Option<Value>> {
        self.inner.load_entity(kind, id)
    }

    fn list_entities(
        &self,
        kind: EntityKind,
        filter: &EntityFilter,
    ) -> lifeboard_core::Result<Vec<Value>> {
        if kind == EntityKind::HabitCompletion && *filter == EntityFilter::all() {
            return Err(CoreError::Custom("connection reset".into()));
        }
        self.inner.list_entities(kind, filter)
    }

    fn create_entity(&self, kind: EntityKind, fields: Value) -> lifeboard_core::Result<Value> {
        self.inner.create_entity(kind, fields)
    }

    fn update_entity(
        &self,
        kind: EntityKind,
        id: &str,
        partial: Value,
    ) -> lifeboard_core::Result<Value> {
        self.inner.update_entity(kind, id, partial)
    }

    fn delete_entity(&self, kind: EntityKind, id: &str) -> lifeboard_core::Result<()> {
        self.inner.delete_entity(kind, id)
    }
}

#[test]
fn first_completion_unlocks_first_habit_and_perfect_day() {
    let db = Database::open_memory().unwrap();
    let read = habit(&db, "Read");
    let mut engine = GamificationEngine::default();

    let outcome = complete_habit(&db, &mut engine, &read.id, date(2024, 5, 1)).unwrap();
    assert!(!outcome.already_completed);
    assert_eq!(outcome.unlocked, ["first_habit", "perfect_day"]);
    assert_eq!(outcome.streak.unwrap().current_streak, 1);

    let stats = engine.stats();
    assert_eq!(stats.habits_completed, 1);
    // 10 for the habit, 50 per unlock
    assert_eq!(stats.total_xp, 110);
    assert_eq!(stats.level, 2);
}

#[test]
fn same_day_completion_is_a_no_op() {
    let db = Database::open_memory().unwrap();
    let read = habit(&db, "Read");
    let mut engine = GamificationEngine::default();

    complete_habit(&db, &mut engine, &read.id, date(2024, 5, 1)).unwrap();
    let before = engine.state().clone();
    engine.drain_events();

    let again = complete_habit(&db, &mut engine, &read.id, date(2024, 5, 1)).unwrap();
    assert!(again.already_completed);
    assert!(again.unlocked.is_empty());
    assert_eq!(engine.state(), &before);
    assert!(engine.drain_events().is_empty());

    let completions: Vec<HabitCompletion> =
        store::list(&db, EntityKind::HabitCompletion, &EntityFilter::all()).unwrap();
    assert_eq!(completions.len(), 1);
}

#[test]
fn perfect_day_needs_every_active_habit() {
    let db = Database::open_memory().unwrap();
    let read = habit(&db, "Read");
    let run = habit(&db, "Run");
    let paused = habit(&db, "Paused");
    db.update_entity(EntityKind::Habit, &paused.id, json!({"isActive": false}))
        .unwrap();
    let mut engine = GamificationEngine::default();

    let first = complete_habit(&db, &mut engine, &read.id, date(2024, 5, 1)).unwrap();
    assert_eq!(first.unlocked, ["first_habit"]);
    assert_eq!(first.context.unwrap().active_habits, 2);
    assert_eq!(first.context.unwrap().completed_today, 1);

    let second = complete_habit(&db, &mut engine, &run.id, date(2024, 5, 1)).unwrap();
    assert_eq!(second.unlocked, ["perfect_day"]);
}

#[test]
fn inactive_or_unknown_habits_are_rejected() {
    let db = Database::open_memory().unwrap();
    let paused = habit(&db, "Paused");
    db.update_entity(EntityKind::Habit, &paused.id, json!({"isActive": false}))
        .unwrap();
    let mut engine = GamificationEngine::default();

    assert!(matches!(
        complete_habit(&db, &mut engine, &paused.id, date(2024, 5, 1)),
        Err(CoreError::Validation(_))
    ));
    assert!(matches!(
        complete_habit(&db, &mut engine, "ghost", date(2024, 5, 1)),
        Err(CoreError::NotFound { .. })
    ));
    assert_eq!(engine.stats().habits_completed, 0);
}

#[test]
fn seven_perfect_days_unlock_perfect_week() {
    let db = Database::open_memory().unwrap();
    let read = habit(&db, "Read");
    let mut engine = GamificationEngine::default();
    let start = date(2024, 2, 25);

    let mut unlocked = Vec::new();
    for i in 0..7 {
        let day = start + Duration::days(i);
        let outcome = complete_habit(&db, &mut engine, &read.id, day).unwrap();
        unlocked.extend(outcome.unlocked);
    }

    assert_eq!(
        unlocked,
        ["first_habit", "perfect_day", "streak_3", "streak_7", "perfect_week"]
    );
    let stats = engine.stats();
    assert_eq!(stats.current_streak, 7);
    assert_eq!(stats.longest_streak, 7);
    assert_eq!(stats.total_xp, 7 * 10 + 5 * 50);
    assert_eq!(stats.level, 3);
}

#[test]
fn gap_resets_streak_but_keeps_longest() {
    let db = Database::open_memory().unwrap();
    let read = habit(&db, "Read");
    let mut engine = GamificationEngine::default();

    for d in [1, 2, 3, 5] {
        complete_habit(&db, &mut engine, &read.id, date(2024, 5, d)).unwrap();
    }
    let streak = engine.state().streak(&read.id).unwrap();
    assert_eq!(streak.current_streak, 1);
    assert_eq!(streak.longest_streak, 3);

    let changes: Vec<StreakChange> = engine
        .drain_events()
        .into_iter()
        .filter_map(|e| match e {
            Event::StreakUpdated { change, .. } => Some(change),
            _ => None,
        })
        .collect();
    assert_eq!(
        changes,
        [
            StreakChange::Started,
            StreakChange::Extended,
            StreakChange::Extended,
            StreakChange::Reset
        ]
    );
}

#[test]
fn engine_state_survives_database_round_trip() {
    let db = Database::open_memory().unwrap();
    let read = habit(&db, "Read");

    let mut engine = GamificationEngine::new(db.load_gamification_state().unwrap());
    complete_habit(&db, &mut engine, &read.id, date(2024, 5, 1)).unwrap();
    db.save_gamification_state(engine.state()).unwrap();

    let mut reloaded = GamificationEngine::new(db.load_gamification_state().unwrap());
    assert_eq!(reloaded.state(), engine.state());
    let outcome = complete_habit(&db, &mut reloaded, &read.id, date(2024, 5, 2)).unwrap();
    assert!(!outcome.unlocked.contains(&"first_habit".to_string()));
    assert_eq!(reloaded.stats().current_streak, 2);
}

#[test]
fn failed_snapshot_leaves_no_completion_and_can_be_retried() {
    let db = Database::open_memory().unwrap();
    let read = habit(&db, "Read");
    let mut engine = GamificationEngine::default();
    let flaky = FailingCompletionScan { inner: &db };

    let err = complete_habit(&flaky, &mut engine, &read.id, date(2024, 5, 1)).unwrap_err();
    assert!(err.to_string().contains("connection reset"));
    assert!(completions(&db).is_empty());
    assert_eq!(engine.state(), GamificationEngine::default().state());
    assert!(engine.drain_events().is_empty());

    let outcome = complete_habit(&db, &mut engine, &read.id, date(2024, 5, 1)).unwrap();
    assert!(!outcome.already_completed);
    assert_eq!(engine.stats().habits_completed, 1);
    assert_eq!(engine.stats().total_xp, 110);
}

#[test]
fn failed_state_save_rolls_back_completion() {
    let db = Database::open_memory().unwrap();
    let read = habit(&db, "Read");
    let mut engine = GamificationEngine::new(db.load_gamification_state().unwrap());

    let result: lifeboard_core::Result<()> = store::atomically(&db, || {
        complete_habit(&db, &mut engine, &read.id, date(2024, 5, 1))?;
        Err(CoreError::Custom("state save failed".into()))
    });
    assert!(result.is_err());
    assert!(completions(&db).is_empty());

    // Retry from the persisted state, as a fresh process would.
    let mut engine = GamificationEngine::new(db.load_gamification_state().unwrap());
    let outcome = store::atomically(&db, || {
        let outcome = complete_habit(&db, &mut engine, &read.id, date(2024, 5, 1))?;
        db.save_gamification_state(engine.state())?;
        Ok(outcome)
    })
    .unwrap();
    assert!(!outcome.already_completed);
    assert_eq!(db.load_gamification_state().unwrap().stats.habits_completed, 1);
    assert_eq!(completions(&db).len(), 1);
}

fn any_streak() -> impl Strategy<Value = StreakData> {
    (0u32..50, 0u32..50, prop::option::of(0i64..30)).prop_map(|(current, extra, offset)| {
        StreakData {
            habit_id: "h".into(),
            current_streak: current,
            longest_streak: current + extra,
            last_completed_date: offset.map(|o| date(2024, 1, 1) + Duration::days(o)),
        }
    })
}

proptest! {
    #[test]
    fn streak_merge_is_commutative(a in any_streak(), b in any_streak()) {
        prop_assert_eq!(a.merge(&b), b.merge(&a));
    }

    #[test]
    fn streak_merge_keeps_invariant(a in any_streak(), b in any_streak()) {
        let merged = a.merge(&b);
        prop_assert!(merged.longest_streak >= merged.current_streak);
        prop_assert!(merged.longest_streak >= a.longest_streak.max(b.longest_streak));
    }

    #[test]
    fn level_never_decreases_as_xp_grows(awards in prop::collection::vec(0u64..5_000, 1..40)) {
        let mut engine = GamificationEngine::default();
        let mut last = engine.stats().level;
        for amount in awards {
            let level = engine.add_xp(amount);
            prop_assert!(level >= last);
            prop_assert_eq!(level, engine.curve().level_for_xp(engine.stats().total_xp));
            last = level;
        }
    }
}
