//! Habit completion flow.
//!
//! Wires one habit completion into the gamification engine: counter and XP,
//! streak update, then an achievement check against the resulting state.
//! A habit counts at most once per calendar date. The completion record is
//! written only after everything else succeeded, so a failed completion can
//! simply be retried.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, ValidationError};
use crate::gamification::{AchievementContext, GamificationEngine, StreakData};
use crate::storage::store::{self, EntityFilter, EntityKind, EntityStore};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Habit {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

impl Habit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            is_active: true,
            created_at: None,
        }
    }
}

/// One habit done on one calendar date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitCompletion {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub habit_id: String,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitCompletionOutcome {
    pub habit_id: String,
    pub date: NaiveDate,
    /// The habit was already completed on `date`; nothing changed
    pub already_completed: bool,
    pub streak: Option<StreakData>,
    pub context: Option<AchievementContext>,
    pub unlocked: Vec<String>,
}

/// Complete `habit_id` on `date`.
///
/// # Errors
/// Fails if the habit does not exist or is inactive, or on storage errors.
pub fn complete_habit<S>(
    store: &S,
    engine: &mut GamificationEngine,
    habit_id: &str,
    date: NaiveDate,
) -> Result<HabitCompletionOutcome>
where
    S: EntityStore + ?Sized,
{
    let habit: Habit = store::get(store, EntityKind::Habit, habit_id)?;
    if !habit.is_active {
        return Err(ValidationError::invalid_value(
            "habitId",
            format!("habit '{habit_id}' is not active"),
        )
        .into());
    }

    let same_day = EntityFilter::all()
        .field_eq("habitId", habit_id)
        .field_eq("date", date.to_string());
    if !store.list_entities(EntityKind::HabitCompletion, &same_day)?.is_empty() {
        debug!(habit_id, %date, "habit already completed");
        return Ok(HabitCompletionOutcome {
            habit_id: habit_id.to_string(),
            date,
            already_completed: true,
            streak: engine.state().streak(habit_id).cloned(),
            context: None,
            unlocked: Vec::new(),
        });
    }

    let completion = HabitCompletion {
        id: String::new(),
        habit_id: habit_id.to_string(),
        date,
    };

    // Work on a copy so a failed read or write leaves the engine untouched.
    let mut next = engine.clone();
    next.increment_habits_completed();
    next.update_streak(habit_id, date);

    let context = context_with(store, &next, date, Some(&completion))?;
    let unlocked = next.check_achievements(&context);

    // The completion doubles as the same-day guard, so it is written last.
    store::create(store, EntityKind::HabitCompletion, &completion)?;
    *engine = next;
    if !unlocked.is_empty() {
        info!(habit_id, ?unlocked, "achievements unlocked");
    }

    Ok(HabitCompletionOutcome {
        habit_id: habit_id.to_string(),
        date,
        already_completed: false,
        streak: engine.state().streak(habit_id).cloned(),
        context: Some(context),
        unlocked,
    })
}

/// Build the achievement snapshot for `date` from stored habits and completions.
pub fn achievement_context<S>(
    store: &S,
    engine: &GamificationEngine,
    date: NaiveDate,
) -> Result<AchievementContext>
where
    S: EntityStore + ?Sized,
{
    context_with(store, engine, date, None)
}

/// Snapshot counting `pending` as if it were already stored.
fn context_with<S>(
    store: &S,
    engine: &GamificationEngine,
    date: NaiveDate,
    pending: Option<&HabitCompletion>,
) -> Result<AchievementContext>
where
    S: EntityStore + ?Sized,
{
    let active: BTreeSet<String> = store::list::<Habit, _>(
        store,
        EntityKind::Habit,
        &EntityFilter::all().field_eq("isActive", true),
    )?
    .into_iter()
    .map(|h| h.id)
    .collect();
    let mut completions: Vec<HabitCompletion> =
        store::list(store, EntityKind::HabitCompletion, &EntityFilter::all())?;
    completions.extend(pending.cloned());

    let by_date = index_by_date(&completions, &active);
    let completed_today = by_date.get(&date).map_or(0, HashSet::len);

    Ok(engine.snapshot(
        active.len() as u32,
        completed_today as u32,
        trailing_perfect_days(&completions, &active, date),
    ))
}

fn index_by_date<'a>(
    completions: &'a [HabitCompletion],
    active: &BTreeSet<String>,
) -> HashMap<NaiveDate, HashSet<&'a str>> {
    let mut by_date: HashMap<NaiveDate, HashSet<&str>> = HashMap::new();
    for c in completions.iter().filter(|c| active.contains(&c.habit_id)) {
        by_date.entry(c.date).or_default().insert(c.habit_id.as_str());
    }
    by_date
}

/// Consecutive days ending on `end` on which every habit in `active` was completed.
///
/// Judged against the current set of active habits.
pub fn trailing_perfect_days(
    completions: &[HabitCompletion],
    active: &BTreeSet<String>,
    end: NaiveDate,
) -> u32 {
    if active.is_empty() {
        return 0;
    }
    let by_date = index_by_date(completions, active);

    let mut count = 0;
    let mut day = Some(end);
    while let Some(d) = day {
        match by_date.get(&d) {
            Some(done) if done.len() == active.len() => {
                count += 1;
                day = d.pred_opt();
            }
            _ => break,
        }
    }
    count
}
