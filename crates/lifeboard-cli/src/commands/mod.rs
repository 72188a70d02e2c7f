pub mod achievements;
pub mod config;
pub mod habit;
pub mod stats;
pub mod task;
pub mod transaction;

use std::path::Path;

use chrono::NaiveDate;
use lifeboard_core::calendar::parse_date;
use lifeboard_core::recurrence::{Frequency, RecurrencePattern};
use lifeboard_core::{Config, CoreError, Database, GamificationEngine};
use serde::Serialize;

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Open the database at `path`, or the default location.
pub fn open_db(path: Option<&Path>) -> Result<Database, CoreError> {
    match path {
        Some(p) => Database::open_at(p),
        None => Database::open(),
    }
}

/// Load the persisted gamification state with the configured curve and rewards.
pub fn load_engine(db: &Database, config: &Config) -> Result<GamificationEngine, CoreError> {
    Ok(GamificationEngine::new(db.load_gamification_state()?)
        .with_curve(config.level_curve())
        .with_rewards(config.xp_rewards()))
}

/// Persist the engine state and log the events it queued.
pub fn save_engine(db: &Database, engine: &mut GamificationEngine) -> Result<(), CoreError> {
    for event in engine.drain_events() {
        tracing::debug!(?event, "gamification event");
    }
    db.save_gamification_state(engine.state())
}

pub fn print_json<T: Serialize>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// `--date` if given, otherwise today in the configured timezone.
pub fn date_or_today(date: Option<&str>, config: &Config) -> Result<NaiveDate, CoreError> {
    Ok(match date {
        Some(d) => parse_date(d)?,
        None => config.today()?,
    })
}

pub fn parse_optional_date(date: Option<&str>) -> Result<Option<NaiveDate>, CoreError> {
    Ok(date.map(parse_date).transpose()?)
}

/// Build a pattern from the shared `--every/--interval/--until` flags.
pub fn recurrence_from_args(
    every: Option<&str>,
    interval: i64,
    until: Option<&str>,
) -> Result<Option<RecurrencePattern>, CoreError> {
    let Some(every) = every else {
        return Ok(None);
    };
    let frequency: Frequency = every.parse()?;
    let end_date = parse_optional_date(until)?;
    Ok(Some(RecurrencePattern::new(frequency, interval, end_date)?))
}

/// Split a comma-separated flag value.
pub fn split_list(value: Option<String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}
