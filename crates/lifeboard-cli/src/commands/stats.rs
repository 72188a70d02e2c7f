use std::path::Path;

use clap::Subcommand;
use lifeboard_core::Config;
use serde_json::json;

use super::{load_engine, open_db, print_json, CmdResult};

#[derive(Subcommand)]
pub enum StatsAction {
    /// Show XP, level, progress and streaks
    Show,
}

pub fn run(db_path: Option<&Path>, action: StatsAction) -> CmdResult {
    let db = open_db(db_path)?;
    let config = Config::load()?;
    let engine = load_engine(&db, &config)?;

    match action {
        StatsAction::Show => {
            let stats = engine.stats();
            let curve = engine.curve();
            let level_start = curve.threshold(stats.level).unwrap_or(0);
            let next_level_at = curve.xp_for_next_level(stats.level);

            print_json(&json!({
                "stats": stats,
                "levelStartXp": level_start,
                "nextLevelXp": next_level_at,
                "xpToNextLevel": next_level_at.saturating_sub(stats.total_xp),
                "streaks": engine.state().streaks,
            }))?;
        }
    }
    Ok(())
}
