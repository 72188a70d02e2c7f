use std::path::Path;

use clap::Subcommand;
use lifeboard_core::Config;
use serde_json::json;

use super::{load_engine, open_db, print_json, CmdResult};

#[derive(Subcommand)]
pub enum AchievementsAction {
    /// Unlocked achievements, newest last
    List,
    /// Every achievement in the catalog and whether it is unlocked
    Catalog,
}

pub fn run(db_path: Option<&Path>, action: AchievementsAction) -> CmdResult {
    let db = open_db(db_path)?;
    let config = Config::load()?;
    let engine = load_engine(&db, &config)?;

    match action {
        AchievementsAction::List => {
            // Types missing from the catalog are still listed, just without a title.
            let unlocked: Vec<_> = engine
                .state()
                .achievements
                .iter()
                .map(|a| {
                    let def = engine
                        .catalog()
                        .iter()
                        .find(|d| d.achievement_type == a.achievement_type);
                    json!({
                        "type": a.achievement_type,
                        "title": def.map(|d| d.title.as_str()),
                        "rarity": def.map(|d| d.rarity),
                        "unlockedAt": a.unlocked_at,
                        "data": a.data,
                    })
                })
                .collect();
            print_json(&unlocked)?;
        }
        AchievementsAction::Catalog => {
            let catalog: Vec<_> = engine
                .catalog()
                .iter()
                .map(|d| {
                    json!({
                        "definition": d,
                        "unlocked": engine.state().is_unlocked(&d.achievement_type),
                    })
                })
                .collect();
            print_json(&catalog)?;
        }
    }
    Ok(())
}
