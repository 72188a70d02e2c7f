use std::path::Path;

use clap::Subcommand;
use lifeboard_core::habit::{complete_habit, Habit};
use lifeboard_core::storage::store::{self, EntityFilter, EntityKind};
use lifeboard_core::Config;
use serde_json::json;

use super::{date_or_today, load_engine, open_db, print_json, save_engine, CmdResult};

#[derive(Subcommand)]
pub enum HabitAction {
    /// Create a new habit
    Create {
        /// Habit name
        name: String,
    },
    /// List habits
    List {
        /// Include inactive habits
        #[arg(long)]
        all: bool,
    },
    /// Complete a habit for a day
    Complete {
        /// Habit ID
        id: String,
        /// Completion date (YYYY-MM-DD, default: today)
        #[arg(long)]
        date: Option<String>,
    },
}

pub fn run(db_path: Option<&Path>, action: HabitAction) -> CmdResult {
    let db = open_db(db_path)?;

    match action {
        HabitAction::Create { name } => {
            let created: Habit = store::create(&db, EntityKind::Habit, &Habit::new(name))?;
            print_json(&created)?;
        }
        HabitAction::List { all } => {
            let filter = if all {
                EntityFilter::all()
            } else {
                EntityFilter::all().field_eq("isActive", true)
            };
            let habits: Vec<Habit> = store::list(&db, EntityKind::Habit, &filter)?;
            print_json(&habits)?;
        }
        HabitAction::Complete { id, date } => {
            let config = Config::load()?;
            let date = date_or_today(date.as_deref(), &config)?;

            let mut engine = load_engine(&db, &config)?;
            let outcome = store::atomically(&db, || {
                let outcome = complete_habit(&db, &mut engine, &id, date)?;
                save_engine(&db, &mut engine)?;
                Ok(outcome)
            })?;

            print_json(&json!({
                "completion": outcome,
                "stats": engine.stats(),
            }))?;
        }
    }
    Ok(())
}
