mod config;
pub mod database;
pub mod migrations;
pub mod store;

pub use config::{CalendarConfig, Config, LevelsConfig, RewardsConfig};
pub use database::Database;
pub use store::{EntityFilter, EntityKind, EntityStore};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns `~/.config/lifeboard[-dev]/` based on LIFEBOARD_ENV.
///
/// Set LIFEBOARD_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if the directory cannot be created.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("LIFEBOARD_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("lifeboard-dev")
    } else {
        base_dir.join("lifeboard")
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
