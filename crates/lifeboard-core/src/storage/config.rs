//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - XP granted per completion and per unlocked achievement
//! - What the level curve does past its last threshold
//! - The reference timezone that decides "today" and day boundaries
//!
//! Configuration is stored at `~/.config/lifeboard/config.toml`.

use std::path::{Path, PathBuf};

use chrono::{FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::data_dir;
use crate::calendar;
use crate::error::{ConfigError, ValidationError};
use crate::gamification::{LevelCurve, LevelOverflow, XpRewards};

/// XP reward configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardsConfig {
    #[serde(default = "default_habit_xp")]
    pub habit_completed: u64,
    #[serde(default = "default_task_xp")]
    pub task_completed: u64,
    #[serde(default = "default_achievement_xp")]
    pub achievement_unlocked: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelsConfig {
    #[serde(default)]
    pub overflow: LevelOverflow,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// Offset of the reference timezone from UTC, in minutes.
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/lifeboard/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rewards: RewardsConfig,
    #[serde(default)]
    pub levels: LevelsConfig,
    #[serde(default)]
    pub calendar: CalendarConfig,
}

fn default_habit_xp() -> u64 {
    XpRewards::default().habit_completed
}
fn default_task_xp() -> u64 {
    XpRewards::default().task_completed
}
fn default_achievement_xp() -> u64 {
    XpRewards::default().achievement_unlocked
}

impl Default for RewardsConfig {
    fn default() -> Self {
        Self {
            habit_completed: default_habit_xp(),
            task_completed: default_task_xp(),
            achievement_unlocked: default_achievement_xp(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(root: &'a Value, key: &str) -> Option<&'a Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(root: &mut Value, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let unknown = || ConfigError::UnknownKey(key.to_string());

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    Value::Bool(_) => Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(e.to_string()))?,
                    ),
                    Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<i64>() {
                            Value::Number(n.into())
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as integer")));
                        }
                    }
                    Value::Object(_) | Value::Array(_) => {
                        return Err(invalid("not a leaf setting".into()));
                    }
                    _ => Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the data directory, writing defaults out if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing defaults there if it is missing.
    ///
    /// # Errors
    /// See [`Config::load`].
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a leaf value by dot-separated key. Does not save.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not fit the
    /// setting. The config is unchanged on error.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.reference_offset()
            .map_err(|e| ConfigError::InvalidValue {
                key: "calendar.utc_offset_minutes".into(),
                message: e.to_string(),
            })
            .map(|_| ())
    }

    pub fn xp_rewards(&self) -> XpRewards {
        XpRewards {
            habit_completed: self.rewards.habit_completed,
            task_completed: self.rewards.task_completed,
            achievement_unlocked: self.rewards.achievement_unlocked,
        }
    }

    pub fn level_curve(&self) -> LevelCurve {
        LevelCurve::standard().with_overflow(self.levels.overflow)
    }

    pub fn reference_offset(&self) -> Result<FixedOffset, ValidationError> {
        calendar::reference_offset(self.calendar.utc_offset_minutes)
    }

    /// Current calendar date in the reference timezone.
    pub fn today(&self) -> Result<NaiveDate, ValidationError> {
        Ok(calendar::calendar_day(Utc::now(), self.reference_offset()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
        assert_eq!(parsed.rewards.habit_completed, 10);
        assert_eq!(parsed.levels.overflow, LevelOverflow::Linear);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: Config = toml::from_str("[rewards]\ntask_completed = 40\n").unwrap();
        assert_eq!(parsed.rewards.task_completed, 40);
        assert_eq!(parsed.rewards.habit_completed, 10);
        assert_eq!(parsed.calendar.utc_offset_minutes, 0);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("rewards.task_completed").as_deref(), Some("15"));
        assert_eq!(cfg.get("levels.overflow").as_deref(), Some("linear"));
        assert!(cfg.get("rewards.missing").is_none());
        assert!(cfg.get("").is_none());
    }

    #[test]
    fn set_value_updates_typed_fields() {
        let mut cfg = Config::default();
        cfg.set_value("rewards.habit_completed", "25").unwrap();
        cfg.set_value("levels.overflow", "capped").unwrap();
        cfg.set_value("calendar.utc_offset_minutes", "-300").unwrap();

        assert_eq!(cfg.xp_rewards().habit_completed, 25);
        assert_eq!(cfg.level_curve().overflow(), LevelOverflow::Capped);
        assert_eq!(cfg.reference_offset().unwrap().local_minus_utc(), -300 * 60);
    }

    #[test]
    fn set_value_rejects_bad_input_without_changes() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set_value("rewards.nonexistent", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(
            cfg.set_value("rewards.habit_completed", "lots"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            cfg.set_value("levels.overflow", "exponential"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            cfg.set_value("calendar.utc_offset_minutes", "100000"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(cfg.set_value("rewards", "1").is_err());
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn load_from_writes_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg, Config::default());
        assert!(path.exists());

        let mut changed = cfg.clone();
        changed.set_value("rewards.task_completed", "30").unwrap();
        changed.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().rewards.task_completed, 30);
    }

    #[test]
    fn load_from_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "rewards = 3").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::LoadFailed { .. })
        ));
    }
}
