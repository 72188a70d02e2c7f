//! SQLite-backed entity storage.
//!
//! Provides persistent storage for:
//! - Entity records (tasks, transactions, habits, habit completions), one
//!   JSON document per row
//! - Key-value store for application state, including the gamification
//!   snapshot

use std::path::Path;

use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use super::data_dir;
use super::migrations;
use super::store::{expect_object, EntityFilter, EntityKind, EntityStore};
use crate::error::{CoreError, DatabaseError, Result};
use crate::gamification::GamificationState;

const GAMIFICATION_STATE_KEY: &str = "gamification_state";

/// Savepoints nest, so units opened inside another unit join it.
const UNIT_SAVEPOINT: &str = "lifeboard_unit";

/// SQLite database implementing [`EntityStore`].
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `~/.config/lifeboard/lifeboard.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("lifeboard.db");
        Self::open_at(&path)
    }

    /// Open (or create) the database file at `path`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        debug!(path = %path.display(), "database opened");
        Ok(db)
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        migrations::migrate(&self.conn)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(())
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.kv_get(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn kv_set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.kv_set(key, &serde_json::to_string(value)?)?;
        Ok(())
    }

    /// Load the persisted gamification snapshot, or a fresh one.
    pub fn load_gamification_state(&self) -> Result<GamificationState> {
        Ok(self
            .kv_get_json(GAMIFICATION_STATE_KEY)?
            .unwrap_or_default())
    }

    pub fn save_gamification_state(&self, state: &GamificationState) -> Result<()> {
        self.kv_set_json(GAMIFICATION_STATE_KEY, state)
    }

    fn decode(kind: EntityKind, id: &str, data: &str) -> Result<Value> {
        let value: Value = serde_json::from_str(data).map_err(|e| DatabaseError::CorruptRecord {
            kind: kind.to_string(),
            id: id.to_string(),
            message: e.to_string(),
        })?;
        if !value.is_object() {
            return Err(DatabaseError::CorruptRecord {
                kind: kind.to_string(),
                id: id.to_string(),
                message: "stored document is not a JSON object".into(),
            }
            .into());
        }
        Ok(value)
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl EntityStore for Database {
    fn load_entity(&self, kind: EntityKind, id: &str) -> Result<Option<Value>> {
        let data = self
            .conn
            .query_row(
                "SELECT data FROM entities WHERE kind = ?1 AND id = ?2",
                params![kind.as_str(), id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        data.map(|d| Self::decode(kind, id, &d)).transpose()
    }

    fn list_entities(&self, kind: EntityKind, filter: &EntityFilter) -> Result<Vec<Value>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, data FROM entities
             WHERE kind = ?1
             ORDER BY created_at, rowid",
        )?;
        let rows = stmt.query_map(params![kind.as_str()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, data) = row?;
            let value = Self::decode(kind, &id, &data)?;
            if filter.matches(&value) {
                out.push(value);
            }
        }
        Ok(out)
    }

    fn create_entity(&self, kind: EntityKind, fields: Value) -> Result<Value> {
        let mut record = expect_object("fields", fields)?;
        let id = record
            .get("id")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let now = timestamp();

        record.insert("id".into(), Value::String(id.clone()));
        record.insert("createdAt".into(), Value::String(now.clone()));
        record.insert("updatedAt".into(), Value::String(now.clone()));
        let record = Value::Object(record);

        self.conn.execute(
            "INSERT INTO entities (kind, id, data, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![kind.as_str(), id, serde_json::to_string(&record)?, now],
        )?;
        debug!(%kind, id = %id, "entity created");
        Ok(record)
    }

    fn update_entity(&self, kind: EntityKind, id: &str, partial: Value) -> Result<Value> {
        let partial = expect_object("partial", partial)?;
        let existing = self
            .load_entity(kind, id)?
            .ok_or_else(|| CoreError::not_found(kind, id))?;
        let mut record = expect_object("record", existing)?;

        for (key, value) in partial {
            if key == "id" || key == "createdAt" {
                continue;
            }
            record.insert(key, value);
        }
        let now = timestamp();
        record.insert("updatedAt".into(), Value::String(now.clone()));
        let record = Value::Object(record);

        self.conn.execute(
            "UPDATE entities SET data = ?3, updated_at = ?4 WHERE kind = ?1 AND id = ?2",
            params![kind.as_str(), id, serde_json::to_string(&record)?, now],
        )?;
        debug!(%kind, id, "entity updated");
        Ok(record)
    }

    fn delete_entity(&self, kind: EntityKind, id: &str) -> Result<()> {
        let removed = self.conn.execute(
            "DELETE FROM entities WHERE kind = ?1 AND id = ?2",
            params![kind.as_str(), id],
        )?;
        if removed == 0 {
            return Err(CoreError::not_found(kind, id));
        }
        debug!(%kind, id, "entity deleted");
        Ok(())
    }

    fn begin(&self) -> Result<()> {
        self.conn.execute_batch(&format!("SAVEPOINT {UNIT_SAVEPOINT}"))?;
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        self.conn.execute_batch(&format!("RELEASE {UNIT_SAVEPOINT}"))?;
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        self.conn
            .execute_batch(&format!("ROLLBACK TO {UNIT_SAVEPOINT}; RELEASE {UNIT_SAVEPOINT}"))?;
        debug!("unit of writes rolled back");
        Ok(())
    }
}
