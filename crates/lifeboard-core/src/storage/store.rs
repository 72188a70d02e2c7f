//! Generic persistence collaborator.
//!
//! Entities are camelCase JSON objects keyed by an opaque string id. The
//! store assigns `id`, `createdAt` and `updatedAt`; the engines only see the
//! records and never user identity.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::error::{CoreError, Result, ValidationError};

/// Kinds of records the application persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Task,
    Transaction,
    Habit,
    HabitCompletion,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Task => "task",
            EntityKind::Transaction => "transaction",
            EntityKind::Habit => "habit",
            EntityKind::HabitCompletion => "habit_completion",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level field equality filter. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityFilter {
    equals: Vec<(String, Value)>,
}

impl EntityFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn field_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.equals.push((field.into(), value.into()));
        self
    }

    pub fn matches(&self, record: &Value) -> bool {
        self.equals
            .iter()
            .all(|(field, expected)| record.get(field) == Some(expected))
    }
}

/// CRUD over entity records.
pub trait EntityStore {
    /// Load one record, `None` if it does not exist.
    fn load_entity(&self, kind: EntityKind, id: &str) -> Result<Option<Value>>;

    /// All records of `kind` matching `filter`, oldest first.
    fn list_entities(&self, kind: EntityKind, filter: &EntityFilter) -> Result<Vec<Value>>;

    /// Insert a record, assigning `id` (unless one is supplied) and timestamps.
    fn create_entity(&self, kind: EntityKind, fields: Value) -> Result<Value>;

    /// Shallow-merge `partial` into an existing record and refresh `updatedAt`.
    fn update_entity(&self, kind: EntityKind, id: &str, partial: Value) -> Result<Value>;

    fn delete_entity(&self, kind: EntityKind, id: &str) -> Result<()>;

    /// Open a unit of writes closed by [`commit`](Self::commit) or
    /// [`rollback`](Self::rollback). Units may nest.
    ///
    /// Stores without transactions keep the no-op defaults.
    fn begin(&self) -> Result<()> {
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        Ok(())
    }
}

/// Require a JSON object, as every entity record is one.
pub(crate) fn expect_object(
    field: &str,
    value: Value,
) -> Result<serde_json::Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(ValidationError::invalid_value(
            field,
            format!("expected a JSON object, got {other}"),
        )
        .into()),
    }
}

/// Run `work` as one unit of writes: committed if it succeeds, rolled back
/// if it fails.
///
/// # Errors
/// Returns the error of `work`, or of the commit.
pub fn atomically<T, S, F>(store: &S, work: F) -> Result<T>
where
    S: EntityStore + ?Sized,
    F: FnOnce() -> Result<T>,
{
    store.begin()?;
    match work() {
        Ok(value) => {
            store.commit()?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = store.rollback() {
                warn!(error = %rollback, "rollback failed");
            }
            Err(e)
        }
    }
}

/// Load and decode a typed record.
pub fn load<T, S>(store: &S, kind: EntityKind, id: &str) -> Result<Option<T>>
where
    T: DeserializeOwned,
    S: EntityStore + ?Sized,
{
    store
        .load_entity(kind, id)?
        .map(|v| serde_json::from_value(v).map_err(CoreError::from))
        .transpose()
}

/// Load a typed record or fail with [`CoreError::NotFound`].
pub fn get<T, S>(store: &S, kind: EntityKind, id: &str) -> Result<T>
where
    T: DeserializeOwned,
    S: EntityStore + ?Sized,
{
    load(store, kind, id)?.ok_or_else(|| CoreError::not_found(kind, id))
}

pub fn list<T, S>(store: &S, kind: EntityKind, filter: &EntityFilter) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    S: EntityStore + ?Sized,
{
    store
        .list_entities(kind, filter)?
        .into_iter()
        .map(|v| serde_json::from_value(v).map_err(CoreError::from))
        .collect()
}

/// Persist a typed record and decode what the store returned.
pub fn create<T, S>(store: &S, kind: EntityKind, record: &T) -> Result<T>
where
    T: Serialize + DeserializeOwned,
    S: EntityStore + ?Sized,
{
    let created = store.create_entity(kind, serde_json::to_value(record)?)?;
    Ok(serde_json::from_value(created)?)
}

pub fn update<T, S>(store: &S, kind: EntityKind, id: &str, partial: Value) -> Result<T>
where
    T: DeserializeOwned,
    S: EntityStore + ?Sized,
{
    let updated = store.update_entity(kind, id, partial)?;
    Ok(serde_json::from_value(updated)?)
}
