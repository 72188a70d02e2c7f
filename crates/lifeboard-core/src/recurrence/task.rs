//! Recurring tasks: completion and successor generation.
//!
//! Completing a recurring task materializes exactly one successor, due one
//! recurrence step after the completed task's due date, unless that date is
//! past the pattern's end date. The completed task itself never recurs again.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use super::RecurrencePattern;
use crate::error::{Result, ValidationError};
use crate::storage::store::{self, EntityKind, EntityStore};

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Done,
}

impl TaskStatus {
    /// Done tasks can only be reopened; completing twice is rejected.
    pub fn can_transition_to(&self, to: &TaskStatus) -> bool {
        match self {
            TaskStatus::Pending => matches!(to, TaskStatus::InProgress | TaskStatus::Done),
            TaskStatus::InProgress => matches!(to, TaskStatus::Pending | TaskStatus::Done),
            TaskStatus::Done => matches!(to, TaskStatus::Pending),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subtask {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub done: bool,
}

/// A task record as stored by the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Assigned by the store; empty until persisted
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    #[serde(default)]
    pub area_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub estimated_minutes: Option<u32>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub recurrence: Option<RecurrencePattern>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(title: impl Into<String>) -> Self {
        Task {
            id: String::new(),
            title: title.into(),
            description: None,
            status: TaskStatus::Pending,
            priority: Priority::Medium,
            tags: Vec::new(),
            subtasks: Vec::new(),
            area_id: None,
            project_id: None,
            estimated_minutes: None,
            due_date: None,
            recurrence: None,
            completed_at: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn is_recurring(&self) -> bool {
        self.due_date.is_some() && self.recurrence.is_some()
    }

    /// Move to `status`, maintaining `completed_at`.
    pub fn transition_to(
        &mut self,
        status: TaskStatus,
        now: DateTime<Utc>,
    ) -> Result<(), TaskTransitionError> {
        if !self.status.can_transition_to(&status) {
            return Err(TaskTransitionError {
                task_id: self.id.clone(),
                from: self.status,
                to: status,
            });
        }
        self.completed_at = match status {
            TaskStatus::Done => Some(now),
            _ => None,
        };
        self.status = status;
        Ok(())
    }

    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), TaskTransitionError> {
        self.transition_to(TaskStatus::Done, now)
    }

    /// Copy carried into the next occurrence: same content and pattern,
    /// subtasks reset, pending, due on `due_date`.
    fn successor(&self, due_date: NaiveDate) -> Task {
        Task {
            id: String::new(),
            title: self.title.clone(),
            description: self.description.clone(),
            status: TaskStatus::Pending,
            priority: self.priority,
            tags: self.tags.clone(),
            subtasks: self
                .subtasks
                .iter()
                .map(|s| Subtask {
                    done: false,
                    ..s.clone()
                })
                .collect(),
            area_id: self.area_id.clone(),
            project_id: self.project_id.clone(),
            estimated_minutes: self.estimated_minutes,
            due_date: Some(due_date),
            recurrence: self.recurrence,
            completed_at: None,
            created_at: None,
            updated_at: None,
        }
    }
}

/// Error returned when an invalid status transition is attempted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskTransitionError {
    pub task_id: String,
    pub from: TaskStatus,
    pub to: TaskStatus,
}

impl std::fmt::Display for TaskTransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Invalid status transition for task '{}': {:?} → {:?}",
            self.task_id, self.from, self.to
        )
    }
}

impl std::error::Error for TaskTransitionError {}

/// What completing a task implies for its next occurrence.
#[derive(Debug, Clone, PartialEq)]
pub enum NextOccurrence {
    /// No due date or no recurrence pattern
    NotRecurring,
    /// The next date falls after the pattern's end date
    Ended {
        next_due: NaiveDate,
        end_date: NaiveDate,
    },
    /// An unsaved successor task
    Successor(Task),
}

/// Decide the next occurrence of a task being completed.
///
/// # Errors
/// Only if the next due date overflows the calendar.
pub fn next_occurrence(task: &Task) -> Result<NextOccurrence, ValidationError> {
    let (Some(due_date), Some(pattern)) = (task.due_date, task.recurrence.as_ref()) else {
        return Ok(NextOccurrence::NotRecurring);
    };

    let next_due = pattern.next_after(due_date)?;
    match pattern.end_date() {
        Some(end_date) if next_due > end_date => Ok(NextOccurrence::Ended { next_due, end_date }),
        _ => Ok(NextOccurrence::Successor(task.successor(next_due))),
    }
}

/// The unsaved successor of a completed task, if one should exist.
pub fn on_task_completed(task: &Task) -> Result<Option<Task>, ValidationError> {
    Ok(match next_occurrence(task)? {
        NextOccurrence::Successor(successor) => Some(successor),
        NextOccurrence::NotRecurring | NextOccurrence::Ended { .. } => None,
    })
}

/// Result of successor handling after a task was marked done.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SuccessorOutcome {
    NotRecurring,
    #[serde(rename_all = "camelCase")]
    Ended {
        next_due: NaiveDate,
        end_date: NaiveDate,
    },
    Created(Task),
    /// The successor could not be computed
    Invalid { error: String },
    /// The successor could not be persisted; retry with [`create_successor`]
    Failed { pending: Task, error: String },
}

/// A completed task and what happened to its successor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCompletion {
    pub task: Task,
    pub successor: SuccessorOutcome,
}

/// Mark a task done and materialize its successor.
///
/// The done transition is persisted first and stands on its own: if the
/// successor cannot be saved the call still succeeds, reporting
/// [`SuccessorOutcome::Failed`] with the pending successor.
///
/// # Errors
/// Fails if the task is missing, already done, or the done transition
/// itself cannot be persisted.
pub fn complete_task<S>(store: &S, task_id: &str, now: DateTime<Utc>) -> Result<TaskCompletion>
where
    S: EntityStore + ?Sized,
{
    let mut task: Task = store::get(store, EntityKind::Task, task_id)?;
    task.complete(now)?;
    let task: Task = store::update(
        store,
        EntityKind::Task,
        task_id,
        json!({ "status": task.status, "completedAt": task.completed_at }),
    )?;
    debug!(task_id, "task marked done");

    let successor = match next_occurrence(&task) {
        Ok(NextOccurrence::NotRecurring) => SuccessorOutcome::NotRecurring,
        Ok(NextOccurrence::Ended { next_due, end_date }) => {
            debug!(task_id, %next_due, %end_date, "recurrence ended");
            SuccessorOutcome::Ended { next_due, end_date }
        }
        Ok(NextOccurrence::Successor(pending)) => match create_successor(store, &pending) {
            Ok(created) => SuccessorOutcome::Created(created),
            Err(e) => {
                warn!(task_id, error = %e, "failed to persist successor task");
                SuccessorOutcome::Failed {
                    pending,
                    error: e.to_string(),
                }
            }
        },
        Err(e) => {
            warn!(task_id, error = %e, "cannot compute next occurrence");
            SuccessorOutcome::Invalid {
                error: e.to_string(),
            }
        }
    };

    Ok(TaskCompletion { task, successor })
}

/// Persist a pending successor (first attempt or retry).
pub fn create_successor<S>(store: &S, pending: &Task) -> Result<Task>
where
    S: EntityStore + ?Sized,
{
    let created: Task = store::create(store, EntityKind::Task, pending)?;
    info!(
        successor_id = %created.id,
        due_date = ?created.due_date,
        "successor task created"
    );
    Ok(created)
}
