//! Task management commands for CLI.

use std::path::Path;

use chrono::Utc;
use clap::Subcommand;
use lifeboard_core::habit::achievement_context;
use lifeboard_core::recurrence::task::{
    complete_task, create_successor, next_occurrence, NextOccurrence, Priority, Task, TaskStatus,
};
use lifeboard_core::storage::store::{self, EntityFilter, EntityKind};
use lifeboard_core::{Config, CoreError, SuccessorOutcome};
use serde_json::json;

use super::{
    date_or_today, load_engine, open_db, parse_optional_date, print_json, recurrence_from_args,
    save_engine, split_list, CmdResult,
};

#[derive(Subcommand)]
pub enum TaskAction {
    /// Create a new task
    Create {
        /// Task title
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,
        /// Repeat: daily, weekly, biweekly, monthly or yearly (requires --due)
        #[arg(long)]
        every: Option<String>,
        /// Units of --every between occurrences
        #[arg(long, default_value_t = 1)]
        interval: i64,
        /// Last date an occurrence may fall on (YYYY-MM-DD)
        #[arg(long)]
        until: Option<String>,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
        /// low, medium, high or urgent
        #[arg(long, default_value = "medium")]
        priority: String,
        #[arg(long)]
        project_id: Option<String>,
        #[arg(long)]
        area_id: Option<String>,
        #[arg(long)]
        estimated_minutes: Option<u32>,
    },
    /// List tasks
    List {
        /// Filter by status (pending, in_progress, done)
        #[arg(long)]
        status: Option<String>,
    },
    /// Mark a task done; recurring tasks get their next occurrence
    Complete {
        /// Task ID
        id: String,
    },
    /// Create the missing next occurrence of a completed recurring task
    RetrySuccessor {
        /// ID of the completed task
        id: String,
    },
}

fn parse_priority(value: &str) -> Result<Priority, CoreError> {
    Ok(serde_json::from_value(json!(value.to_lowercase()))?)
}

pub fn run(db_path: Option<&Path>, action: TaskAction) -> CmdResult {
    let db = open_db(db_path)?;

    match action {
        TaskAction::Create {
            title,
            description,
            due,
            every,
            interval,
            until,
            tags,
            priority,
            project_id,
            area_id,
            estimated_minutes,
        } => {
            let recurrence = recurrence_from_args(every.as_deref(), interval, until.as_deref())?;
            let due_date = parse_optional_date(due.as_deref())?;
            if recurrence.is_some() && due_date.is_none() {
                return Err("--every requires --due".into());
            }

            let mut task = Task::new(title);
            task.description = description;
            task.due_date = due_date;
            task.recurrence = recurrence;
            task.tags = split_list(tags);
            task.priority = parse_priority(&priority)?;
            task.project_id = project_id;
            task.area_id = area_id;
            task.estimated_minutes = estimated_minutes;

            let created: Task = store::create(&db, EntityKind::Task, &task)?;
            print_json(&created)?;
        }
        TaskAction::List { status } => {
            let mut filter = EntityFilter::all();
            if let Some(status) = status {
                let status: TaskStatus = serde_json::from_value(json!(status))?;
                filter = filter.field_eq("status", json!(status));
            }
            let tasks: Vec<Task> = store::list(&db, EntityKind::Task, &filter)?;
            print_json(&tasks)?;
        }
        TaskAction::Complete { id } => {
            let config = Config::load()?;
            let today = date_or_today(None, &config)?;
            let mut engine = load_engine(&db, &config)?;

            // The done transition and the XP it earns commit together.
            let (completion, unlocked) = store::atomically(&db, || {
                let completion = complete_task(&db, &id, Utc::now())?;
                engine.increment_tasks_completed();
                let context = achievement_context(&db, &engine, today)?;
                let unlocked = engine.check_achievements(&context);
                save_engine(&db, &mut engine)?;
                Ok((completion, unlocked))
            })?;

            if let SuccessorOutcome::Failed { error, .. } = &completion.successor {
                tracing::warn!(task_id = %id, %error, "run `task retry-successor` to try again");
            }
            print_json(&json!({
                "task": completion.task,
                "successor": completion.successor,
                "unlocked": unlocked,
                "stats": engine.stats(),
            }))?;
        }
        TaskAction::RetrySuccessor { id } => {
            let task: Task = store::get(&db, EntityKind::Task, &id)?;
            if task.status != TaskStatus::Done {
                return Err(format!("task '{id}' is not done").into());
            }
            let pending = match next_occurrence(&task)? {
                NextOccurrence::Successor(pending) => pending,
                NextOccurrence::NotRecurring => {
                    return Err(format!("task '{id}' does not recur").into())
                }
                NextOccurrence::Ended { next_due, end_date } => {
                    return Err(
                        format!("recurrence ended: next due {next_due} is after {end_date}").into(),
                    )
                }
            };

            let existing: Vec<Task> = store::list(
                &db,
                EntityKind::Task,
                &EntityFilter::all()
                    .field_eq("title", pending.title.as_str())
                    .field_eq("dueDate", json!(pending.due_date)),
            )?;
            let successor = match existing.into_iter().next() {
                Some(found) => found,
                None => create_successor(&db, &pending)?,
            };
            print_json(&successor)?;
        }
    }
    Ok(())
}
