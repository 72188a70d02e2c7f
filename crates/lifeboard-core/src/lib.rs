//! # Lifeboard Core Library
//!
//! This library provides the core business logic for Lifeboard, a personal
//! productivity tracker for tasks, money and habits. All operations are
//! available through the standalone `lifeboard` CLI, which is a thin layer
//! over this crate.
//!
//! ## Architecture
//!
//! - **Recurrence Engine**: calendar-aware date advancement, successor tasks
//!   on completion, and the sweep that materializes due recurring transactions
//! - **Gamification Engine**: XP, levels, per-habit streaks and achievements
//!   over an explicit state value the caller persists
//! - **Storage**: SQLite entity store and TOML-based configuration
//!
//! ## Key Components
//!
//! - [`RecurrencePattern`]: validated frequency/interval/end-date triple
//! - [`GamificationEngine`]: applies completions and unlocks achievements
//! - [`EntityStore`]: persistence collaborator used by every flow
//! - [`Database`]: SQLite implementation of [`EntityStore`]
//! - [`Config`]: Application configuration management

pub mod calendar;
pub mod error;
pub mod events;
pub mod gamification;
pub mod habit;
pub mod recurrence;
pub mod storage;

pub use error::{ConfigError, CoreError, DatabaseError, Result, ValidationError};
pub use events::{Event, XpReason};
pub use gamification::{
    default_catalog, Achievement, AchievementContext, AchievementDefinition, GamificationEngine,
    GamificationState, LevelCurve, LevelOverflow, StreakChange, StreakData, UserStats, XpRewards,
};
pub use habit::{complete_habit, Habit, HabitCompletion, HabitCompletionOutcome};
pub use recurrence::task::{
    complete_task, create_successor, on_task_completed, SuccessorOutcome, Task, TaskCompletion,
    TaskStatus,
};
pub use recurrence::transaction::{
    sweep_due_recurring_transactions, sweep_recurring_transactions, SweepResult, Transaction,
    TransactionKind, TransactionRecurrence,
};
pub use recurrence::{compute_next_date, Frequency, RecurrencePattern};
pub use storage::{Config, Database, EntityFilter, EntityKind, EntityStore};
