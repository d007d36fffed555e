//! Domain records and write payloads for the task store.
//!
//! # Responsibility
//! - Define read models returned by repositories (`Project`, `Task`, ...).
//! - Define create payloads and partial-update patches.
//! - Own domain validation shared by services and the boundary.
//!
//! # Invariants
//! - Patches distinguish "field absent" from "field set to null".
//! - Read models are full rows, as persisted after the write.

pub mod label;
pub mod patch;
pub mod pomodoro;
pub mod project;
pub mod stats;
pub mod task;

use std::error::Error;
use std::fmt::{Display, Formatter};

pub use label::{Label, NewLabel, DEFAULT_LABEL_COLOR};
pub use pomodoro::{ManualSession, PomodoroSession, SessionWithTask};
pub use project::{NewProject, Project, ProjectPatch, DEFAULT_PROJECT_ICON};
pub use stats::{MonthDaySummary, TaskStats};
pub use task::{
    ClockTime, NewTask, Priority, Task, TaskNode, TaskPatch, TaskWithProject, TimeBlockPatch,
    ValidatedTask, MAX_NOTES_CHARS,
};

/// Row identifier shared by every table.
pub type RowId = i64;

/// Domain rule violations rejected before any SQL runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyTitle,
    EmptyName,
    PriorityOutOfRange(i64),
    NotesTooLong { chars: usize, max: usize },
    NegativeCount { field: &'static str, value: i64 },
    InvalidMonth { year: i32, month: u32 },
    InvalidTimestamp(String),
    SessionEndsBeforeStart,
    SelfParent(RowId),
    ParentCycle { task_id: RowId, parent_id: RowId },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "title must not be blank"),
            Self::EmptyName => write!(f, "name must not be blank"),
            Self::PriorityOutOfRange(value) => {
                write!(f, "priority must be between 1 and 4, got {value}")
            }
            Self::NotesTooLong { chars, max } => {
                write!(f, "notes must be at most {max} characters, got {chars}")
            }
            Self::NegativeCount { field, value } => {
                write!(f, "{field} must not be negative, got {value}")
            }
            Self::InvalidMonth { year, month } => write!(f, "invalid month {year}-{month}"),
            Self::InvalidTimestamp(value) => write!(f, "invalid timestamp `{value}`"),
            Self::SessionEndsBeforeStart => write!(f, "session end must not precede its start"),
            Self::SelfParent(id) => write!(f, "task {id} cannot be its own parent"),
            Self::ParentCycle { task_id, parent_id } => write!(
                f,
                "moving task {task_id} under {parent_id} would create a cycle"
            ),
        }
    }
}

impl Error for ValidationError {}

pub(crate) fn normalize_required(value: &str, err: ValidationError) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(err);
    }
    Ok(trimmed.to_string())
}
