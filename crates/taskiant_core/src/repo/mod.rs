//! Repository layer: typed persistence over the open store.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts per entity.
//! - Keep SQL text, row parsing and column formats inside this layer.
//!
//! # Invariants
//! - Missing rows surface as `Ok(None)` / `Ok(false)`, never as errors.
//! - Updates with an empty patch return `Ok(None)` without touching SQL.
//! - Writes return the row as persisted, read back on the same connection.
//! - SQLite constraint failures surface as [`RepoError::ConstraintViolation`].

use crate::clock::{parse_date, parse_time};
use crate::db::DbError;
use crate::model::{ClockTime, Priority, Task, ValidationError};
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{ErrorCode, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod hierarchy;
pub mod label_repo;
pub mod pomodoro_repo;
pub mod project_repo;
pub mod settings_repo;
pub mod stats_repo;
pub mod task_repo;
mod update;

pub use hierarchy::{TaskTreeScope, MAX_TREE_DEPTH};
pub use label_repo::{LabelRepository, SqliteLabelRepository};
pub use pomodoro_repo::{PomodoroRepository, SqlitePomodoroRepository};
pub use project_repo::{ProjectRepository, SqliteProjectRepository};
pub use settings_repo::{SettingsRepository, SqliteSettingsRepository};
pub use stats_repo::{SqliteStatsRepository, StatsRepository};
pub use task_repo::{SqliteTaskRepository, TaskRepository};

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// Uniqueness, foreign-key or check constraint rejected the write.
    ConstraintViolation(String),
    Validation(ValidationError),
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::ConstraintViolation(message) => write!(f, "constraint violation: {message}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::ConstraintViolation(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        if value.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) {
            return Self::ConstraintViolation(value.to_string());
        }
        Self::Db(DbError::Sqlite(value))
    }
}

/// Task columns, qualified by the `t` alias every task query uses.
pub(crate) const TASK_COLUMNS: &str = "t.id,
    t.project_id,
    t.parent_id,
    t.title,
    t.notes,
    t.priority,
    t.due_date,
    t.start_time,
    t.is_completed,
    t.pomo_target,
    t.pomo_completed,
    t.created_at,
    t.completed_at";

pub(crate) fn parse_task_row(row: &Row<'_>) -> RepoResult<Task> {
    let priority_value = row.get::<_, Option<i64>>("priority")?.unwrap_or(4);
    let priority = Priority::new(priority_value).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid priority `{priority_value}` in tasks.priority"
        ))
    })?;

    let due_date = match row.get::<_, Option<String>>("due_date")? {
        Some(value) => Some(parse_stored_date(&value).ok_or_else(|| {
            RepoError::InvalidData(format!("invalid date `{value}` in tasks.due_date"))
        })?),
        None => None,
    };

    let start_time = match row.get::<_, Option<String>>("start_time")? {
        Some(value) if value.trim().is_empty() => None,
        Some(value) => Some(parse_time(&value).map(ClockTime).ok_or_else(|| {
            RepoError::InvalidData(format!("invalid time `{value}` in tasks.start_time"))
        })?),
        None => None,
    };

    Ok(Task {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        parent_id: row.get("parent_id")?,
        title: row.get("title")?,
        notes: row.get("notes")?,
        priority,
        due_date,
        start_time,
        is_completed: parse_flag(row.get("is_completed")?, "tasks.is_completed")?,
        pomo_target: row.get::<_, Option<i64>>("pomo_target")?.unwrap_or(1),
        pomo_completed: row.get::<_, Option<i64>>("pomo_completed")?.unwrap_or(0),
        created_at: row.get::<_, Option<String>>("created_at")?.unwrap_or_default(),
        completed_at: row.get("completed_at")?,
    })
}

/// Reads a 0/1 flag column; NULL reads as false.
pub(crate) fn parse_flag(value: Option<i64>, column: &str) -> RepoResult<bool> {
    match value {
        None | Some(0) => Ok(false),
        Some(1) => Ok(true),
        Some(other) => Err(RepoError::InvalidData(format!(
            "invalid flag value `{other}` in {column}"
        ))),
    }
}

pub(crate) fn flag_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub(crate) fn text_or_null(value: Option<String>) -> Value {
    match value {
        Some(text) => Value::Text(text),
        None => Value::Null,
    }
}

pub(crate) fn id_or_null(value: Option<i64>) -> Value {
    match value {
        Some(id) => Value::Integer(id),
        None => Value::Null,
    }
}

// Older rows may carry a full ISO timestamp in a date column.
pub(crate) fn parse_stored_date(value: &str) -> Option<NaiveDate> {
    parse_date(value).or_else(|| value.get(..10).and_then(parse_date))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_dates_accept_iso_prefix() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15);
        assert_eq!(parse_stored_date("2024-01-15"), expected);
        assert_eq!(parse_stored_date("2024-01-15T00:00:00.000Z"), expected);
        assert_eq!(parse_stored_date("15/01/2024"), None);
    }

    #[test]
    fn flags_reject_out_of_range_values() {
        assert!(!parse_flag(None, "t.c").unwrap());
        assert!(parse_flag(Some(1), "t.c").unwrap());
        assert!(matches!(
            parse_flag(Some(2), "t.c"),
            Err(RepoError::InvalidData(_))
        ));
    }
}
