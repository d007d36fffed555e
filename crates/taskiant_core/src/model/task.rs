//! Task records, hierarchy annotations and write payloads.
//!
//! # Invariants
//! - `priority` is 1 (urgent) to 4 (low).
//! - `notes` is capped at [`MAX_NOTES_CHARS`] characters.
//! - `completed_at` is set when `is_completed` turns true and cleared when
//!   it turns false; repositories own that transition.

use super::patch::deserialize_present;
use super::{normalize_required, RowId, ValidationError};
use crate::clock::{format_time, parse_time};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};

pub const MAX_NOTES_CHARS: usize = 1500;
pub const DEFAULT_POMO_TARGET: i64 = 1;

/// Task priority, 1 = urgent ... 4 = low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Priority(u8);

impl Priority {
    pub const URGENT: Priority = Priority(1);
    pub const HIGH: Priority = Priority(2);
    pub const MEDIUM: Priority = Priority(3);
    pub const LOW: Priority = Priority(4);

    pub fn new(value: i64) -> Result<Self, ValidationError> {
        match value {
            1..=4 => Ok(Self(value as u8)),
            other => Err(ValidationError::PriorityOutOfRange(other)),
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::LOW
    }
}

impl TryFrom<i64> for Priority {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Priority> for i64 {
    fn from(value: Priority) -> Self {
        i64::from(value.0)
    }
}

/// Wall-clock start used for time-blocking, carried as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime(pub NaiveTime);

impl ClockTime {
    pub fn parse(value: &str) -> Option<Self> {
        parse_time(value).map(Self)
    }
}

impl Display for ClockTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format_time(self.0))
    }
}

impl Serialize for ClockTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ClockTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ClockTime::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid clock time `{raw}`")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: RowId,
    pub project_id: Option<RowId>,
    pub parent_id: Option<RowId>,
    pub title: String,
    pub notes: Option<String>,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
    pub start_time: Option<ClockTime>,
    pub is_completed: bool,
    pub pomo_target: i64,
    pub pomo_completed: i64,
    pub created_at: String,
    pub completed_at: Option<String>,
}

/// A task placed in a materialized hierarchy.
///
/// `path` is the `/`-joined chain of zero-padded ancestor ids ending with
/// this task's id; sorting by it yields pre-order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskNode {
    #[serde(flatten)]
    pub task: Task,
    /// Number of ancestors included in the result; roots are 0.
    pub depth: u32,
    pub path: String,
    pub project_name: Option<String>,
    pub project_icon: Option<String>,
}

/// Flat task row with its project's display fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskWithProject {
    #[serde(flatten)]
    pub task: Task,
    pub project_name: Option<String>,
    pub project_icon: Option<String>,
}

/// Create payload. Omitted optional fields take schema defaults.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NewTask {
    pub project_id: Option<RowId>,
    pub parent_id: Option<RowId>,
    pub title: String,
    pub notes: Option<String>,
    pub priority: Option<i64>,
    pub due_date: Option<NaiveDate>,
    pub start_time: Option<ClockTime>,
    pub pomo_target: Option<i64>,
}

/// `NewTask` after validation, ready for insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedTask {
    pub project_id: Option<RowId>,
    pub parent_id: Option<RowId>,
    pub title: String,
    pub notes: Option<String>,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
    pub start_time: Option<ClockTime>,
    pub pomo_target: i64,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<ValidatedTask, ValidationError> {
        let title = normalize_required(&self.title, ValidationError::EmptyTitle)?;
        let priority = match self.priority {
            Some(value) => Priority::new(value)?,
            None => Priority::default(),
        };
        let notes = normalize_notes(self.notes.as_deref())?;
        let pomo_target = self.pomo_target.unwrap_or(DEFAULT_POMO_TARGET);
        ensure_non_negative("pomo_target", pomo_target)?;

        Ok(ValidatedTask {
            project_id: self.project_id,
            parent_id: self.parent_id,
            title,
            notes,
            priority,
            due_date: self.due_date,
            start_time: self.start_time,
            pomo_target,
        })
    }
}

/// Partial task update; only present fields are written.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub notes: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<Option<NaiveDate>>,
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_time: Option<Option<ClockTime>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pomo_target: Option<i64>,
    /// Manual correction of the completed-pomodoro counter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pomo_completed: Option<i64>,
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub project_id: Option<Option<RowId>>,
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_id: Option<Option<RowId>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.notes.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
            && self.start_time.is_none()
            && self.is_completed.is_none()
            && self.pomo_target.is_none()
            && self.pomo_completed.is_none()
            && self.project_id.is_none()
            && self.parent_id.is_none()
    }

    /// Validates present fields and normalizes title/notes in place.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        if let Some(title) = &self.title {
            self.title = Some(normalize_required(title, ValidationError::EmptyTitle)?);
        }
        if let Some(notes) = &self.notes {
            self.notes = Some(normalize_notes(notes.as_deref())?);
        }
        if let Some(priority) = self.priority {
            Priority::new(priority)?;
        }
        if let Some(value) = self.pomo_target {
            ensure_non_negative("pomo_target", value)?;
        }
        if let Some(value) = self.pomo_completed {
            ensure_non_negative("pomo_completed", value)?;
        }
        Ok(())
    }
}

/// Calendar placement update used by the time-blocking grid.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeBlockPatch {
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<Option<NaiveDate>>,
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_time: Option<Option<ClockTime>>,
}

impl From<TimeBlockPatch> for TaskPatch {
    fn from(value: TimeBlockPatch) -> Self {
        Self {
            due_date: value.due_date,
            start_time: value.start_time,
            ..Self::default()
        }
    }
}

fn normalize_notes(notes: Option<&str>) -> Result<Option<String>, ValidationError> {
    let Some(notes) = notes else {
        return Ok(None);
    };
    let chars = notes.chars().count();
    if chars > MAX_NOTES_CHARS {
        return Err(ValidationError::NotesTooLong {
            chars,
            max: MAX_NOTES_CHARS,
        });
    }
    if notes.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(notes.to_string()))
}

fn ensure_non_negative(field: &'static str, value: i64) -> Result<(), ValidationError> {
    if value < 0 {
        return Err(ValidationError::NegativeCount { field, value });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_task_applies_defaults_and_trims_title() {
        let validated = NewTask::new("  Write spec  ").validate().unwrap();
        assert_eq!(validated.title, "Write spec");
        assert_eq!(validated.priority, Priority::LOW);
        assert_eq!(validated.pomo_target, 1);
        assert_eq!(validated.notes, None);
    }

    #[test]
    fn new_task_rejects_blank_title_bad_priority_and_long_notes() {
        assert_eq!(
            NewTask::new("   ").validate().unwrap_err(),
            ValidationError::EmptyTitle
        );

        let mut task = NewTask::new("x");
        task.priority = Some(5);
        assert_eq!(
            task.validate().unwrap_err(),
            ValidationError::PriorityOutOfRange(5)
        );

        let mut task = NewTask::new("x");
        task.notes = Some("n".repeat(MAX_NOTES_CHARS + 1));
        assert!(matches!(
            task.validate().unwrap_err(),
            ValidationError::NotesTooLong { .. }
        ));
    }

    #[test]
    fn patch_json_distinguishes_clear_from_absent() {
        let patch: TaskPatch =
            serde_json::from_str(r#"{"due_date":null,"start_time":"09:30","priority":1}"#)
                .unwrap();
        assert_eq!(patch.due_date, Some(None));
        assert_eq!(patch.start_time, Some(ClockTime::parse("09:30")));
        assert_eq!(patch.priority, Some(1));
        assert_eq!(patch.title, None);
        assert!(!patch.is_empty());

        let empty: TaskPatch = serde_json::from_str(r#"{"unknown":1}"#).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn priority_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&Priority::URGENT).unwrap(), "1");
        assert!(serde_json::from_str::<Priority>("0").is_err());
    }

    #[test]
    fn clock_time_serializes_without_seconds() {
        let time = ClockTime::parse("07:05:59").unwrap();
        assert_eq!(serde_json::to_string(&time).unwrap(), "\"07:05\"");
    }
}
