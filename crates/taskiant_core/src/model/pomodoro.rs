//! Pomodoro session records.
//!
//! # Invariants
//! - Every session belongs to a task.
//! - An open session has no `end_time` and `was_completed = false`.
//! - Timestamps are stored as `YYYY-MM-DD HH:MM:SS` local time.

use super::{RowId, ValidationError};
use crate::clock::{format_timestamp, parse_timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PomodoroSession {
    pub id: RowId,
    pub task_id: RowId,
    pub start_time: String,
    pub end_time: Option<String>,
    pub was_completed: bool,
}

/// Session row joined with the owning task, for the daily log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionWithTask {
    #[serde(flatten)]
    pub session: PomodoroSession,
    pub task_title: String,
    pub project_id: Option<RowId>,
}

/// Backfilled session entered by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualSession {
    pub task_id: RowId,
    pub start_time: String,
    pub end_time: String,
    #[serde(default = "default_was_completed")]
    pub was_completed: bool,
}

fn default_was_completed() -> bool {
    true
}

impl ManualSession {
    pub fn new(task_id: RowId, start_time: impl Into<String>, end_time: impl Into<String>) -> Self {
        Self {
            task_id,
            start_time: start_time.into(),
            end_time: end_time.into(),
            was_completed: true,
        }
    }

    /// Parses both ends and returns them in the stored format.
    pub fn normalized_bounds(&self) -> Result<(String, String), ValidationError> {
        let start = parse_timestamp(&self.start_time)
            .ok_or_else(|| ValidationError::InvalidTimestamp(self.start_time.clone()))?;
        let end = parse_timestamp(&self.end_time)
            .ok_or_else(|| ValidationError::InvalidTimestamp(self.end_time.clone()))?;
        if end < start {
            return Err(ValidationError::SessionEndsBeforeStart);
        }
        Ok((format_timestamp(start), format_timestamp(end)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_session_normalizes_iso_input() {
        let session = ManualSession::new(1, "2024-01-15T09:00:00", "2024-01-15 09:25:00");
        let (start, end) = session.normalized_bounds().unwrap();
        assert_eq!(start, "2024-01-15 09:00:00");
        assert_eq!(end, "2024-01-15 09:25:00");
    }

    #[test]
    fn manual_session_rejects_reversed_or_garbled_bounds() {
        let reversed = ManualSession::new(1, "2024-01-15 10:00:00", "2024-01-15 09:00:00");
        assert_eq!(
            reversed.normalized_bounds().unwrap_err(),
            ValidationError::SessionEndsBeforeStart
        );

        let garbled = ManualSession::new(1, "yesterday", "2024-01-15 09:00:00");
        assert!(matches!(
            garbled.normalized_bounds().unwrap_err(),
            ValidationError::InvalidTimestamp(_)
        ));
    }

    #[test]
    fn was_completed_defaults_to_true_when_omitted() {
        let session: ManualSession = serde_json::from_str(
            r#"{"task_id":3,"start_time":"2024-01-15 09:00:00","end_time":"2024-01-15 09:25:00"}"#,
        )
        .unwrap();
        assert!(session.was_completed);
    }
}
