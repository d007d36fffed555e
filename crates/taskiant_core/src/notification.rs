//! Notification payloads for finished Pomodoro phases.
//!
//! Only the `{title, body}` contract lives here; delivery belongs to the
//! presentation tier.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Work,
    Short,
    Long,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PomodoroNotification {
    pub title: String,
    pub body: String,
}

impl PomodoroNotification {
    /// Payload for the end of a `kind` phase.
    ///
    /// `task_title` and `session_number` only appear in `Work` payloads.
    pub fn for_session(kind: SessionKind, task_title: &str, session_number: u32) -> Self {
        let (title, body) = match kind {
            SessionKind::Work => (
                "🍅 Pomodoro Complete!".to_string(),
                format!(
                    "Great work on \"{task_title}\"! Session #{session_number} complete. Time for a break."
                ),
            ),
            SessionKind::Short => (
                "☕ Break Over!".to_string(),
                "Ready to focus again? Start your next pomodoro!".to_string(),
            ),
            SessionKind::Long => (
                "🎉 Long Break Over!".to_string(),
                "Feeling refreshed? Let's get back to work!".to_string(),
            ),
        };
        Self { title, body }
    }
}
