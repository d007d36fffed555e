//! Aggregate read models for dashboards and the calendar.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Dashboard counters. Each field comes from its own query, so the set is
/// not a consistent snapshot under concurrent writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    /// Tasks due today.
    pub today_total: i64,
    pub today_completed: i64,
    pub all_total: i64,
    pub all_completed: i64,
    /// Tasks whose `completed_at` falls on today, regardless of due date.
    pub completed_today: i64,
    pub pomos_today: i64,
}

/// Per-day density for a month calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthDaySummary {
    pub due_date: NaiveDate,
    pub total_tasks: i64,
    pub incomplete_tasks: i64,
    pub completed_tasks: i64,
}
