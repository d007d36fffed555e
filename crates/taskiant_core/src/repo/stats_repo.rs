//! Dashboard counters and the month calendar aggregate.
//!
//! Counters are independent queries; no snapshot consistency across them.

use super::{parse_stored_date, RepoError, RepoResult};
use crate::clock::{format_date, month_bounds};
use crate::model::{MonthDaySummary, TaskStats, ValidationError};
use chrono::NaiveDate;
use rusqlite::Connection;

pub trait StatsRepository {
    /// Counters relative to `today`.
    fn task_stats(&self, today: NaiveDate) -> RepoResult<TaskStats>;
    /// Per-day totals for tasks due in `[year-month-01, next month)`.
    fn month_summary(&self, year: i32, month: u32) -> RepoResult<Vec<MonthDaySummary>>;
}

pub struct SqliteStatsRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteStatsRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn completion_counts(&self, sql: &str, day: Option<&str>) -> RepoResult<(i64, i64)> {
        let map = |row: &rusqlite::Row<'_>| -> rusqlite::Result<(i64, i64)> {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, Option<i64>>(1)?.unwrap_or(0),
            ))
        };
        let counts = match day {
            Some(day) => self.conn.query_row(sql, [day], map)?,
            None => self.conn.query_row(sql, [], map)?,
        };
        Ok(counts)
    }

    fn count(&self, sql: &str, day: &str) -> RepoResult<i64> {
        Ok(self.conn.query_row(sql, [day], |row| row.get(0))?)
    }
}

impl StatsRepository for SqliteStatsRepository<'_> {
    fn task_stats(&self, today: NaiveDate) -> RepoResult<TaskStats> {
        let day = format_date(today);

        let (today_total, today_completed) = self.completion_counts(
            "SELECT COUNT(*), SUM(CASE WHEN is_completed = 1 THEN 1 ELSE 0 END)
             FROM tasks
             WHERE due_date = ?1;",
            Some(&day),
        )?;
        let (all_total, all_completed) = self.completion_counts(
            "SELECT COUNT(*), SUM(CASE WHEN is_completed = 1 THEN 1 ELSE 0 END)
             FROM tasks;",
            None,
        )?;
        let completed_today = self.count(
            "SELECT COUNT(*)
             FROM tasks
             WHERE completed_at IS NOT NULL
               AND date(completed_at) = ?1;",
            &day,
        )?;
        let pomos_today = self.count(
            "SELECT COUNT(*)
             FROM pomodoro_sessions
             WHERE was_completed = 1
               AND date(start_time) = ?1;",
            &day,
        )?;

        Ok(TaskStats {
            today_total,
            today_completed,
            all_total,
            all_completed,
            completed_today,
            pomos_today,
        })
    }

    fn month_summary(&self, year: i32, month: u32) -> RepoResult<Vec<MonthDaySummary>> {
        let (start, end) =
            month_bounds(year, month).ok_or(ValidationError::InvalidMonth { year, month })?;

        let mut stmt = self.conn.prepare(
            "SELECT
                due_date,
                COUNT(*) AS total_tasks,
                SUM(CASE WHEN is_completed = 0 THEN 1 ELSE 0 END) AS incomplete_tasks,
                SUM(CASE WHEN is_completed = 1 THEN 1 ELSE 0 END) AS completed_tasks
             FROM tasks
             WHERE due_date >= ?1
               AND due_date < ?2
             GROUP BY due_date
             ORDER BY due_date ASC;",
        )?;
        let mut rows = stmt.query([format_date(start), format_date(end)])?;
        let mut days = Vec::new();
        while let Some(row) = rows.next()? {
            let raw: String = row.get("due_date")?;
            let due_date = parse_stored_date(&raw).ok_or_else(|| {
                RepoError::InvalidData(format!("invalid date `{raw}` in tasks.due_date"))
            })?;
            days.push(MonthDaySummary {
                due_date,
                total_tasks: row.get("total_tasks")?,
                incomplete_tasks: row.get::<_, Option<i64>>("incomplete_tasks")?.unwrap_or(0),
                completed_tasks: row.get::<_, Option<i64>>("completed_tasks")?.unwrap_or(0),
            });
        }
        Ok(days)
    }
}
