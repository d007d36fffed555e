//! Pomodoro session repository contracts and SQLite implementation.
//!
//! # Invariants
//! - Completing a session and incrementing its task's `pomo_completed`
//!   happen in one transaction; a missing or already-completed session
//!   increments nothing.
//! - Cancel deletes only sessions that were never completed.

use super::{flag_to_int, parse_flag, RepoError, RepoResult};
use crate::clock::{format_date, format_timestamp};
use crate::model::{ManualSession, PomodoroSession, RowId, SessionWithTask};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};

const SESSION_SELECT_SQL: &str = "SELECT
    ps.id,
    ps.task_id,
    ps.start_time,
    ps.end_time,
    ps.was_completed
FROM pomodoro_sessions ps";

pub trait PomodoroRepository {
    fn start_session(&self, task_id: RowId, at: NaiveDateTime) -> RepoResult<PomodoroSession>;
    fn complete_session(
        &self,
        session_id: RowId,
        at: NaiveDateTime,
    ) -> RepoResult<Option<PomodoroSession>>;
    fn cancel_session(&self, session_id: RowId) -> RepoResult<bool>;
    /// Newest first.
    fn sessions_for_task(&self, task_id: RowId) -> RepoResult<Vec<PomodoroSession>>;
    /// Sessions started on `date`, newest first, with task title.
    fn sessions_on(&self, date: NaiveDate) -> RepoResult<Vec<SessionWithTask>>;
    fn add_manual_session(&self, session: &ManualSession) -> RepoResult<PomodoroSession>;
}

pub struct SqlitePomodoroRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePomodoroRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl PomodoroRepository for SqlitePomodoroRepository<'_> {
    fn start_session(&self, task_id: RowId, at: NaiveDateTime) -> RepoResult<PomodoroSession> {
        self.conn.execute(
            "INSERT INTO pomodoro_sessions (task_id, start_time) VALUES (?1, ?2);",
            params![task_id, format_timestamp(at)],
        )?;
        let id = self.conn.last_insert_rowid();
        load_session(self.conn, id)?
            .ok_or_else(|| RepoError::InvalidData(format!("session {id} vanished after insert")))
    }

    fn complete_session(
        &self,
        session_id: RowId,
        at: NaiveDateTime,
    ) -> RepoResult<Option<PomodoroSession>> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE pomodoro_sessions
             SET end_time = ?1, was_completed = 1
             WHERE id = ?2
               AND was_completed = 0;",
            params![format_timestamp(at), session_id],
        )?;
        if changed > 0 {
            tx.execute(
                "UPDATE tasks
                 SET pomo_completed = COALESCE(pomo_completed, 0) + 1
                 WHERE id = (SELECT task_id FROM pomodoro_sessions WHERE id = ?1);",
                [session_id],
            )?;
        }
        let session = load_session(&tx, session_id)?;
        tx.commit()?;
        Ok(session)
    }

    fn cancel_session(&self, session_id: RowId) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM pomodoro_sessions WHERE id = ?1 AND was_completed = 0;",
            [session_id],
        )?;
        Ok(changed > 0)
    }

    fn sessions_for_task(&self, task_id: RowId) -> RepoResult<Vec<PomodoroSession>> {
        let mut stmt = self.conn.prepare(&format!(
            "{SESSION_SELECT_SQL}
             WHERE ps.task_id = ?1
             ORDER BY ps.start_time DESC, ps.id DESC;"
        ))?;
        let mut rows = stmt.query([task_id])?;
        let mut sessions = Vec::new();
        while let Some(row) = rows.next()? {
            sessions.push(parse_session_row(row)?);
        }
        Ok(sessions)
    }

    fn sessions_on(&self, date: NaiveDate) -> RepoResult<Vec<SessionWithTask>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                ps.id,
                ps.task_id,
                ps.start_time,
                ps.end_time,
                ps.was_completed,
                t.title AS task_title,
                t.project_id AS project_id
             FROM pomodoro_sessions ps
             INNER JOIN tasks t ON t.id = ps.task_id
             WHERE date(ps.start_time) = ?1
             ORDER BY ps.start_time DESC, ps.id DESC;",
        )?;
        let mut rows = stmt.query([format_date(date)])?;
        let mut sessions = Vec::new();
        while let Some(row) = rows.next()? {
            sessions.push(SessionWithTask {
                session: parse_session_row(row)?,
                task_title: row.get("task_title")?,
                project_id: row.get("project_id")?,
            });
        }
        Ok(sessions)
    }

    fn add_manual_session(&self, session: &ManualSession) -> RepoResult<PomodoroSession> {
        let (start_time, end_time) = session.normalized_bounds()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO pomodoro_sessions (task_id, start_time, end_time, was_completed)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                session.task_id,
                start_time,
                end_time,
                flag_to_int(session.was_completed)
            ],
        )?;
        let id = tx.last_insert_rowid();
        if session.was_completed {
            tx.execute(
                "UPDATE tasks SET pomo_completed = COALESCE(pomo_completed, 0) + 1 WHERE id = ?1;",
                [session.task_id],
            )?;
        }
        let created = load_session(&tx, id)?;
        tx.commit()?;
        created.ok_or_else(|| RepoError::InvalidData(format!("session {id} vanished after insert")))
    }
}

fn load_session(conn: &Connection, id: RowId) -> RepoResult<Option<PomodoroSession>> {
    let mut stmt = conn.prepare(&format!("{SESSION_SELECT_SQL} WHERE ps.id = ?1;"))?;
    stmt.query_row([id], |row| Ok(parse_session_row(row)))
        .optional()?
        .transpose()
}

fn parse_session_row(row: &Row<'_>) -> RepoResult<PomodoroSession> {
    Ok(PomodoroSession {
        id: row.get("id")?,
        task_id: row.get("task_id")?,
        start_time: row.get("start_time")?,
        end_time: row.get("end_time")?,
        was_completed: parse_flag(row.get("was_completed")?, "pomodoro_sessions.was_completed")?,
    })
}
