//! Task repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - CRUD over `tasks`, including partial updates.
//! - Completion toggling with `completed_at` bookkeeping.
//! - Hierarchical and flat task views.
//!
//! # Invariants
//! - `completed_at` changes only when `is_completed` actually flips.
//! - Read-modify-write paths run in one `IMMEDIATE` transaction.
//! - Copies are detached: `parent_id` is always NULL on the new row.

use super::hierarchy::{load_task_tree, TaskTreeScope};
use super::update::UpdateBuilder;
use super::{
    flag_to_int, id_or_null, parse_flag, parse_task_row, text_or_null, RepoError, RepoResult,
    TASK_COLUMNS,
};
use crate::clock::{format_date, format_timestamp, now};
use crate::model::{NewTask, RowId, Task, TaskNode, TaskPatch, TaskWithProject};
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};

pub trait TaskRepository {
    fn get_task(&self, id: RowId) -> RepoResult<Option<Task>>;
    fn create_task(&self, task: &NewTask) -> RepoResult<Task>;
    /// Writes present patch fields. `None` for an empty patch or a missing row.
    fn update_task(&self, id: RowId, patch: &TaskPatch) -> RepoResult<Option<Task>>;
    /// Deletes the task and, through cascades, its subtree and sessions.
    fn delete_task(&self, id: RowId) -> RepoResult<bool>;
    fn toggle_task(&self, id: RowId) -> RepoResult<Option<Task>>;
    fn move_to_date(&self, id: RowId, date: NaiveDate) -> RepoResult<Option<Task>>;
    /// Creates a detached copy due on `date`.
    fn copy_to_date(&self, id: RowId, date: NaiveDate) -> RepoResult<Option<Task>>;
    fn list_tree(&self, scope: TaskTreeScope) -> RepoResult<Vec<TaskNode>>;
    /// Incomplete tasks by priority, then due date with undated last.
    fn list_active(&self) -> RepoResult<Vec<TaskWithProject>>;
    /// Tasks due on `date` that have a start time, by start time.
    fn list_time_blocked(&self, date: NaiveDate) -> RepoResult<Vec<TaskWithProject>>;
    /// `None` when the task is missing, `Some(parent)` otherwise.
    fn parent_of(&self, id: RowId) -> RepoResult<Option<Option<RowId>>>;
}

pub struct SqliteTaskRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTaskRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn get_task(&self, id: RowId) -> RepoResult<Option<Task>> {
        load_task(self.conn, id)
    }

    fn create_task(&self, task: &NewTask) -> RepoResult<Task> {
        let task = task.validate()?;

        self.conn.execute(
            "INSERT INTO tasks (
                project_id,
                parent_id,
                title,
                notes,
                priority,
                due_date,
                start_time,
                pomo_target
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                task.project_id,
                task.parent_id,
                task.title,
                task.notes,
                i64::from(task.priority),
                task.due_date.map(format_date),
                task.start_time.map(|time| time.to_string()),
                task.pomo_target,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        load_task(self.conn, id)?
            .ok_or_else(|| RepoError::InvalidData(format!("task {id} vanished after insert")))
    }

    fn update_task(&self, id: RowId, patch: &TaskPatch) -> RepoResult<Option<Task>> {
        if patch.is_empty() {
            return Ok(None);
        }
        let mut patch = patch.clone();
        patch.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let Some(was_completed) = load_completion(&tx, id)? else {
            return Ok(None);
        };

        let mut update = UpdateBuilder::new("tasks");
        if let Some(title) = patch.title {
            update.set("title", title);
        }
        if let Some(notes) = patch.notes {
            update.set("notes", text_or_null(notes));
        }
        if let Some(priority) = patch.priority {
            update.set("priority", priority);
        }
        if let Some(due_date) = patch.due_date {
            update.set("due_date", text_or_null(due_date.map(format_date)));
        }
        if let Some(start_time) = patch.start_time {
            update.set(
                "start_time",
                text_or_null(start_time.map(|time| time.to_string())),
            );
        }
        if let Some(is_completed) = patch.is_completed {
            update.set("is_completed", flag_to_int(is_completed));
            if is_completed != was_completed {
                update.set("completed_at", completion_stamp(is_completed));
            }
        }
        if let Some(pomo_target) = patch.pomo_target {
            update.set("pomo_target", pomo_target);
        }
        if let Some(pomo_completed) = patch.pomo_completed {
            update.set("pomo_completed", pomo_completed);
        }
        if let Some(project_id) = patch.project_id {
            update.set("project_id", id_or_null(project_id));
        }
        if let Some(parent_id) = patch.parent_id {
            update.set("parent_id", id_or_null(parent_id));
        }

        update.execute(&tx, id)?;
        let updated = load_task(&tx, id)?;
        tx.commit()?;
        Ok(updated)
    }

    fn delete_task(&self, id: RowId) -> RepoResult<bool> {
        let changed = self.conn.execute("DELETE FROM tasks WHERE id = ?1;", [id])?;
        Ok(changed > 0)
    }

    fn toggle_task(&self, id: RowId) -> RepoResult<Option<Task>> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let Some(was_completed) = load_completion(&tx, id)? else {
            return Ok(None);
        };

        let is_completed = !was_completed;
        tx.execute(
            "UPDATE tasks SET is_completed = ?1, completed_at = ?2 WHERE id = ?3;",
            params![
                flag_to_int(is_completed),
                completion_stamp(is_completed),
                id
            ],
        )?;
        let toggled = load_task(&tx, id)?;
        tx.commit()?;
        Ok(toggled)
    }

    fn move_to_date(&self, id: RowId, date: NaiveDate) -> RepoResult<Option<Task>> {
        let changed = self.conn.execute(
            "UPDATE tasks SET due_date = ?1 WHERE id = ?2;",
            params![format_date(date), id],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        load_task(self.conn, id)
    }

    fn copy_to_date(&self, id: RowId, date: NaiveDate) -> RepoResult<Option<Task>> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let copied = tx.execute(
            "INSERT INTO tasks (project_id, parent_id, title, notes, priority, due_date, pomo_target)
             SELECT project_id, NULL, title, notes, priority, ?1, pomo_target
             FROM tasks
             WHERE id = ?2;",
            params![format_date(date), id],
        )?;
        if copied == 0 {
            return Ok(None);
        }
        let copy = load_task(&tx, tx.last_insert_rowid())?;
        tx.commit()?;
        Ok(copy)
    }

    fn list_tree(&self, scope: TaskTreeScope) -> RepoResult<Vec<TaskNode>> {
        load_task_tree(self.conn, scope)
    }

    fn list_active(&self) -> RepoResult<Vec<TaskWithProject>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TASK_COLUMNS}, p.name AS project_name, p.icon AS project_icon
             FROM tasks t
             LEFT JOIN projects p ON p.id = t.project_id
             WHERE t.is_completed = 0
             ORDER BY t.priority ASC, t.due_date IS NULL, t.due_date ASC, t.id ASC;"
        ))?;
        let tasks = collect_with_project(stmt.query([])?)?;
        Ok(tasks)
    }

    fn list_time_blocked(&self, date: NaiveDate) -> RepoResult<Vec<TaskWithProject>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TASK_COLUMNS}, p.name AS project_name, p.icon AS project_icon
             FROM tasks t
             LEFT JOIN projects p ON p.id = t.project_id
             WHERE t.due_date = ?1
               AND t.start_time IS NOT NULL
             ORDER BY t.start_time ASC, t.id ASC;"
        ))?;
        let tasks = collect_with_project(stmt.query([format_date(date)])?)?;
        Ok(tasks)
    }

    fn parent_of(&self, id: RowId) -> RepoResult<Option<Option<RowId>>> {
        Ok(self
            .conn
            .query_row("SELECT parent_id FROM tasks WHERE id = ?1;", [id], |row| {
                row.get::<_, Option<RowId>>(0)
            })
            .optional()?)
    }
}

fn load_task(conn: &Connection, id: RowId) -> RepoResult<Option<Task>> {
    let mut stmt = conn.prepare(&format!("SELECT {TASK_COLUMNS} FROM tasks t WHERE t.id = ?1;"))?;
    stmt.query_row([id], |row| Ok(parse_task_row(row)))
        .optional()?
        .transpose()
}

fn load_completion(conn: &Connection, id: RowId) -> RepoResult<Option<bool>> {
    let value = conn
        .query_row(
            "SELECT is_completed FROM tasks WHERE id = ?1;",
            [id],
            |row| row.get::<_, Option<i64>>(0),
        )
        .optional()?;
    value
        .map(|flag| parse_flag(flag, "tasks.is_completed"))
        .transpose()
}

fn completion_stamp(is_completed: bool) -> Value {
    if is_completed {
        Value::Text(format_timestamp(now()))
    } else {
        Value::Null
    }
}

fn collect_with_project(mut rows: rusqlite::Rows<'_>) -> RepoResult<Vec<TaskWithProject>> {
    let mut tasks = Vec::new();
    while let Some(row) = rows.next()? {
        tasks.push(parse_with_project(row)?);
    }
    Ok(tasks)
}

fn parse_with_project(row: &Row<'_>) -> RepoResult<TaskWithProject> {
    Ok(TaskWithProject {
        task: parse_task_row(row)?,
        project_name: row.get("project_name")?,
        project_icon: row.get("project_icon")?,
    })
}
