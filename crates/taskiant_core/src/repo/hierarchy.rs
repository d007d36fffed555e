//! Hierarchical task materialization.
//!
//! One recursive CTE seeds root tasks (`parent_id IS NULL`) matching a scope,
//! then repeatedly joins direct children of rows already in the set. Each
//! row carries:
//! - `depth`: 0 for roots, +1 per level.
//! - `path`: ancestor ids zero-padded to ten digits and joined with `/`.
//!
//! Because every path segment has the same width, lexical order of `path`
//! is a pre-order walk of the forest with siblings in id order, so the
//! caller never has to rebuild the tree in memory.
//!
//! # Invariants
//! - Recursion stops at [`MAX_TREE_DEPTH`] levels and never revisits an id
//!   already on the current path.
//! - Children are included regardless of their own due date or project;
//!   only roots are filtered by the scope.

use super::{id_or_null, parse_task_row, RepoError, RepoResult, TASK_COLUMNS};
use crate::clock::format_date;
use crate::model::{RowId, TaskNode};
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, Connection};

/// Levels below a root that are still materialized.
pub const MAX_TREE_DEPTH: i64 = 64;

/// Which roots seed the traversal, and how the result is ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskTreeScope {
    /// Roots in the project; `None` selects tasks without a project.
    /// Ordered by path only.
    Project(Option<RowId>),
    /// Roots due on the date. Ordered by priority, then path.
    DueOn(NaiveDate),
    /// Roots due on the date, for the time-blocking grid. Ordered by
    /// start time (unscheduled last), then priority, then path.
    TimeBlock(NaiveDate),
}

impl TaskTreeScope {
    fn seed_filter(self) -> &'static str {
        match self {
            Self::Project(_) => "t.project_id IS ?1",
            Self::DueOn(_) | Self::TimeBlock(_) => "t.due_date = ?1",
        }
    }

    fn seed_value(self) -> Value {
        match self {
            Self::Project(project_id) => id_or_null(project_id),
            Self::DueOn(date) | Self::TimeBlock(date) => Value::Text(format_date(date)),
        }
    }

    fn order_by(self) -> &'static str {
        match self {
            Self::Project(_) => "tree.path ASC",
            Self::DueOn(_) => "t.priority ASC, tree.path ASC",
            Self::TimeBlock(_) => {
                "t.start_time IS NULL, t.start_time ASC, t.priority ASC, tree.path ASC"
            }
        }
    }

    fn sql(self) -> String {
        format!(
            "WITH RECURSIVE tree(id, depth, path) AS (
                SELECT t.id, 0, printf('%010d', t.id)
                FROM tasks t
                WHERE t.parent_id IS NULL
                  AND {seed}
                UNION ALL
                SELECT child.id, tree.depth + 1, tree.path || '/' || printf('%010d', child.id)
                FROM tasks child
                INNER JOIN tree ON child.parent_id = tree.id
                WHERE tree.depth < ?2
                  AND instr('/' || tree.path || '/', '/' || printf('%010d', child.id) || '/') = 0
            )
            SELECT {TASK_COLUMNS},
                tree.depth AS depth,
                tree.path AS path,
                p.name AS project_name,
                p.icon AS project_icon
            FROM tree
            INNER JOIN tasks t ON t.id = tree.id
            LEFT JOIN projects p ON p.id = t.project_id
            ORDER BY {order};",
            seed = self.seed_filter(),
            order = self.order_by(),
        )
    }
}

pub(crate) fn load_task_tree(conn: &Connection, scope: TaskTreeScope) -> RepoResult<Vec<TaskNode>> {
    let mut stmt = conn.prepare(&scope.sql())?;
    let mut rows = stmt.query(params![scope.seed_value(), MAX_TREE_DEPTH])?;
    let mut nodes = Vec::new();
    while let Some(row) = rows.next()? {
        let depth: i64 = row.get("depth")?;
        let depth = u32::try_from(depth)
            .map_err(|_| RepoError::InvalidData(format!("invalid tree depth `{depth}`")))?;
        nodes.push(TaskNode {
            task: parse_task_row(row)?,
            depth,
            path: row.get("path")?,
            project_name: row.get("project_name")?,
            project_icon: row.get("project_icon")?,
        });
    }
    Ok(nodes)
}
