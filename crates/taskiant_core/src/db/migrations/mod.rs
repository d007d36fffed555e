//! Idempotent schema application.
//!
//! # Responsibility
//! - Declare the six tables, their foreign keys and secondary indexes.
//! - Add columns introduced after the first release, when missing.
//! - Seed default settings without overwriting user values.
//!
//! # Invariants
//! - Safe to run on every open; a second run changes nothing.
//! - Forward-only and additive: no version table, no down-migrations, no
//!   destructive alterations.
//! - Column presence is read from `PRAGMA table_info`, so any DDL error that
//!   does occur is a real failure and is propagated.

use crate::db::{DbError, DbResult};
use rusqlite::{params, Connection};

#[derive(Debug, Clone, Copy)]
struct SchemaStep {
    name: &'static str,
    sql: &'static str,
}

#[derive(Debug, Clone, Copy)]
struct AdditiveColumn {
    table: &'static str,
    column: &'static str,
    definition: &'static str,
}

/// Tables managed by [`ensure_schema`].
pub const TABLES: &[&str] = &[
    "projects",
    "tasks",
    "labels",
    "task_labels",
    "pomodoro_sessions",
    "settings",
];

/// Settings inserted when absent.
pub const DEFAULT_SETTINGS: &[(&str, &str)] = &[
    ("theme", "midnight"),
    ("pomo_work", "25"),
    ("pomo_break", "5"),
    ("backup_enabled", "true"),
];

const TABLE_STEPS: &[SchemaStep] = &[
    SchemaStep {
        name: "create_projects",
        sql: "CREATE TABLE IF NOT EXISTS projects (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            icon TEXT DEFAULT '📁',
            sort_order INTEGER DEFAULT 0,
            created_at DATETIME DEFAULT (datetime('now', 'localtime'))
        );",
    },
    SchemaStep {
        name: "create_tasks",
        sql: "CREATE TABLE IF NOT EXISTS tasks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            project_id INTEGER,
            parent_id INTEGER DEFAULT NULL,
            title TEXT NOT NULL,
            priority INTEGER DEFAULT 4 CHECK(priority BETWEEN 1 AND 4),
            due_date DATE,
            is_completed INTEGER DEFAULT 0,
            pomo_target INTEGER DEFAULT 1,
            created_at DATETIME DEFAULT (datetime('now', 'localtime')),
            completed_at DATETIME,
            FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE,
            FOREIGN KEY (parent_id) REFERENCES tasks(id) ON DELETE CASCADE
        );",
    },
    SchemaStep {
        name: "create_labels",
        sql: "CREATE TABLE IF NOT EXISTS labels (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            color TEXT DEFAULT '#3B82F6',
            created_at DATETIME DEFAULT (datetime('now', 'localtime'))
        );",
    },
    SchemaStep {
        name: "create_task_labels",
        sql: "CREATE TABLE IF NOT EXISTS task_labels (
            task_id INTEGER NOT NULL,
            label_id INTEGER NOT NULL,
            PRIMARY KEY (task_id, label_id),
            FOREIGN KEY (task_id) REFERENCES tasks(id) ON DELETE CASCADE,
            FOREIGN KEY (label_id) REFERENCES labels(id) ON DELETE CASCADE
        );",
    },
    SchemaStep {
        name: "create_pomodoro_sessions",
        sql: "CREATE TABLE IF NOT EXISTS pomodoro_sessions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            task_id INTEGER NOT NULL,
            start_time DATETIME NOT NULL,
            end_time DATETIME,
            was_completed INTEGER DEFAULT 0,
            FOREIGN KEY (task_id) REFERENCES tasks(id) ON DELETE CASCADE
        );",
    },
    SchemaStep {
        name: "create_settings",
        sql: "CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT
        );",
    },
];

// Columns that shipped after `tasks` was first created.
const ADDITIVE_COLUMNS: &[AdditiveColumn] = &[
    AdditiveColumn {
        table: "tasks",
        column: "notes",
        definition: "TEXT",
    },
    AdditiveColumn {
        table: "tasks",
        column: "start_time",
        definition: "TEXT",
    },
    AdditiveColumn {
        table: "tasks",
        column: "pomo_completed",
        definition: "INTEGER DEFAULT 0",
    },
];

const INDEX_STEP: SchemaStep = SchemaStep {
    name: "create_indexes",
    sql: "CREATE INDEX IF NOT EXISTS idx_tasks_project ON tasks(project_id);
        CREATE INDEX IF NOT EXISTS idx_tasks_parent ON tasks(parent_id);
        CREATE INDEX IF NOT EXISTS idx_tasks_due_date ON tasks(due_date);
        CREATE INDEX IF NOT EXISTS idx_tasks_completed ON tasks(is_completed);
        CREATE INDEX IF NOT EXISTS idx_task_labels_task ON task_labels(task_id);
        CREATE INDEX IF NOT EXISTS idx_task_labels_label ON task_labels(label_id);
        CREATE INDEX IF NOT EXISTS idx_pomodoro_sessions_task ON pomodoro_sessions(task_id);",
};

/// Applies the full schema inside one transaction.
pub fn ensure_schema(conn: &mut Connection) -> DbResult<()> {
    let tx = conn.transaction()?;

    for step in TABLE_STEPS {
        run_step(&tx, step)?;
    }

    for column in ADDITIVE_COLUMNS {
        let present = table_has_column(&tx, column.table, column.column).map_err(|source| {
            DbError::Migration {
                step: "inspect_columns",
                source,
            }
        })?;
        if present {
            continue;
        }
        tx.execute_batch(&format!(
            "ALTER TABLE {} ADD COLUMN {} {};",
            column.table, column.column, column.definition
        ))
        .map_err(|source| DbError::Migration {
            step: "add_column",
            source,
        })?;
        log::info!(
            "event=db_migrate module=db status=ok step=add_column table={} column={}",
            column.table,
            column.column
        );
    }

    for (key, value) in DEFAULT_SETTINGS {
        tx.execute(
            "INSERT OR IGNORE INTO settings (key, value) VALUES (?1, ?2);",
            params![key, value],
        )
        .map_err(|source| DbError::Migration {
            step: "seed_settings",
            source,
        })?;
    }

    run_step(&tx, &INDEX_STEP)?;
    tx.commit()?;
    Ok(())
}

/// Whether `table` exists in the catalog.
pub fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

/// Whether `table` has a column named `column`.
pub fn table_has_column(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1);")?;
    let mut rows = stmt.query([table])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(0)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}

fn run_step(conn: &Connection, step: &SchemaStep) -> DbResult<()> {
    conn.execute_batch(step.sql)
        .map_err(|source| DbError::Migration {
            step: step.name,
            source,
        })
}
