//! Label repository and task/label associations.
//!
//! # Invariants
//! - Label names are unique; a duplicate create is a `ConstraintViolation`.
//! - Associating an already-linked pair, or a missing task/label, reports
//!   `false` instead of failing.

use super::{RepoError, RepoResult};
use crate::model::{Label, NewLabel, RowId};
use rusqlite::{params, Connection, Row};

const LABEL_SELECT_SQL: &str = "SELECT l.id, l.name, l.color FROM labels l";

pub trait LabelRepository {
    fn list_labels(&self) -> RepoResult<Vec<Label>>;
    fn create_label(&self, label: &NewLabel) -> RepoResult<Label>;
    fn delete_label(&self, id: RowId) -> RepoResult<bool>;
    fn add_label_to_task(&self, task_id: RowId, label_id: RowId) -> RepoResult<bool>;
    fn remove_label_from_task(&self, task_id: RowId, label_id: RowId) -> RepoResult<bool>;
    fn labels_for_task(&self, task_id: RowId) -> RepoResult<Vec<Label>>;
}

pub struct SqliteLabelRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLabelRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl LabelRepository for SqliteLabelRepository<'_> {
    fn list_labels(&self) -> RepoResult<Vec<Label>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{LABEL_SELECT_SQL} ORDER BY l.name ASC;"))?;
        let labels = collect_labels(stmt.query([])?)?;
        Ok(labels)
    }

    fn create_label(&self, label: &NewLabel) -> RepoResult<Label> {
        let (name, color) = label.normalized()?;
        self.conn.execute(
            "INSERT INTO labels (name, color) VALUES (?1, ?2);",
            params![name, color],
        )?;
        Ok(Label {
            id: self.conn.last_insert_rowid(),
            name,
            color,
        })
    }

    fn delete_label(&self, id: RowId) -> RepoResult<bool> {
        let changed = self.conn.execute("DELETE FROM labels WHERE id = ?1;", [id])?;
        Ok(changed > 0)
    }

    fn add_label_to_task(&self, task_id: RowId, label_id: RowId) -> RepoResult<bool> {
        match self.conn.execute(
            "INSERT INTO task_labels (task_id, label_id) VALUES (?1, ?2);",
            [task_id, label_id],
        ) {
            Ok(changed) => Ok(changed > 0),
            Err(err) => match RepoError::from(err) {
                RepoError::ConstraintViolation(_) => Ok(false),
                other => Err(other),
            },
        }
    }

    fn remove_label_from_task(&self, task_id: RowId, label_id: RowId) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM task_labels WHERE task_id = ?1 AND label_id = ?2;",
            [task_id, label_id],
        )?;
        Ok(changed > 0)
    }

    fn labels_for_task(&self, task_id: RowId) -> RepoResult<Vec<Label>> {
        let mut stmt = self.conn.prepare(&format!(
            "{LABEL_SELECT_SQL}
             INNER JOIN task_labels tl ON tl.label_id = l.id
             WHERE tl.task_id = ?1
             ORDER BY l.name ASC;"
        ))?;
        let labels = collect_labels(stmt.query([task_id])?)?;
        Ok(labels)
    }
}

fn collect_labels(mut rows: rusqlite::Rows<'_>) -> RepoResult<Vec<Label>> {
    let mut labels = Vec::new();
    while let Some(row) = rows.next()? {
        labels.push(parse_label_row(row)?);
    }
    Ok(labels)
}

fn parse_label_row(row: &Row<'_>) -> RepoResult<Label> {
    Ok(Label {
        id: row.get("id")?,
        name: row.get("name")?,
        color: row
            .get::<_, Option<String>>("color")?
            .unwrap_or_else(|| crate::model::DEFAULT_LABEL_COLOR.to_string()),
    })
}
