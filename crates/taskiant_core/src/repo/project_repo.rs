//! Project repository contracts and SQLite implementation.
//!
//! # Invariants
//! - New projects append at `MAX(sort_order) + 1` (0 for the first one).
//! - Listing is deterministic: `sort_order ASC, created_at ASC, id ASC`.
//! - Deleting a project cascades to its tasks through foreign keys.

use super::update::UpdateBuilder;
use super::{RepoError, RepoResult};
use crate::model::{NewProject, Project, ProjectPatch, RowId};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};

const PROJECT_SELECT_SQL: &str = "SELECT id, name, icon, sort_order, created_at FROM projects";

pub trait ProjectRepository {
    fn list_projects(&self) -> RepoResult<Vec<Project>>;
    fn get_project(&self, id: RowId) -> RepoResult<Option<Project>>;
    fn create_project(&self, project: &NewProject) -> RepoResult<Project>;
    fn update_project(&self, id: RowId, patch: &ProjectPatch) -> RepoResult<Option<Project>>;
    fn delete_project(&self, id: RowId) -> RepoResult<bool>;
}

pub struct SqliteProjectRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProjectRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ProjectRepository for SqliteProjectRepository<'_> {
    fn list_projects(&self) -> RepoResult<Vec<Project>> {
        let mut stmt = self.conn.prepare(&format!(
            "{PROJECT_SELECT_SQL} ORDER BY sort_order ASC, created_at ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut projects = Vec::new();
        while let Some(row) = rows.next()? {
            projects.push(parse_project_row(row)?);
        }
        Ok(projects)
    }

    fn get_project(&self, id: RowId) -> RepoResult<Option<Project>> {
        load_project(self.conn, id)
    }

    fn create_project(&self, project: &NewProject) -> RepoResult<Project> {
        let (name, icon) = project.normalized()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let sort_order: i64 = tx.query_row(
            "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM projects;",
            [],
            |row| row.get(0),
        )?;
        tx.execute(
            "INSERT INTO projects (name, icon, sort_order) VALUES (?1, ?2, ?3);",
            params![name, icon, sort_order],
        )?;
        let id = tx.last_insert_rowid();
        let created = load_project(&tx, id)?;
        tx.commit()?;

        created.ok_or_else(|| RepoError::InvalidData(format!("project {id} vanished after insert")))
    }

    fn update_project(&self, id: RowId, patch: &ProjectPatch) -> RepoResult<Option<Project>> {
        patch.validate()?;

        let mut update = UpdateBuilder::new("projects");
        if let Some(name) = &patch.name {
            update.set("name", name.trim().to_string());
        }
        if let Some(icon) = &patch.icon {
            update.set("icon", icon.clone());
        }
        if let Some(sort_order) = patch.sort_order {
            update.set("sort_order", sort_order);
        }

        match update.execute(self.conn, id)? {
            None | Some(0) => Ok(None),
            Some(_) => load_project(self.conn, id),
        }
    }

    fn delete_project(&self, id: RowId) -> RepoResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM projects WHERE id = ?1;", [id])?;
        Ok(changed > 0)
    }
}

fn load_project(conn: &Connection, id: RowId) -> RepoResult<Option<Project>> {
    let mut stmt = conn.prepare(&format!("{PROJECT_SELECT_SQL} WHERE id = ?1;"))?;
    stmt.query_row([id], |row| Ok(parse_project_row(row)))
        .optional()?
        .transpose()
}

fn parse_project_row(row: &Row<'_>) -> RepoResult<Project> {
    Ok(Project {
        id: row.get("id")?,
        name: row.get("name")?,
        icon: row
            .get::<_, Option<String>>("icon")?
            .unwrap_or_else(|| crate::model::DEFAULT_PROJECT_ICON.to_string()),
        sort_order: row.get::<_, Option<i64>>("sort_order")?.unwrap_or(0),
        created_at: row.get::<_, Option<String>>("created_at")?.unwrap_or_default(),
    })
}
