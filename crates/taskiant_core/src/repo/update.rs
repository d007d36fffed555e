//! Minimal `UPDATE` statements from a set of present fields.

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};

/// Collects `column = value` assignments for one row.
///
/// Column names are `&'static str` so only identifiers written in this crate
/// ever reach the SQL text; values are always bound.
#[derive(Debug)]
pub(crate) struct UpdateBuilder {
    table: &'static str,
    assignments: Vec<(&'static str, Value)>,
}

impl UpdateBuilder {
    pub(crate) fn new(table: &'static str) -> Self {
        Self {
            table,
            assignments: Vec::new(),
        }
    }

    pub(crate) fn set(&mut self, column: &'static str, value: impl Into<Value>) -> &mut Self {
        self.assignments.push((column, value.into()));
        self
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    fn sql(&self) -> String {
        let columns = self
            .assignments
            .iter()
            .enumerate()
            .map(|(index, (column, _))| format!("{column} = ?{}", index + 1))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "UPDATE {} SET {columns} WHERE id = ?{};",
            self.table,
            self.assignments.len() + 1
        )
    }

    /// Runs the update against row `id`.
    ///
    /// Returns `None` without executing when no field was set, otherwise the
    /// number of rows changed.
    pub(crate) fn execute(self, conn: &Connection, id: i64) -> rusqlite::Result<Option<usize>> {
        if self.is_empty() {
            return Ok(None);
        }
        let sql = self.sql();
        let values = self
            .assignments
            .into_iter()
            .map(|(_, value)| value)
            .chain(std::iter::once(Value::Integer(id)));
        conn.execute(&sql, params_from_iter(values)).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::UpdateBuilder;
    use rusqlite::Connection;

    #[test]
    fn sql_touches_only_set_columns() {
        let mut update = UpdateBuilder::new("tasks");
        update.set("title", "Ship it".to_string()).set("priority", 1_i64);
        assert_eq!(
            update.sql(),
            "UPDATE tasks SET title = ?1, priority = ?2 WHERE id = ?3;"
        );
    }

    #[test]
    fn empty_builder_skips_execution() {
        let conn = Connection::open_in_memory().unwrap();
        let update = UpdateBuilder::new("missing_table");
        assert_eq!(update.execute(&conn, 1).unwrap(), None);
    }

    #[test]
    fn execute_reports_changed_rows() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT);
             INSERT INTO items (id, name) VALUES (1, 'a');",
        )
        .unwrap();

        let mut update = UpdateBuilder::new("items");
        update.set("name", "b".to_string());
        assert_eq!(update.execute(&conn, 1).unwrap(), Some(1));

        let mut update = UpdateBuilder::new("items");
        update.set("name", "c".to_string());
        assert_eq!(update.execute(&conn, 99).unwrap(), Some(0));

        let name: String = conn
            .query_row("SELECT name FROM items WHERE id = 1", [], |row| row.get(0))
            .unwrap();
        assert_eq!(name, "b");
    }
}
