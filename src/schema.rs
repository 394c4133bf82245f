//! Relational schema snapshots.
//!
//! A [`SchemaDescriptor`] is an ordered, read-only snapshot of the target
//! database taken at request time: table names from `sqlite_master`,
//! columns from `PRAGMA table_info`, and row counts. Internal tables
//! (`sqlite_*` and the history log) are excluded so they never leak into
//! translation prompts.

use std::path::PathBuf;

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tokio::task;

use crate::history::HISTORY_TABLE;

/// A column in a table: name plus declared type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name.
    pub name: String,
    /// Declared SQL type (`INTEGER`, `TEXT`, ...).
    pub data_type: String,
}

/// A table with its ordered columns and row count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// Table name.
    pub name: String,
    /// Columns in declaration order.
    pub columns: Vec<ColumnDescriptor>,
    /// Number of rows at snapshot time.
    pub row_count: i64,
}

/// Ordered snapshot of the queryable schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    /// Tables in `sqlite_master` order.
    pub tables: Vec<TableDescriptor>,
}

impl SchemaDescriptor {
    /// Take a snapshot of the database at `path`.
    pub async fn snapshot<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let db_path = path.into();

        task::spawn_blocking(move || -> Result<Self> {
            let conn = Connection::open(&db_path).context("Failed to open database")?;
            snapshot_blocking(&conn)
        })
        .await
        .context("Failed to spawn blocking task")?
    }

    /// Whether the snapshot holds no queryable tables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

fn snapshot_blocking(conn: &Connection) -> Result<SchemaDescriptor> {
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY rowid")
        .context("Failed to query sqlite_master")?;
    let names: Vec<String> = stmt
        .query_map([], |row| row.get(0))
        .context("Failed to list tables")?
        .collect::<std::result::Result<_, _>>()?;

    let mut tables = Vec::new();
    for name in names {
        if name.starts_with("sqlite_") || name == HISTORY_TABLE {
            continue;
        }
        // PRAGMA and COUNT(*) interpolate the table name, so only names
        // that pass the identifier check are snapshotted at all.
        if !valid_identifier(&name) {
            tracing::warn!(table = %name, "Skipping table with unsafe identifier");
            continue;
        }

        let mut columns = Vec::new();
        let mut info = conn.prepare(&format!("PRAGMA table_info({name})"))?;
        let rows = info.query_map([], |row| {
            Ok(ColumnDescriptor {
                name: row.get(1)?,
                data_type: row.get(2)?,
            })
        })?;
        for column in rows {
            columns.push(column?);
        }

        let row_count: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM {name}"), [], |row| row.get(0))
            .with_context(|| format!("Failed to count rows in {name}"))?;

        tables.push(TableDescriptor {
            name,
            columns,
            row_count,
        });
    }

    Ok(SchemaDescriptor { tables })
}

/// Whether a table or column name is safe to interpolate: ASCII letters,
/// digits, and underscores, not starting with a digit.
#[must_use]
pub fn valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_db() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, signup_date DATE);
             INSERT INTO users (name, signup_date) VALUES ('ada', '2024-01-01');
             INSERT INTO users (name, signup_date) VALUES ('grace', '2024-02-01');
             CREATE TABLE query_history (id INTEGER PRIMARY KEY);",
        )
        .unwrap();
        (dir, path)
    }

    #[test]
    fn identifier_validation() {
        assert!(valid_identifier("users"));
        assert!(valid_identifier("_internal2"));
        assert!(!valid_identifier("2cool"));
        assert!(!valid_identifier("users; DROP TABLE users"));
        assert!(!valid_identifier(""));
    }

    #[tokio::test]
    async fn snapshot_reads_tables_columns_and_counts() {
        let (_dir, path) = seeded_db();
        let schema = SchemaDescriptor::snapshot(&path).await.unwrap();

        assert_eq!(schema.tables.len(), 1);
        let users = &schema.tables[0];
        assert_eq!(users.name, "users");
        assert_eq!(users.row_count, 2);
        let names: Vec<&str> = users.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["id", "name", "signup_date"]);
    }

    #[tokio::test]
    async fn empty_database_yields_empty_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.db");
        Connection::open(&path).unwrap();

        let schema = SchemaDescriptor::snapshot(&path).await.unwrap();
        assert!(schema.is_empty());
    }

    #[tokio::test]
    async fn snapshot_excludes_history_table() {
        let (_dir, path) = seeded_db();
        let schema = SchemaDescriptor::snapshot(&path).await.unwrap();
        assert!(schema.tables.iter().all(|t| t.name != "query_history"));
    }
}
