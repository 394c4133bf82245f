//! Read-only SQL execution.
//!
//! Runs sanitized SQL against the SQLite database and shapes the result.
//! The connection is opened read-only with the `query_only` pragma set,
//! so even a statement the sanitizer somehow let through cannot write.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use base64::Engine as _;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use tokio::task;

use crate::error::QueryError;

/// Tabular result of one executed query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Column names in statement order.
    pub columns: Vec<String>,
    /// Rows as column-to-value mappings.
    pub rows: Vec<serde_json::Map<String, serde_json::Value>>,
    /// Number of rows returned.
    pub row_count: usize,
    /// Wall-clock execution time in milliseconds.
    pub duration_ms: f64,
}

/// Read-only query executor over one SQLite database file.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    db_path: PathBuf,
}

impl QueryExecutor {
    /// Create an executor for the database at `path`.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            db_path: path.into(),
        }
    }

    /// Execute sanitized SQL and shape the result.
    ///
    /// Storage-engine errors (unknown column/table, syntax the sanitizer
    /// did not catch) surface as [`QueryError::ExecutionFailed`] with the
    /// engine's message; they are not retried.
    pub async fn execute(&self, sql: &str) -> Result<ExecutionResult, QueryError> {
        let sql = sql.to_string();
        let db_path = self.db_path.clone();
        let started = Instant::now();

        let (columns, rows) = task::spawn_blocking(
            move || -> Result<(Vec<String>, Vec<serde_json::Map<String, serde_json::Value>>), QueryError> {
                let conn = Connection::open_with_flags(
                    &db_path,
                    OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
                )
                .map_err(|e| QueryError::ExecutionFailed(e.to_string()))?;
                conn.pragma_update(None, "query_only", "ON")
                    .map_err(|e| QueryError::ExecutionFailed(e.to_string()))?;

                let mut stmt = conn
                    .prepare(&sql)
                    .map_err(|e| QueryError::ExecutionFailed(e.to_string()))?;
                let columns: Vec<String> =
                    stmt.column_names().into_iter().map(String::from).collect();

                let mut rows = Vec::new();
                let mut result_rows = stmt
                    .query([])
                    .map_err(|e| QueryError::ExecutionFailed(e.to_string()))?;
                while let Some(row) = result_rows
                    .next()
                    .map_err(|e| QueryError::ExecutionFailed(e.to_string()))?
                {
                    let mut mapped = serde_json::Map::with_capacity(columns.len());
                    for (i, name) in columns.iter().enumerate() {
                        let value = row
                            .get_ref(i)
                            .map_err(|e| QueryError::ExecutionFailed(e.to_string()))?;
                        mapped.insert(name.clone(), value_to_json(value));
                    }
                    rows.push(mapped);
                }

                Ok((columns, rows))
            },
        )
        .await
        .context("Failed to spawn blocking task")??;

        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        let row_count = rows.len();

        tracing::debug!(row_count, duration_ms, "Query executed");

        Ok(ExecutionResult {
            columns,
            rows,
            row_count,
            duration_ms,
        })
    }
}

/// Convert a SQLite value to JSON. Blobs are base64 encoded.
pub(crate) fn value_to_json(value: ValueRef<'_>) -> serde_json::Value {
    match value {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(i) => serde_json::Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map_or(serde_json::Value::Null, serde_json::Value::Number),
        ValueRef::Text(t) => serde_json::Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => {
            serde_json::Value::String(base64::engine::general_purpose::STANDARD.encode(b))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn seeded_db(dir: &Path) -> PathBuf {
        let path = dir.join("exec.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, score REAL);
             INSERT INTO users (name, score) VALUES ('ada', 9.5);
             INSERT INTO users (name, score) VALUES ('grace', 8.0);
             INSERT INTO users (name, score) VALUES (NULL, NULL);",
        )
        .unwrap();
        path
    }

    #[tokio::test]
    async fn select_shapes_columns_rows_and_count() {
        let dir = tempfile::tempdir().unwrap();
        let executor = QueryExecutor::new(seeded_db(dir.path()));

        let result = executor
            .execute("SELECT id, name, score FROM users ORDER BY id")
            .await
            .unwrap();

        assert_eq!(result.columns, ["id", "name", "score"]);
        assert_eq!(result.row_count, 3);
        assert_eq!(result.rows[0]["name"], "ada");
        assert_eq!(result.rows[0]["score"], 9.5);
        assert_eq!(result.rows[2]["name"], serde_json::Value::Null);
        assert!(result.duration_ms >= 0.0);
    }

    #[tokio::test]
    async fn engine_errors_surface_as_execution_failed() {
        let dir = tempfile::tempdir().unwrap();
        let executor = QueryExecutor::new(seeded_db(dir.path()));

        let err = executor
            .execute("SELECT nope FROM users")
            .await
            .unwrap_err();
        match err {
            QueryError::ExecutionFailed(msg) => assert!(msg.contains("nope")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn writes_are_blocked_at_the_connection() {
        let dir = tempfile::tempdir().unwrap();
        let executor = QueryExecutor::new(seeded_db(dir.path()));

        // The sanitizer rejects this upstream; the read-only connection
        // must refuse it too.
        let err = executor.execute("DELETE FROM users").await.unwrap_err();
        assert!(matches!(err, QueryError::ExecutionFailed(_)));
    }
}
