//! Durable query history log.
//!
//! An append-only SQLite table records every successfully executed query:
//! the original text, the generated SQL, the display name, and the
//! serialized result. Records are immutable once written and never deleted
//! by this crate. All database work runs on `tokio::task::spawn_blocking`;
//! id assignment is atomic per insert, so concurrent appends never collide.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tokio::task;

/// Name of the history table, excluded from schema snapshots.
pub const HISTORY_TABLE: &str = "query_history";

/// A history record before id assignment.
#[derive(Debug, Clone)]
pub struct NewHistoryRecord {
    /// Original natural-language query.
    pub query_text: String,
    /// Generated, sanitized SQL.
    pub sql: String,
    /// Short human-readable label.
    pub display_name: String,
    /// Result column names.
    pub columns: Vec<String>,
    /// Result rows.
    pub rows: Vec<serde_json::Map<String, serde_json::Value>>,
    /// Number of result rows.
    pub row_count: usize,
    /// Execution wall-clock time in milliseconds.
    pub duration_ms: f64,
}

/// Summary of a recorded query, without result payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySummary {
    /// Record id.
    pub id: i64,
    /// Original natural-language query.
    pub query_text: String,
    /// Generated SQL.
    pub sql: String,
    /// Short human-readable label.
    pub display_name: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Number of result rows.
    pub row_count: i64,
    /// Execution wall-clock time in milliseconds.
    pub duration_ms: f64,
}

/// Full recorded query, including the result payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Record id.
    pub id: i64,
    /// Original natural-language query.
    pub query_text: String,
    /// Generated SQL.
    pub sql: String,
    /// Short human-readable label.
    pub display_name: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Result column names.
    pub columns: Vec<String>,
    /// Result rows.
    pub rows: Vec<serde_json::Map<String, serde_json::Value>>,
    /// Number of result rows.
    pub row_count: i64,
    /// Execution wall-clock time in milliseconds.
    pub duration_ms: f64,
}

/// Append-only history store backed by SQLite.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    db_path: PathBuf,
}

impl HistoryStore {
    /// Open the store, creating the table and index when absent.
    ///
    /// Initialization is idempotent; calling it on every process start
    /// never alters existing data.
    pub async fn new<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let store = Self {
            db_path: path.into(),
        };
        store.migrate_schema().await?;
        Ok(store)
    }

    async fn migrate_schema(&self) -> Result<()> {
        let db_path = self.db_path.clone();

        task::spawn_blocking(move || -> Result<()> {
            let conn = open(&db_path)?;

            conn.pragma_update(None, "journal_mode", "WAL")
                .context("Failed to enable WAL mode")?;

            conn.execute(
                r"
                CREATE TABLE IF NOT EXISTS query_history (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    query_text TEXT NOT NULL,
                    sql TEXT NOT NULL,
                    display_name TEXT NOT NULL,
                    created_at INTEGER NOT NULL,
                    columns TEXT NOT NULL,
                    rows TEXT NOT NULL,
                    row_count INTEGER NOT NULL DEFAULT 0,
                    duration_ms REAL NOT NULL DEFAULT 0
                )
                ",
                [],
            )
            .context("Failed to create query_history table")?;

            conn.execute(
                "CREATE INDEX IF NOT EXISTS idx_query_history_created_at
                 ON query_history(created_at DESC, id DESC)",
                [],
            )
            .context("Failed to create query_history index")?;

            Ok(())
        })
        .await
        .context("Failed to spawn blocking task")?
    }

    /// Append a record and return its assigned id.
    ///
    /// Existing rows are never overwritten or mutated.
    pub async fn append(&self, record: NewHistoryRecord) -> Result<i64> {
        let db_path = self.db_path.clone();

        task::spawn_blocking(move || -> Result<i64> {
            let conn = open(&db_path)?;
            let created_at = Utc::now().timestamp_millis();
            let columns_json =
                serde_json::to_string(&record.columns).context("Failed to serialize columns")?;
            let rows_json =
                serde_json::to_string(&record.rows).context("Failed to serialize rows")?;

            conn.execute(
                r"
                INSERT INTO query_history
                    (query_text, sql, display_name, created_at, columns, rows, row_count, duration_ms)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ",
                params![
                    &record.query_text,
                    &record.sql,
                    &record.display_name,
                    created_at,
                    &columns_json,
                    &rows_json,
                    record.row_count as i64,
                    record.duration_ms,
                ],
            )
            .context("Failed to insert history record")?;

            Ok(conn.last_insert_rowid())
        })
        .await
        .context("Failed to spawn blocking task")?
    }

    /// List all recorded queries, newest first (ties broken by id).
    pub async fn list_recent(&self) -> Result<Vec<HistorySummary>> {
        let db_path = self.db_path.clone();

        task::spawn_blocking(move || -> Result<Vec<HistorySummary>> {
            let conn = open(&db_path)?;

            let mut stmt = conn.prepare(
                r"
                SELECT id, query_text, sql, display_name, created_at, row_count, duration_ms
                FROM query_history
                ORDER BY created_at DESC, id DESC
                ",
            )?;

            let summaries = stmt
                .query_map([], |row| {
                    Ok(HistorySummary {
                        id: row.get(0)?,
                        query_text: row.get(1)?,
                        sql: row.get(2)?,
                        display_name: row.get(3)?,
                        created_at: timestamp(row.get(4)?),
                        row_count: row.get(5)?,
                        duration_ms: row.get(6)?,
                    })
                })
                .context("Failed to query history")?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(summaries)
        })
        .await
        .context("Failed to spawn blocking task")?
    }

    /// Fetch one full record by id.
    pub async fn get(&self, id: i64) -> Result<Option<HistoryRecord>> {
        let db_path = self.db_path.clone();

        task::spawn_blocking(move || -> Result<Option<HistoryRecord>> {
            let conn = open(&db_path)?;

            let record = conn
                .query_row(
                    r"
                    SELECT id, query_text, sql, display_name, created_at, columns, rows,
                           row_count, duration_ms
                    FROM query_history
                    WHERE id = ?1
                    ",
                    params![id],
                    |row| {
                        let columns_json: String = row.get(5)?;
                        let rows_json: String = row.get(6)?;
                        Ok(HistoryRecord {
                            id: row.get(0)?,
                            query_text: row.get(1)?,
                            sql: row.get(2)?,
                            display_name: row.get(3)?,
                            created_at: timestamp(row.get(4)?),
                            columns: serde_json::from_str(&columns_json).unwrap_or_default(),
                            rows: serde_json::from_str(&rows_json).unwrap_or_default(),
                            row_count: row.get(7)?,
                            duration_ms: row.get(8)?,
                        })
                    },
                )
                .optional()
                .context("Failed to query history record")?;

            Ok(record)
        })
        .await
        .context("Failed to spawn blocking task")?
    }
}

fn open(db_path: &std::path::Path) -> Result<Connection> {
    let conn = Connection::open(db_path).context("Failed to open database")?;
    conn.busy_timeout(std::time::Duration::from_secs(5))
        .context("Failed to set busy timeout")?;
    Ok(conn)
}

fn timestamp(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}
