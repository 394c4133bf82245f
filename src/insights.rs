//! Per-column statistical insights.
//!
//! Summarizes one table's columns straight from the database: distinct
//! and null counts for every column, min/max/avg for numeric columns,
//! and the five most common values. Table and column names are validated
//! against the live schema before any interpolation, and the work runs
//! on a read-only connection like query execution.

use std::path::PathBuf;

use anyhow::Context;
use rusqlite::{Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use tokio::task;

use crate::error::QueryError;
use crate::executor::value_to_json;
use crate::history::HISTORY_TABLE;
use crate::schema::valid_identifier;

/// How many of the most frequent values each insight carries.
const MOST_COMMON_LIMIT: u32 = 5;

/// A value with its occurrence count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommonValue {
    /// The stored value.
    pub value: serde_json::Value,
    /// Number of rows holding it.
    pub count: i64,
}

/// Statistical summary of one column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInsight {
    /// Column name.
    pub column_name: String,
    /// Declared SQL type.
    pub data_type: String,
    /// Number of distinct non-null values.
    pub unique_values: i64,
    /// Number of null rows.
    pub null_count: i64,
    /// Minimum value, numeric columns only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_value: Option<serde_json::Value>,
    /// Maximum value, numeric columns only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_value: Option<serde_json::Value>,
    /// Mean value, numeric columns only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_value: Option<f64>,
    /// Up to five most frequent non-null values, most frequent first.
    pub most_common: Vec<CommonValue>,
}

/// Generate insights for `table`, optionally restricted to `columns`.
pub async fn for_table(
    db_path: PathBuf,
    table: String,
    columns: Option<Vec<String>>,
) -> Result<Vec<ColumnInsight>, QueryError> {
    task::spawn_blocking(move || -> Result<Vec<ColumnInsight>, QueryError> {
        let conn = Connection::open_with_flags(
            &db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| QueryError::ExecutionFailed(e.to_string()))?;
        insights_blocking(&conn, &table, columns.as_deref())
    })
    .await
    .context("Failed to spawn blocking task")?
}

fn insights_blocking(
    conn: &Connection,
    table: &str,
    requested: Option<&[String]>,
) -> Result<Vec<ColumnInsight>, QueryError> {
    let exec = |e: rusqlite::Error| QueryError::ExecutionFailed(e.to_string());

    if !valid_identifier(table) {
        return Err(QueryError::InvalidIdentifier(format!(
            "invalid table name: {table}"
        )));
    }

    let known: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get(0),
        )
        .map_err(exec)?;
    if known == 0 || table.starts_with("sqlite_") || table == HISTORY_TABLE {
        return Err(QueryError::InvalidIdentifier(format!(
            "table '{table}' does not exist"
        )));
    }

    // Identifier-checked above, safe to interpolate.
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .map_err(exec)?;
    let columns: Vec<(String, String)> = stmt
        .query_map([], |row| Ok((row.get(1)?, row.get(2)?)))
        .map_err(exec)?
        .collect::<Result<_, _>>()
        .map_err(exec)?;

    if let Some(requested) = requested {
        for name in requested {
            if !valid_identifier(name) {
                return Err(QueryError::InvalidIdentifier(format!(
                    "invalid column name: {name}"
                )));
            }
            if !columns.iter().any(|(c, _)| c == name) {
                return Err(QueryError::InvalidIdentifier(format!(
                    "column '{name}' does not exist in table '{table}'"
                )));
            }
        }
    }

    let mut insights = Vec::new();
    for (name, data_type) in &columns {
        if let Some(requested) = requested {
            if !requested.iter().any(|r| r == name) {
                continue;
            }
        }

        let unique_values: i64 = conn
            .query_row(
                &format!("SELECT COUNT(DISTINCT {name}) FROM {table}"),
                [],
                |row| row.get(0),
            )
            .map_err(exec)?;
        let null_count: i64 = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM {table} WHERE {name} IS NULL"),
                [],
                |row| row.get(0),
            )
            .map_err(exec)?;

        let numeric = matches!(
            data_type.to_ascii_uppercase().as_str(),
            "INTEGER" | "REAL" | "NUMERIC"
        );
        let (min_value, max_value, avg_value) = if numeric {
            conn.query_row(
                &format!(
                    "SELECT MIN({name}), MAX({name}), AVG({name})
                     FROM {table} WHERE {name} IS NOT NULL"
                ),
                [],
                |row| {
                    Ok((
                        Some(value_to_json(row.get_ref(0)?)),
                        Some(value_to_json(row.get_ref(1)?)),
                        row.get::<_, Option<f64>>(2)?,
                    ))
                },
            )
            .map_err(exec)?
        } else {
            (None, None, None)
        };

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {name}, COUNT(*) AS count FROM {table}
                 WHERE {name} IS NOT NULL
                 GROUP BY {name} ORDER BY count DESC LIMIT {MOST_COMMON_LIMIT}"
            ))
            .map_err(exec)?;
        let most_common = stmt
            .query_map([], |row| {
                Ok(CommonValue {
                    value: value_to_json(row.get_ref(0)?),
                    count: row.get(1)?,
                })
            })
            .map_err(exec)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(exec)?;

        insights.push(ColumnInsight {
            column_name: name.clone(),
            data_type: data_type.clone(),
            unique_values,
            null_count,
            min_value,
            max_value,
            avg_value,
            most_common,
        });
    }

    Ok(insights)
}
