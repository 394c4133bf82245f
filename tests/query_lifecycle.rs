//! End-to-end test for the translate-execute-record lifecycle.
//!
//! This test validates:
//! - Translation through a backend, SQL extraction, and execution
//! - History recording with display names and result payloads
//! - Rejection of unsafe SQL before anything touches the database
//! - Display-name fallback when labeling fails

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::Connection;
use tempfile::TempDir;

use queryloom::error::QueryError;
use queryloom::provider::{
    ProviderClass, ProviderError, ProviderId, ProviderRouter, TranslationBackend,
};
use queryloom::service::QueryService;

/// Scripted backend returning fixed translation and label text.
struct ScriptedBackend {
    translation: String,
    label: Option<String>,
}

#[async_trait]
impl TranslationBackend for ScriptedBackend {
    fn id(&self) -> ProviderId {
        ProviderId::Openai
    }

    fn class(&self) -> ProviderClass {
        ProviderClass::HostedApi
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn translate(&self, _prompt: &str, _timeout: Duration) -> Result<String, ProviderError> {
        Ok(self.translation.clone())
    }

    async fn label(&self, _prompt: &str, _timeout: Duration) -> Result<String, ProviderError> {
        match &self.label {
            Some(text) => Ok(text.clone()),
            None => Err(ProviderError::Backend(
                ProviderId::Openai,
                "label model offline".to_string(),
            )),
        }
    }
}

/// Create a temp database with a small `users` table.
fn seed_database(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("queryloom.db");
    let conn = Connection::open(&path).expect("open seed db");
    conn.execute_batch(
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, signup_date TEXT);
         INSERT INTO users (name, signup_date) VALUES
            ('Ada', '2026-01-04'),
            ('Grace', '2026-02-11'),
            ('Edsger', '2026-03-19');",
    )
    .expect("seed users table");
    path
}

async fn service_with(backend: ScriptedBackend, db_path: std::path::PathBuf) -> QueryService {
    let router = Arc::new(ProviderRouter::new(
        vec![Arc::new(backend)],
        None,
        Duration::from_secs(5),
    ));
    QueryService::new(router, db_path)
        .await
        .expect("create service")
}

#[tokio::test]
async fn translates_executes_and_records() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = seed_database(&dir);
    let service = service_with(
        ScriptedBackend {
            translation: "```sql\nSELECT * FROM users;\n```".to_string(),
            label: Some("\"All users\"".to_string()),
        },
        db_path,
    )
    .await;

    let outcome = service
        .translate_and_run("show me all users", None)
        .await
        .expect("lifecycle should succeed");

    assert_eq!(outcome.sql, "SELECT * FROM users;");
    assert_eq!(outcome.provider, ProviderId::Openai);
    assert_eq!(outcome.result.row_count, 3);
    assert_eq!(outcome.result.columns, vec!["id", "name", "signup_date"]);
    assert_eq!(outcome.result.rows[0]["name"], "Ada");

    // The run must be visible in history, newest first.
    let summaries = service.list_history().await.expect("list history");
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].id, outcome.history_id);
    assert_eq!(summaries[0].query_text, "show me all users");
    assert_eq!(summaries[0].sql, "SELECT * FROM users;");
    assert_eq!(summaries[0].display_name, "All users");
    assert_eq!(summaries[0].row_count, 3);

    // Full record carries the result payload.
    let record = service
        .get_history(outcome.history_id)
        .await
        .expect("get history");
    assert_eq!(record.columns, vec!["id", "name", "signup_date"]);
    assert_eq!(record.rows.len(), 3);
    assert_eq!(record.rows[2]["name"], "Edsger");
}

#[tokio::test]
async fn unsafe_sql_is_rejected_and_not_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = seed_database(&dir);
    let service = service_with(
        ScriptedBackend {
            translation: "DELETE FROM users;".to_string(),
            label: Some("oops".to_string()),
        },
        db_path.clone(),
    )
    .await;

    let err = service
        .translate_and_run("remove everyone", None)
        .await
        .expect_err("mutation must be rejected");
    match err {
        QueryError::UnsafeOrInvalidSql { rule, .. } => assert_eq!(rule, "not_a_select"),
        other => panic!("unexpected error: {other:?}"),
    }

    // Nothing may be recorded, and the table is untouched.
    assert!(service.list_history().await.unwrap().is_empty());
    let conn = Connection::open(&db_path).unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 3);
}

#[tokio::test]
async fn stacked_statements_keep_only_the_first() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = seed_database(&dir);
    let service = service_with(
        ScriptedBackend {
            translation: "SELECT * FROM users; DROP TABLE users;".to_string(),
            label: None,
        },
        db_path.clone(),
    )
    .await;

    // Extraction cuts at the first separator, so only the SELECT runs.
    let outcome = service
        .translate_and_run("list users", None)
        .await
        .expect("first statement should run");
    assert_eq!(outcome.sql, "SELECT * FROM users;");

    let conn = Connection::open(&db_path).unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 3);
}

#[tokio::test]
async fn denied_keyword_in_select_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = seed_database(&dir);
    let service = service_with(
        ScriptedBackend {
            translation: "SELECT * FROM users WHERE id IN (DELETE FROM users)".to_string(),
            label: None,
        },
        db_path,
    )
    .await;

    let err = service
        .translate_and_run("list users", None)
        .await
        .expect_err("denied keyword must be rejected");
    match err {
        QueryError::UnsafeOrInvalidSql { rule, .. } => assert_eq!(rule, "denied_keyword"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn display_name_falls_back_when_labeling_fails() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = seed_database(&dir);
    let service = service_with(
        ScriptedBackend {
            translation: "SELECT name FROM users".to_string(),
            label: None,
        },
        db_path,
    )
    .await;

    let long_query = "names of every user who signed up before the start of the fiscal year";
    let outcome = service
        .translate_and_run(long_query, None)
        .await
        .expect("labeling failure must not fail the request");

    let summaries = service.list_history().await.unwrap();
    assert_eq!(summaries[0].id, outcome.history_id);
    // Fallback is the query text truncated to 50 characters.
    assert_eq!(summaries[0].display_name, &long_query[..50]);
}

#[tokio::test]
async fn empty_query_is_rejected_up_front() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = seed_database(&dir);
    let service = service_with(
        ScriptedBackend {
            translation: "SELECT 1".to_string(),
            label: None,
        },
        db_path,
    )
    .await;

    let err = service
        .translate_and_run("   \n", None)
        .await
        .expect_err("blank query must be rejected");
    assert!(matches!(err, QueryError::EmptyQuery));
}

#[tokio::test]
async fn history_lookup_for_missing_id_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = seed_database(&dir);
    let service = service_with(
        ScriptedBackend {
            translation: "SELECT 1".to_string(),
            label: None,
        },
        db_path,
    )
    .await;

    let err = service.get_history(9999).await.expect_err("no such record");
    assert!(matches!(err, QueryError::NotFound(9999)));
}
