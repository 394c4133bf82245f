//! Translate-execute-record pipeline.
//!
//! One [`QueryService`] instance handles all requests. Within one request
//! the steps run strictly sequentially: schema snapshot, routed
//! translation, sanitization, read-only execution, labeling, history
//! append. Sanitizer and router failures abort before execution, and
//! execution failures abort before persistence, so only successfully
//! executed queries are ever recorded.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use crate::error::QueryError;
use crate::executor::{ExecutionResult, QueryExecutor};
use crate::history::{HistoryRecord, HistoryStore, HistorySummary, NewHistoryRecord};
use crate::insights::{self, ColumnInsight};
use crate::naming;
use crate::prompt;
use crate::provider::{ProviderId, ProviderRouter};
use crate::schema::SchemaDescriptor;
use crate::sqlguard;

/// Outcome of one completed translation request.
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    /// Assigned history record id.
    pub history_id: i64,
    /// The sanitized SQL that was executed.
    pub sql: String,
    /// Provider that produced the SQL.
    pub provider: ProviderId,
    /// Execution result.
    pub result: ExecutionResult,
}

/// The translation-routing-persistence core.
pub struct QueryService {
    router: Arc<ProviderRouter>,
    executor: QueryExecutor,
    history: HistoryStore,
    db_path: PathBuf,
}

impl std::fmt::Debug for QueryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryService")
            .field("router", &self.router)
            .field("db_path", &self.db_path)
            .finish()
    }
}

impl QueryService {
    /// Create the service over one database file and a configured router.
    pub async fn new<P: Into<PathBuf>>(
        router: Arc<ProviderRouter>,
        db_path: P,
    ) -> anyhow::Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
        let history = HistoryStore::new(db_path.clone()).await?;
        let executor = QueryExecutor::new(db_path.clone());

        Ok(Self {
            router,
            executor,
            history,
            db_path,
        })
    }

    /// Translate a natural-language query, execute it, and record it.
    pub async fn translate_and_run(
        &self,
        query_text: &str,
        requested: Option<ProviderId>,
    ) -> Result<QueryOutcome, QueryError> {
        if query_text.trim().is_empty() {
            return Err(QueryError::EmptyQuery);
        }

        let schema = SchemaDescriptor::snapshot(&self.db_path).await?;
        if schema.is_empty() {
            tracing::warn!("No queryable tables in the database, translation will lack context");
        }
        let translation_prompt = prompt::translation_prompt(query_text, &schema);

        let routed = self.router.translate(&translation_prompt, requested).await?;
        tracing::debug!(provider = %routed.provider, "Translation received");

        let sql = sqlguard::extract_and_validate(&routed.text)?;
        let result = self.executor.execute(&sql).await?;

        // Labeling never fails the request; any error falls back to a
        // truncation of the query text.
        let display_name = naming::generate(&self.router, query_text, &sql, requested).await;

        let history_id = self
            .history
            .append(NewHistoryRecord {
                query_text: query_text.to_string(),
                sql: sql.clone(),
                display_name,
                columns: result.columns.clone(),
                rows: result.rows.clone(),
                row_count: result.row_count,
                duration_ms: result.duration_ms,
            })
            .await?;

        tracing::info!(
            history_id,
            provider = %routed.provider,
            row_count = result.row_count,
            "Query translated and recorded"
        );

        Ok(QueryOutcome {
            history_id,
            sql,
            provider: routed.provider,
            result,
        })
    }

    /// Per-column statistics for one table.
    pub async fn table_insights(
        &self,
        table: &str,
        columns: Option<Vec<String>>,
    ) -> Result<Vec<ColumnInsight>, QueryError> {
        insights::for_table(self.db_path.clone(), table.to_string(), columns).await
    }

    /// List recorded queries, newest first.
    pub async fn list_history(&self) -> Result<Vec<HistorySummary>, QueryError> {
        Ok(self.history.list_recent().await?)
    }

    /// Fetch one full history record.
    pub async fn get_history(&self, id: i64) -> Result<HistoryRecord, QueryError> {
        self.history
            .get(id)
            .await?
            .ok_or(QueryError::NotFound(id))
    }
}
