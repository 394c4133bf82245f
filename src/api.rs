//! HTTP API endpoints.
//!
//! The outer web shell owns routing concerns beyond these paths; this
//! router only exposes the translate / history contracts plus a health
//! probe.

use std::str::FromStr;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::QueryError;
use crate::history::{HistoryRecord, HistorySummary};
use crate::insights::ColumnInsight;
use crate::provider::{ProviderError, ProviderId, RouteError};
use crate::AppState;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/query", post(translate_query))
        .route("/api/query-history", get(list_history))
        .route("/api/query-history/{id}", get(get_history))
        .route("/api/insights/{table}", get(table_insights))
}

/// Translation request body.
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    /// Natural-language query text.
    pub query: String,
    /// Optional provider override.
    pub provider: Option<String>,
}

/// Translation response body.
#[derive(Debug, Serialize)]
pub struct QueryResponse {
    /// The SQL that was executed.
    pub sql: String,
    /// Provider that produced the SQL.
    pub provider: ProviderId,
    /// Assigned history record id.
    pub history_id: i64,
    /// Result column names.
    pub columns: Vec<String>,
    /// Result rows.
    pub rows: Vec<serde_json::Map<String, serde_json::Value>>,
    /// Number of result rows.
    pub row_count: usize,
    /// Execution wall-clock time in milliseconds.
    pub duration_ms: f64,
}

/// History list response body.
#[derive(Debug, Serialize)]
pub struct HistoryListResponse {
    /// Recorded queries, newest first.
    pub queries: Vec<HistorySummary>,
}

/// Insights query parameters.
#[derive(Debug, Deserialize)]
pub struct InsightsParams {
    /// Comma-separated column filter; all columns when absent.
    pub columns: Option<String>,
}

/// Insights response body.
#[derive(Debug, Serialize)]
pub struct InsightsResponse {
    /// Table the insights describe.
    pub table: String,
    /// One entry per analyzed column, in declaration order.
    pub insights: Vec<ColumnInsight>,
}

/// Structured API error body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    kind: &'static str,
    message: String,
}

impl IntoResponse for QueryError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::EmptyQuery
            | Self::UnknownProvider(_)
            | Self::InvalidIdentifier(_)
            | Self::UnsafeOrInvalidSql { .. }
            | Self::ExecutionFailed(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Translation(RouteError::Provider(ProviderError::Timeout(..))) => {
                StatusCode::GATEWAY_TIMEOUT
            }
            Self::Translation(RouteError::Provider(ProviderError::Backend(..))) => {
                StatusCode::BAD_GATEWAY
            }
            Self::Translation(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(kind = self.kind(), error = %self, "Request failed");
        } else {
            tracing::debug!(kind = self.kind(), error = %self, "Request rejected");
        }

        let body = Json(ErrorBody {
            error: ErrorDetail {
                kind: self.kind(),
                message: self.to_string(),
            },
        });
        (status, body).into_response()
    }
}

/// Health probe.
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Translate a natural-language query, execute it, and record it.
async fn translate_query(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, QueryError> {
    let requested = req
        .provider
        .as_deref()
        .map(ProviderId::from_str)
        .transpose()
        .map_err(|e| QueryError::UnknownProvider(e.0))?;

    let outcome = state
        .service
        .translate_and_run(&req.query, requested)
        .await?;

    Ok(Json(QueryResponse {
        sql: outcome.sql,
        provider: outcome.provider,
        history_id: outcome.history_id,
        columns: outcome.result.columns,
        rows: outcome.result.rows,
        row_count: outcome.result.row_count,
        duration_ms: outcome.result.duration_ms,
    }))
}

/// List recorded queries, newest first.
async fn list_history(
    State(state): State<AppState>,
) -> Result<Json<HistoryListResponse>, QueryError> {
    let queries = state.service.list_history().await?;
    Ok(Json(HistoryListResponse { queries }))
}

/// Per-column statistics for one table.
async fn table_insights(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Query(params): Query<InsightsParams>,
) -> Result<Json<InsightsResponse>, QueryError> {
    let columns = params
        .columns
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect::<Vec<_>>()
        })
        .filter(|v| !v.is_empty());

    let insights = state.service.table_insights(&table, columns).await?;
    Ok(Json(InsightsResponse { table, insights }))
}

/// Fetch one full history record.
async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<HistoryRecord>, QueryError> {
    let record = state.service.get_history(id).await?;
    Ok(Json(record))
}
