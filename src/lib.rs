//! Queryloom - Natural-Language-to-SQL Translation Service
//!
//! This crate turns plain-English questions into read-only SQLite
//! queries, runs them, and keeps a browsable history of everything it
//! executed:
//!
//! - **Multi-provider translation**: OpenAI, Anthropic, Ollama, plus
//!   local CLI agents, with ordered fallback between them
//! - **SQL guarding**: only a single `SELECT` statement ever reaches
//!   the database, enforced by extraction and keyword validation
//! - **Read-only execution**: queries run on a read-only connection
//!   with `query_only` pinned on
//! - **Query history**: every successful run is recorded with its
//!   results and a generated display name
//!
//! # Architecture
//!
//! The service is organized into several key modules:
//!
//! - [`config`]: Configuration management and environment loading
//! - [`provider`]: Translation backend abstractions and implementations
//! - [`prompt`]: System prompts and schema-aware prompt assembly
//! - [`sqlguard`]: SQL extraction and safety validation
//! - [`executor`]: Read-only query execution
//! - [`history`]: Append-only query history store
//! - [`insights`]: Per-column statistical summaries
//! - [`api`]: HTTP API endpoints
//!
//! # Example
//!
//! ```rust,ignore
//! use queryloom::{config::AppConfig, server::create_app};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::load()?;
//!     let app = create_app(config).await?;
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8765").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod api;
pub mod config;
pub mod error;
pub mod executor;
pub mod history;
pub mod insights;
pub mod logging;
pub mod naming;
pub mod prompt;
pub mod provider;
pub mod schema;
pub mod server;
pub mod service;
pub mod sqlguard;

use std::sync::Arc;

use config::AppConfig;
use service::QueryService;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Translation and execution service.
    pub service: Arc<QueryService>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &"AppConfig")
            .field("service", &"QueryService")
            .finish()
    }
}
