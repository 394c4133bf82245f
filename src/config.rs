//! Configuration management for Queryloom.
//!
//! Configuration is loaded once at startup from defaults, an optional
//! `config/queryloom.yaml` file, `QUERYLOOM__`-prefixed environment
//! variables, and a handful of well-known provider variables
//! (`OPENAI_API_KEY`, `ANTHROPIC_API_KEY`, `OLLAMA_BASE_URL`, ...).
//! The resulting [`AppConfig`] is immutable afterwards and passed by
//! reference into request handling; nothing reads ambient process state
//! per request.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::provider::ProviderId;

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server bind configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// SQLite database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Translation routing configuration.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Per-provider backend configuration.
    #[serde(default)]
    pub providers: ProvidersConfig,
}

/// Server bind configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8765,
        }
    }
}

/// SQLite database configuration.
///
/// One file holds both the user's data tables and the append-only
/// `query_history` log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("db/queryloom.db"),
        }
    }
}

/// Translation routing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Process-wide default provider, tried right after any request-level
    /// override.
    pub default_provider: Option<ProviderId>,
    /// Per-call timeout for backend invocations, in seconds.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            default_provider: None,
            timeout_secs: 60,
        }
    }
}

impl LlmConfig {
    /// Backend call timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Per-provider backend configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// OpenAI chat completions API.
    #[serde(default)]
    pub openai: OpenAiConfig,
    /// Anthropic messages API.
    #[serde(default)]
    pub anthropic: AnthropicConfig,
    /// Local Ollama server.
    #[serde(default)]
    pub ollama: OllamaConfig,
    /// Local CLI agents.
    #[serde(default)]
    pub cli: CliConfig,
}

/// OpenAI backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// API key; the backend is unavailable without one.
    pub api_key: Option<String>,
    /// Base URL for the API.
    pub base_url: String,
    /// Model identifier.
    pub model: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-4.1-mini".to_string(),
        }
    }
}

/// Anthropic backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnthropicConfig {
    /// API key; the backend is unavailable without one.
    pub api_key: Option<String>,
    /// Base URL for the API.
    pub base_url: String,
    /// Model identifier.
    pub model: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.anthropic.com".to_string(),
            model: "claude-3-5-haiku-latest".to_string(),
        }
    }
}

/// Ollama backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Whether the backend participates in routing at all.
    pub enabled: bool,
    /// Base URL of the Ollama server.
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// Context window size. Larger schemas need a larger window.
    pub num_ctx: u32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://localhost:11434".to_string(),
            model: "deepseek-r1:8b".to_string(),
            num_ctx: 4096,
        }
    }
}

/// CLI agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Binary name for the Claude CLI.
    pub claude_binary: String,
    /// Binary name for the Cursor agent CLI.
    pub cursor_agent_binary: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            claude_binary: "claude".to_string(),
            cursor_agent_binary: "cursor-agent".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, config file, and environment.
    pub fn load() -> anyhow::Result<Self> {
        // Load .env file if present
        let _ = dotenvy::dotenv();

        let config = config::Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8765)?
            .set_default("llm.timeout_secs", 60)?
            .add_source(config::File::with_name("config/queryloom").required(false))
            .add_source(
                config::Environment::with_prefix("QUERYLOOM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut app_config: AppConfig = config
            .try_deserialize()
            .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

        // Provider API keys and endpoints follow the conventional variable
        // names rather than the QUERYLOOM__ prefix.
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            app_config.providers.openai.api_key = Some(key);
        }
        if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
            app_config.providers.anthropic.api_key = Some(key);
        }
        if let Ok(url) = std::env::var("OLLAMA_BASE_URL") {
            app_config.providers.ollama.base_url = url;
        }
        if let Ok(model) = std::env::var("OLLAMA_MODEL") {
            app_config.providers.ollama.model = model;
        }
        if let Ok(ctx) = std::env::var("OLLAMA_NUM_CTX") {
            match ctx.parse() {
                Ok(n) => app_config.providers.ollama.num_ctx = n,
                Err(_) => tracing::warn!(value = %ctx, "Ignoring invalid OLLAMA_NUM_CTX"),
            }
        }

        if let Ok(name) = std::env::var("QUERYLOOM_DEFAULT_PROVIDER") {
            match ProviderId::from_str(&name) {
                Ok(id) => app_config.llm.default_provider = Some(id),
                Err(e) => tracing::warn!(error = %e, "Ignoring QUERYLOOM_DEFAULT_PROVIDER"),
            }
        }
        if let Ok(path) = std::env::var("QUERYLOOM_DB_PATH") {
            app_config.database.path = PathBuf::from(path);
        }
        if let Ok(secs) = std::env::var("QUERYLOOM_LLM_TIMEOUT_SECS") {
            match secs.parse() {
                Ok(n) => app_config.llm.timeout_secs = n,
                Err(_) => {
                    tracing::warn!(value = %secs, "Ignoring invalid QUERYLOOM_LLM_TIMEOUT_SECS");
                }
            }
        }

        Ok(app_config)
    }
}
