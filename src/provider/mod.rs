//! Translation backend traits and implementations.
//!
//! This module provides the uniform abstraction over the language-model
//! backends that turn a schema-annotated prompt into SQL text. Hosted HTTP
//! APIs (OpenAI, Anthropic, Ollama) and local CLI agents (claude,
//! cursor-agent) all implement the same [`TranslationBackend`] capability
//! pair, so the [`router::ProviderRouter`] never branches on provider names.
//!
//! # Backends
//!
//! - [`OpenAiBackend`]: OpenAI chat completions API
//! - [`AnthropicBackend`]: Anthropic messages API
//! - [`OllamaBackend`]: local Ollama server
//! - [`CliAgentBackend`]: subprocess-backed CLI agents

mod anthropic;
mod cli;
mod ollama;
mod openai;
pub mod router;

pub use anthropic::AnthropicBackend;
pub use cli::CliAgentBackend;
pub use ollama::OllamaBackend;
pub use openai::OpenAiBackend;
pub use router::{ProviderRouter, RouteError, RoutedText};

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Identifier for a configured translation provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderId {
    /// OpenAI chat completions API.
    Openai,
    /// Anthropic messages API.
    Anthropic,
    /// Local Ollama server.
    Ollama,
    /// Claude CLI agent.
    Claude,
    /// Cursor CLI agent.
    CursorAgent,
}

impl ProviderId {
    /// Stable string form, used in API payloads and logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Openai => "openai",
            Self::Anthropic => "anthropic",
            Self::Ollama => "ollama",
            Self::Claude => "claude",
            Self::CursorAgent => "cursor-agent",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" => Ok(Self::Openai),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            "claude" => Ok(Self::Claude),
            "cursor-agent" => Ok(Self::CursorAgent),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

/// Error returned when parsing an unrecognized provider name.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown provider: {0}")]
pub struct UnknownProvider(pub String);

/// Class of a backend, used for fallback ordering: hosted APIs are tried
/// before CLI agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProviderClass {
    /// Hosted (or locally served) HTTP API.
    HostedApi,
    /// Local command-line agent spawned per call.
    CliAgent,
}

/// Failure modes of a single backend call.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The backend is not configured (missing API key) or not installed.
    #[error("provider {0} is not configured or installed")]
    Unavailable(ProviderId),
    /// The call exceeded the configured timeout.
    #[error("provider {0} timed out after {1:?}")]
    Timeout(ProviderId, Duration),
    /// The backend returned an error response or a non-zero exit.
    #[error("provider {0} failed: {1}")]
    Backend(ProviderId, String),
}

impl ProviderError {
    /// The provider that produced this error.
    #[must_use]
    pub fn provider(&self) -> ProviderId {
        match self {
            Self::Unavailable(id) | Self::Timeout(id, _) | Self::Backend(id, _) => *id,
        }
    }
}

/// Uniform interface to one translation backend.
///
/// Every call either returns a non-empty string or fails with one of the
/// [`ProviderError`] variants. Adapters keep no state between calls;
/// CLI-backed adapters spawn one external process per call.
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    /// Which provider this backend wraps.
    fn id(&self) -> ProviderId;

    /// Backend class, for router ordering.
    fn class(&self) -> ProviderClass;

    /// Cheap configuration/installation check, used for startup logging.
    /// Calls on an unavailable backend fail with [`ProviderError::Unavailable`].
    fn is_available(&self) -> bool;

    /// Produce raw model text for a translation prompt. The prompt already
    /// carries the serialized schema; callers never invoke a backend
    /// without schema context.
    async fn translate(&self, prompt: &str, timeout: Duration) -> Result<String, ProviderError>;

    /// Produce raw model text for a display-label prompt.
    async fn label(&self, prompt: &str, timeout: Duration) -> Result<String, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_id_round_trips_through_str() {
        for id in [
            ProviderId::Openai,
            ProviderId::Anthropic,
            ProviderId::Ollama,
            ProviderId::Claude,
            ProviderId::CursorAgent,
        ] {
            assert_eq!(id.as_str().parse::<ProviderId>().unwrap(), id);
        }
    }

    #[test]
    fn unknown_provider_is_rejected() {
        assert!("grok".parse::<ProviderId>().is_err());
    }

    #[test]
    fn hosted_class_orders_before_cli() {
        assert!(ProviderClass::HostedApi < ProviderClass::CliAgent);
    }
}
