//! Local Ollama server backend.
//!
//! Talks to `/api/generate` first; some Ollama builds reject it with
//! HTTP 401, in which case the call retries once against `/api/chat`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::{ProviderClass, ProviderError, ProviderId, TranslationBackend};
use crate::config::OllamaConfig;
use crate::prompt;

/// Local Ollama server backend.
#[derive(Debug, Clone)]
pub struct OllamaBackend {
    config: OllamaConfig,
    client: Client,
}

impl OllamaBackend {
    /// Create a new Ollama backend.
    pub fn new(config: OllamaConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    async fn complete(
        &self,
        system: &str,
        prompt: &str,
        temperature: f32,
        num_predict: u32,
        timeout: Duration,
    ) -> Result<String, ProviderError> {
        if !self.config.enabled {
            return Err(ProviderError::Unavailable(self.id()));
        }

        let options = serde_json::json!({
            "temperature": temperature,
            "num_predict": num_predict,
            "num_ctx": self.config.num_ctx
        });

        let generate_body = serde_json::json!({
            "model": self.config.model,
            "prompt": format!("{system}\n\n{prompt}"),
            "stream": false,
            "options": options
        });

        let response = self
            .request(self.endpoint("/api/generate"), &generate_body, timeout)
            .await?;

        let response = if response.status() == StatusCode::UNAUTHORIZED {
            tracing::info!("Ollama generate endpoint returned 401, falling back to chat endpoint");
            let chat_body = serde_json::json!({
                "model": self.config.model,
                "messages": [
                    {"role": "system", "content": system},
                    {"role": "user", "content": prompt}
                ],
                "stream": false,
                "options": options
            });
            self.request(self.endpoint("/api/chat"), &chat_body, timeout)
                .await?
        } else {
            response
        };

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Backend(
                self.id(),
                format!("API error ({status}): {text}"),
            ));
        }

        let body: OllamaResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Backend(self.id(), format!("invalid response: {e}")))?;

        let text = body
            .response
            .or_else(|| body.message.and_then(|m| m.content))
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ProviderError::Backend(
                self.id(),
                format!(
                    "empty response from model '{}'; verify the model exists (ollama list) \
                     and the server is running",
                    self.config.model
                ),
            ));
        }
        Ok(text)
    }

    async fn request(
        &self,
        url: String,
        body: &serde_json::Value,
        timeout: Duration,
    ) -> Result<reqwest::Response, ProviderError> {
        self.client
            .post(url)
            .json(body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(self.id(), timeout)
                } else if e.is_connect() {
                    ProviderError::Backend(
                        self.id(),
                        format!(
                            "cannot connect to Ollama at {}; is it running? {e}",
                            self.config.base_url
                        ),
                    )
                } else {
                    ProviderError::Backend(self.id(), e.to_string())
                }
            })
    }
}

#[async_trait]
impl TranslationBackend for OllamaBackend {
    fn id(&self) -> ProviderId {
        ProviderId::Ollama
    }

    fn class(&self) -> ProviderClass {
        ProviderClass::HostedApi
    }

    fn is_available(&self) -> bool {
        self.config.enabled
    }

    async fn translate(&self, prompt: &str, timeout: Duration) -> Result<String, ProviderError> {
        self.complete(prompt::TRANSLATE_SYSTEM, prompt, 0.1, 500, timeout)
            .await
    }

    async fn label(&self, prompt: &str, timeout: Duration) -> Result<String, ProviderError> {
        self.complete(prompt::LABEL_SYSTEM, prompt, 0.3, 50, timeout)
            .await
    }
}

/// Response body shared by the generate and chat endpoints.
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: Option<String>,
    message: Option<OllamaMessage>,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    content: Option<String>,
}
