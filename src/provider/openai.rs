//! OpenAI chat completions backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{ProviderClass, ProviderError, ProviderId, TranslationBackend};
use crate::config::OpenAiConfig;
use crate::prompt;

/// OpenAI chat completions backend.
#[derive(Debug, Clone)]
pub struct OpenAiBackend {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiBackend {
    /// Create a new OpenAI backend.
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    fn api_url(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    async fn complete(
        &self,
        system: &str,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<String, ProviderError> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or(ProviderError::Unavailable(self.id()))?;

        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": prompt}
            ],
            "temperature": temperature,
            "max_tokens": max_tokens
        });

        let response = self
            .client
            .post(self.api_url())
            .bearer_auth(api_key)
            .json(&body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| self.request_error(e, timeout))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Backend(
                self.id(),
                format!("API error ({status}): {text}"),
            ));
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| ProviderError::Backend(self.id(), format!("invalid response: {e}")))?;

        let text = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ProviderError::Backend(
                self.id(),
                "empty response".to_string(),
            ));
        }
        Ok(text)
    }

    fn request_error(&self, e: reqwest::Error, timeout: Duration) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout(self.id(), timeout)
        } else {
            ProviderError::Backend(self.id(), e.to_string())
        }
    }
}

#[async_trait]
impl TranslationBackend for OpenAiBackend {
    fn id(&self) -> ProviderId {
        ProviderId::Openai
    }

    fn class(&self) -> ProviderClass {
        ProviderClass::HostedApi
    }

    fn is_available(&self) -> bool {
        self.config.api_key.is_some()
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

/// Chat completions response body.
#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}
