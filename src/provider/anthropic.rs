//! Anthropic messages API backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{ProviderClass, ProviderError, ProviderId, TranslationBackend};
use crate::config::AnthropicConfig;
use crate::prompt;

/// Anthropic messages API backend.
#[derive(Debug, Clone)]
pub struct AnthropicBackend {
    config: AnthropicConfig,
    client: Client,
}

impl AnthropicBackend {
    /// Create a new Anthropic backend.
    pub fn new(config: AnthropicConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    fn api_url(&self) -> String {
        format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'))
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
            "max_tokens": max_tokens,
            "temperature": temperature,
            "system": system,
            "messages": [
                {"role": "user", "content": prompt}
            ]
        });

        let response = self
            .client
            .post(self.api_url())
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(self.id(), timeout)
                } else {
                    ProviderError::Backend(self.id(), e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Backend(
                self.id(),
                format!("API error ({status}): {text}"),
            ));
        }

        let message: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Backend(self.id(), format!("invalid response: {e}")))?;

        let text = message
            .content
            .into_iter()
            .find_map(|block| block.text)
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ProviderError::Backend(
                self.id(),
                "empty response".to_string(),
            ));
        }
        Ok(text)
    }
}

#[async_trait]
impl TranslationBackend for AnthropicBackend {
    fn id(&self) -> ProviderId {
        ProviderId::Anthropic
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

/// Messages API response body.
#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn translate_fails_fast_without_api_key() {
        let backend = AnthropicBackend::new(AnthropicConfig::default());
        assert!(!backend.is_available());
        let err = backend
            .translate("prompt", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProviderError::Unavailable(ProviderId::Anthropic)
        ));
    }
}
