use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::LlmClient;
use super::types::{ApiErrorBody, MessagesRequest, MessagesResponse};
use crate::config::{API_KEY_PLACEHOLDER, Config};
use crate::error::{RagError, Result};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Messages API client over `reqwest`.
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.anthropic_api_key, &config.anthropic_base_url)
    }

    fn has_key(&self) -> bool {
        let key = self.api_key.trim();
        !key.is_empty() && key != API_KEY_PLACEHOLDER
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn create_message(&self, request: &MessagesRequest) -> Result<MessagesResponse> {
        if !self.has_key() {
            return Err(RagError::MissingApiKey);
        }

        let url = format!("{}/v1/messages", self.base_url);
        debug!(
            "POST {url} ({} messages, {} tools)",
            request.messages.len(),
            request.tools.len()
        );

        let resp = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            let (kind, message) = match serde_json::from_str::<ApiErrorBody>(&body) {
                Ok(parsed) => (parsed.error.kind, parsed.error.message),
                Err(_) => ("http_error".to_string(), body),
            };
            return Err(RagError::Api {
                status: status.as_u16(),
                kind,
                message,
            });
        }

        let parsed: MessagesResponse = serde_json::from_str(&body)
            .map_err(|e| RagError::InvalidResponse(format!("{e}")))?;
        debug!(
            "response {} stop_reason={:?} tokens in/out {}/{}",
            parsed.id, parsed.stop_reason, parsed.usage.input_tokens, parsed.usage.output_tokens
        );
        Ok(parsed)
    }
}
