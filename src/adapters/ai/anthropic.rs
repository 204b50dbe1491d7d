//! Anthropic Messages API adapter.
//!
//! Implements `GenerationPort` over reqwest. HTTP statuses that signal
//! overload or throttling (408/429/5xx/529) map to transient errors so the
//! gateway retries them; everything else fails fast.

use crate::domain::GenerationError;
use crate::ports::GenerationPort;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

pub struct AnthropicAdapter {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl AnthropicAdapter {
    pub fn new(api_key: String) -> Self {
        Self::with_url(api_key, DEFAULT_API_URL.to_string())
    }

    pub fn with_url(api_key: String, api_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            api_key,
        }
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<UserMessage<'a>>,
}

#[derive(Serialize)]
struct UserMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

/// Statuses worth retrying: timeout, rate limit, server trouble, and
/// Anthropic's 529 "overloaded".
fn is_transient_status(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 429 | 500 | 502 | 503 | 529)
}

fn classify_send_error(err: reqwest::Error) -> GenerationError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        GenerationError::Transient(err.to_string())
    } else {
        GenerationError::Permanent(err.to_string())
    }
}

#[async_trait::async_trait]
impl GenerationPort for AnthropicAdapter {
    async fn generate(
        &self,
        model: &str,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
    ) -> Result<String, GenerationError> {
        let request = MessagesRequest {
            model,
            max_tokens,
            temperature: 0.7,
            system: system_prompt,
            messages: vec![UserMessage {
                role: "user",
                content: user_prompt,
            }],
        };

        let response = self
            .client
            .post(&self.api_url)
            .timeout(REQUEST_TIMEOUT)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let preview: String = body.chars().take(200).collect();
            warn!(status = %status, body = %preview, "Anthropic API returned error");
            let message = format!("API error {}: {}", status, preview);
            return if is_transient_status(status) {
                Err(GenerationError::Transient(message))
            } else {
                Err(GenerationError::Permanent(message))
            };
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Permanent(format!("failed to parse response: {}", e)))?;

        let text = parsed
            .content
            .first()
            .map(|block| block.text.clone())
            .ok_or_else(|| GenerationError::Permanent("no content blocks returned".to_string()))?;

        debug!(model, response_len = text.len(), "Anthropic generation complete");
        Ok(text)
    }
}
