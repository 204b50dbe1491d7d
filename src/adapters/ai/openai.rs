//! OpenAI-compatible Chat Completions adapter.
//!
//! Works against api.openai.com or any compatible endpoint. Same
//! transient/permanent classification as the Anthropic adapter.

use crate::domain::GenerationError;
use crate::ports::GenerationPort;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

pub struct OpenAiAdapter {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl OpenAiAdapter {
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
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    content: String,
}

fn is_transient_status(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 429 | 500 | 502 | 503)
}

fn classify_send_error(err: reqwest::Error) -> GenerationError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        GenerationError::Transient(err.to_string())
    } else {
        GenerationError::Permanent(err.to_string())
    }
}

#[async_trait::async_trait]
impl GenerationPort for OpenAiAdapter {
    async fn generate(
        &self,
        model: &str,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
    ) -> Result<String, GenerationError> {
        let request = ChatRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature: 0.7,
            max_tokens,
        };

        let response = self
            .client
            .post(&self.api_url)
            .timeout(REQUEST_TIMEOUT)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let preview: String = body.chars().take(200).collect();
            warn!(status = %status, body = %preview, "OpenAI API returned error");
            let message = format!("API error {}: {}", status, preview);
            return if is_transient_status(status) {
                Err(GenerationError::Transient(message))
            } else {
                Err(GenerationError::Permanent(message))
            };
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Permanent(format!("failed to parse response: {}", e)))?;

        let text = parsed
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| GenerationError::Permanent("no response choices returned".to_string()))?;

        debug!(model, response_len = text.len(), "OpenAI generation complete");
        Ok(text)
    }
}
