//! # Chat Completion Client
//!
//! Posts an assembled conversation to an OpenAI-compatible `/chat/completions`
//! endpoint with fixed generation parameters and returns the first choice's text.

use crate::config::OpenAiConfig;
use crate::conversation::ChatMessage;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// A chat completion backend.
#[async_trait]
pub trait ChatCompleter: Send + Sync {
    /// Whether credentials are present.
    fn is_configured(&self) -> bool;

    /// Complete the conversation and return the reply text, trimmed.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI chat completion client.
#[derive(Debug, Clone)]
pub struct OpenAiChatClient {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiChatClient {
    pub fn new(config: OpenAiConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build chat http client")?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ChatCompleter for OpenAiChatClient {
    fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("chat API key not configured"))?;

        let request = ChatCompletionRequest {
            model: &self.config.chat_model,
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        debug!(
            model = %self.config.chat_model,
            message_count = messages.len(),
            "Requesting chat completion"
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .context("chat completion request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("chat API error {}: {}", status, body));
        }

        let payload: ChatCompletionResponse = response
            .json()
            .await
            .context("chat response was not valid JSON")?;

        let choice = payload
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("chat API returned no choices"))?;

        let content = choice
            .message
            .content
            .ok_or_else(|| anyhow!("chat API returned an empty message"))?;

        Ok(content.trim().to_string())
    }
}
