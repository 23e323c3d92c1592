//! # Speech-to-Text API Client
//!
//! Sends an audio file to an OpenAI-compatible `/audio/transcriptions` endpoint and
//! returns the recognized text.
//!
//! ## Request Format:
//! Multipart form with two parts:
//! - `file`: the audio bytes, named after the temporary file (the API infers the
//!   container format from the extension)
//! - `model`: the transcription model name (e.g. "whisper-1")

use crate::config::OpenAiConfig;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// A speech-to-text backend.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Whether credentials are present.
    fn is_configured(&self) -> bool;

    /// Transcribe the audio file at `audio_path`.
    ///
    /// Returns an empty string when nothing was recognized.
    async fn transcribe(&self, audio_path: &Path) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

/// OpenAI Whisper API client.
#[derive(Debug, Clone)]
pub struct WhisperApiClient {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl WhisperApiClient {
    pub fn new(config: OpenAiConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build transcription http client")?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/audio/transcriptions", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Transcriber for WhisperApiClient {
    fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    async fn transcribe(&self, audio_path: &Path) -> Result<String> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("transcription API key not configured"))?;

        let audio = tokio::fs::read(audio_path)
            .await
            .with_context(|| format!("failed to read audio file {}", audio_path.display()))?;
        let file_name = audio_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("audio.wav")
            .to_string();

        debug!(bytes = audio.len(), file_name = %file_name, "Sending audio for transcription");

        let part = reqwest::multipart::Part::bytes(audio).file_name(file_name);
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.config.transcription_model.clone());

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await
            .context("transcription request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("transcription API error {}: {}", status, body));
        }

        let payload: TranscriptionResponse = response
            .json()
            .await
            .context("transcription response was not valid JSON")?;

        Ok(payload.text.trim().to_string())
    }
}
