//! Test utilities: scripted stand-ins for the external services.
//!
//! Each double records what it was asked so tests can assert on the exact
//! requests the orchestrator produced.

use crate::chat::ChatCompleter;
use crate::conversation::ChatMessage;
use crate::search::{SearchResult, WebSearch};
use crate::transcription::Transcriber;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Transcriber returning a fixed transcript or error.
pub struct ScriptedTranscriber {
    pub configured: bool,
    reply: std::result::Result<String, String>,
    /// Path handed to `transcribe` and whether the file existed at that moment.
    pub seen: Mutex<Option<(PathBuf, bool)>>,
}

impl ScriptedTranscriber {
    pub fn replying(text: &str) -> Self {
        Self {
            configured: true,
            reply: Ok(text.to_string()),
            seen: Mutex::new(None),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            configured: true,
            reply: Err(message.to_string()),
            seen: Mutex::new(None),
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::replying("unused")
        }
    }

    pub fn seen_path(&self) -> Option<(PathBuf, bool)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn transcribe(&self, audio_path: &Path) -> Result<String> {
        *self.seen.lock().unwrap() = Some((audio_path.to_path_buf(), audio_path.exists()));
        self.reply.clone().map_err(|message| anyhow!(message))
    }
}

/// Chat backend returning a fixed reply or error and recording each request.
pub struct ScriptedChat {
    pub configured: bool,
    reply: std::result::Result<String, String>,
    pub requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedChat {
    pub fn replying(text: &str) -> Self {
        Self {
            configured: true,
            reply: Ok(text.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            configured: true,
            reply: Err(message.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::replying("unused")
        }
    }

    pub fn last_request(&self) -> Option<Vec<ChatMessage>> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ChatCompleter for ScriptedChat {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.requests.lock().unwrap().push(messages.to_vec());
        self.reply.clone().map_err(|message| anyhow!(message))
    }
}

/// Search backend returning fixed results or an error and counting calls.
pub struct ScriptedSearch {
    pub configured: bool,
    reply: std::result::Result<Vec<SearchResult>, String>,
    pub calls: AtomicUsize,
}

impl ScriptedSearch {
    pub fn returning(results: Vec<SearchResult>) -> Self {
        Self {
            configured: true,
            reply: Ok(results),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            configured: true,
            reply: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::returning(Vec::new())
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WebSearch for ScriptedSearch {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn search(&self, _query: &str) -> Result<Vec<SearchResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone().map_err(|message| anyhow!(message))
    }
}

/// A single search hit for tests.
pub fn sample_result() -> SearchResult {
    SearchResult {
        title: "Monsoon arrives early".to_string(),
        link: "https://news.example/monsoon".to_string(),
        snippet: "Heavy rain expected across the region.".to_string(),
        source: "news.example".to_string(),
    }
}
