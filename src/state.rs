//! # Application State Management
//!
//! This module manages state shared by every HTTP request handler:
//! the configuration, the session store, the voice orchestrator with its
//! outbound API clients, and request metrics.
//!
//! ## Key Rust Concepts:
//!
//! ### Arc (Atomically Reference Counted)
//! - **Purpose**: Allows multiple parts of the program to safely share ownership of data
//! - **Why needed**: actix-web runs one `App` per worker thread, and each one holds a
//!   clone of `AppState`. Cloning an `Arc` only bumps a counter, so every worker sees
//!   the same session store.
//!
//! ### RwLock (Reader-Writer Lock)
//! - **Purpose**: Allows multiple readers OR one writer at a time (but not both)
//! - **Used for**: Metrics, which every request updates
//!
//! ### Trait objects (`Arc<dyn Transcriber>`)
//! - The orchestrator talks to the external services through traits, so the real
//!   HTTP clients and the scripted test doubles are interchangeable.

use crate::chat::{ChatCompleter, OpenAiChatClient};
use crate::config::AppConfig;
use crate::conversation::SessionStore;
use crate::orchestrator::{ChatFailurePolicy, TurnOutcome, VoiceOrchestrator};
use crate::search::{GoogleSearchClient, WebSearch};
use crate::transcription::{Transcriber, WhisperApiClient};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

/// The main application state that's shared across all HTTP request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Effective configuration (read-only after startup)
    pub config: Arc<AppConfig>,

    /// Conversation histories for every client
    pub sessions: Arc<SessionStore>,

    /// Runs transcription → search → chat for one uploaded clip
    pub orchestrator: Arc<VoiceOrchestrator>,

    /// Performance metrics (updated by the middleware and the voice handler)
    pub metrics: Arc<RwLock<AppMetrics>>,

    /// When the server started
    pub start_time: Instant,
}

/// Counters collected across all HTTP requests.
///
/// ## Why these metrics matter:
/// - **request_count / error_count**: Load and reliability monitoring
/// - **turns_processed**: Clips that produced a reply (including the empty-transcript reply)
/// - **searches_used**: Replies that were augmented with web results
/// - **chat_failures**: Replies replaced by an apology because the chat API failed
/// - **endpoint_metrics**: Per-endpoint statistics
#[derive(Debug, Default, Clone)]
pub struct AppMetrics {
    pub request_count: u64,
    pub error_count: u64,
    pub turns_processed: u64,
    pub searches_used: u64,
    pub chat_failures: u64,
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Detailed performance metrics for a specific API endpoint.
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    /// Number of requests to this specific endpoint
    pub request_count: u64,

    /// Total time spent processing all requests to this endpoint (milliseconds)
    pub total_duration_ms: u64,

    /// Number of errors that occurred for this endpoint
    pub error_count: u64,
}

impl AppState {
    /// Create the state with the real HTTP clients described by `config`.
    ///
    /// ## What this does:
    /// 1. Builds the transcription, chat and search clients (each with the configured timeout)
    /// 2. Wires them into a `VoiceOrchestrator` sharing one `SessionStore`
    ///
    /// Clients are built even when credentials are missing; they simply report
    /// themselves as unconfigured.
    pub fn new(config: AppConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.performance.request_timeout_secs);
        let transcriber = Arc::new(WhisperApiClient::new(config.openai.clone(), timeout)?);
        let chat = Arc::new(OpenAiChatClient::new(config.openai.clone(), timeout)?);
        let search = Arc::new(GoogleSearchClient::new(config.search.clone(), timeout)?);

        Ok(Self::with_services(config, transcriber, chat, search))
    }

    /// Create the state around explicit service implementations.
    pub fn with_services(
        config: AppConfig,
        transcriber: Arc<dyn Transcriber>,
        chat: Arc<dyn ChatCompleter>,
        search: Arc<dyn WebSearch>,
    ) -> Self {
        let sessions = Arc::new(SessionStore::new());
        let policy = ChatFailurePolicy::from_surface_errors(config.chat.surface_errors);
        let orchestrator = VoiceOrchestrator::new(
            Arc::clone(&sessions),
            transcriber,
            chat,
            search,
            policy,
        );

        Self {
            config: Arc::new(config),
            sessions,
            orchestrator: Arc::new(orchestrator),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
        }
    }

    /// Get a copy of the current configuration.
    pub fn get_config(&self) -> AppConfig {
        self.config.as_ref().clone()
    }

    // A panicking request must not take the metrics down with it, so a poisoned
    // lock is recovered instead of propagated.
    fn metrics_read(&self) -> RwLockReadGuard<'_, AppMetrics> {
        self.metrics.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn metrics_write(&self) -> RwLockWriteGuard<'_, AppMetrics> {
        self.metrics.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Increment the total request counter (called by middleware for every request).
    pub fn increment_request_count(&self) {
        self.metrics_write().request_count += 1;
    }

    /// Increment the total error counter (called for 4xx/5xx responses).
    pub fn increment_error_count(&self) {
        self.metrics_write().error_count += 1;
    }

    /// Record detailed metrics for a specific endpoint.
    ///
    /// ## Parameters:
    /// - **endpoint**: The API endpoint (e.g., "POST /process_audio")
    /// - **duration_ms**: How long the request took to process (in milliseconds)
    /// - **is_error**: Whether this request resulted in an error
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics_write();
        let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();

        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;

        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    /// Record the outcome of one processed clip.
    pub fn record_turn(&self, outcome: &TurnOutcome) {
        let mut metrics = self.metrics_write();
        metrics.turns_processed += 1;
        if outcome.used_search {
            metrics.searches_used += 1;
        }
        if outcome.chat_failed {
            metrics.chat_failures += 1;
        }
    }

    /// Get a snapshot of current metrics (used for the /metrics endpoint).
    ///
    /// Clones the data so the lock is not held while the response is serialized.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        self.metrics_read().clone()
    }

    /// Get server uptime in seconds.
    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl EndpointMetric {
    /// Average response time in milliseconds (0.0 when no requests were seen).
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    /// Error rate between 0.0 and 1.0.
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}
