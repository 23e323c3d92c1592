//! # Configuration Management
//!
//! This module handles loading and managing application configuration from multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Well-known credential variables (OPENAI_API_KEY, GOOGLE_API_KEY, GOOGLE_CSE_ID)
//! - Default values (built into the code)
//!
//! ## Key Rust Concepts Used:
//! - **Serde**: Serialization/deserialization library for converting between Rust structs and data formats
//! - **Option<T>**: Credentials may be absent, and absence changes behavior instead of stopping startup
//! - **impl blocks**: Add methods to structs
//! - **Result<T, E>**: Error handling that forces you to handle potential failures
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Credential and deployment variables (OPENAI_API_KEY, HOST, PORT, ...)
//! 2. Environment variables (APP_SERVER__HOST, APP_OPENAI__CHAT_MODEL, etc.)
//! 3. Configuration file (config.toml)
//! 4. Default values (defined in the Default impl)

use anyhow::Result;              // Better error handling with context
use serde::{Deserialize, Serialize};  // For converting to/from TOML, JSON, etc.
use std::env;                    // For reading environment variables

/// Main application configuration that contains all settings.
///
/// ## Why separate config structs:
/// Each outbound service (speech-to-text + chat, web search) gets its own group,
/// so the presence of its credentials can be checked in one place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub openai: OpenAiConfig,
    pub search: SearchConfig,
    pub chat: ChatConfig,
    pub performance: PerformanceConfig,
}

/// Server-specific configuration settings.
///
/// ## Common values:
/// - `host = "127.0.0.1"`: Only accept connections from localhost (development)
/// - `host = "0.0.0.0"`: Accept connections from any IP address (production)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Settings for the OpenAI-compatible API used for both transcription and chat.
///
/// ## Fields:
/// - `api_key`: Bearer token; when absent the voice endpoint answers with a 500
/// - `base_url`: API root without trailing slash (e.g. "https://api.openai.com/v1")
/// - `transcription_model`: Speech-to-text model name ("whisper-1")
/// - `chat_model`: Chat completion model name ("gpt-3.5-turbo")
/// - `max_tokens` / `temperature`: Fixed generation parameters for every reply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub transcription_model: String,
    pub chat_model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Google Custom Search settings.
///
/// Both `api_key` and `engine_id` must be present for search augmentation to run;
/// otherwise replies are produced without web context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub api_key: Option<String>,
    pub engine_id: Option<String>,
    pub base_url: String,
    pub num_results: u32,
    pub query_suffix: String,
}

/// How chat completion failures reach the caller.
///
/// - `surface_errors = false` (default): the failure becomes an apologetic reply text
/// - `surface_errors = true`: the request fails with a 502 error payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    pub surface_errors: bool,
}

/// Performance tuning configuration.
///
/// ## Fields:
/// - `max_audio_bytes`: Upper bound for an uploaded clip (multipart payload limit)
/// - `request_timeout_secs`: Timeout applied to every outbound API call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    pub max_audio_bytes: usize,
    pub request_timeout_secs: u64,
}

/// Provides default configuration values.
///
/// ## Why defaults matter:
/// Default values ensure the application can start even if no configuration file exists.
/// Credentials have no default: they come from the environment or config.toml.
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
            },
            openai: OpenAiConfig {
                api_key: None,
                base_url: "https://api.openai.com/v1".to_string(),
                transcription_model: "whisper-1".to_string(),
                chat_model: "gpt-3.5-turbo".to_string(),
                max_tokens: 150,
                temperature: 0.7,
            },
            search: SearchConfig {
                api_key: None,
                engine_id: None,
                base_url: "https://www.googleapis.com/customsearch/v1".to_string(),
                num_results: 5,
                query_suffix: "latest".to_string(),
            },
            chat: ChatConfig {
                surface_errors: false,
            },
            performance: PerformanceConfig {
                max_audio_bytes: 25 * 1024 * 1024,  // Upload cap of the transcription API
                request_timeout_secs: 30,
            },
        }
    }
}

impl OpenAiConfig {
    /// True when a non-blank API key is present.
    pub fn is_configured(&self) -> bool {
        non_blank(self.api_key.as_deref())
    }
}

impl SearchConfig {
    /// True when both the API key and the search engine id are present.
    pub fn is_configured(&self) -> bool {
        non_blank(self.api_key.as_deref()) && non_blank(self.engine_id.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> bool {
    value.map(|v| !v.trim().is_empty()).unwrap_or(false)
}

/// Implementation block for AppConfig - adds methods to the struct.
impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Configuration Loading Process:
    /// 1. Start with built-in defaults
    /// 2. Override with values from config.toml (if it exists)
    /// 3. Override with environment variables prefixed with APP_
    /// 4. Handle special cases for HOST, PORT and the API credentials
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER__PORT=3000`: Override server port
    /// - `APP_OPENAI__CHAT_MODEL=gpt-4o-mini`: Override the chat model
    /// - `APP_CHAT__SURFACE_ERRORS=true`: Return 502 instead of an apology reply
    /// - `OPENAI_API_KEY=sk-...`: Enables transcription and chat
    /// - `GOOGLE_API_KEY=...` + `GOOGLE_CSE_ID=...`: Enables web search augmentation
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            // Double underscore separates nesting so field names may contain "_":
            // APP_OPENAI__CHAT_MODEL becomes openai.chat_model
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );

        // Variables used by deployment platforms and by the upstream API docs.
        // These don't follow the APP_ prefix convention.
        let overrides = [
            ("HOST", "server.host"),
            ("PORT", "server.port"),
            ("OPENAI_API_KEY", "openai.api_key"),
            ("GOOGLE_API_KEY", "search.api_key"),
            ("GOOGLE_CSE_ID", "search.engine_id"),
        ];
        for (var, key) in overrides {
            if let Ok(value) = env::var(var) {
                settings = settings.set_override(key, value)?;
            }
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// ## What this checks:
    /// - Server port is not 0
    /// - Generation parameters are usable (max_tokens > 0, temperature within 0..=2)
    /// - Search asks for at least one result
    /// - Upload limit and outbound timeout are non-zero
    ///
    /// Missing credentials are NOT validation errors: they only disable features.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.openai.max_tokens == 0 {
            return Err(anyhow::anyhow!("Chat max_tokens must be greater than 0"));
        }

        if !(0.0..=2.0).contains(&self.openai.temperature) {
            return Err(anyhow::anyhow!(
                "Chat temperature must be between 0.0 and 2.0, got {}",
                self.openai.temperature
            ));
        }

        if self.search.num_results == 0 {
            return Err(anyhow::anyhow!("Search num_results must be greater than 0"));
        }

        if self.performance.max_audio_bytes == 0 {
            return Err(anyhow::anyhow!("Max audio size must be greater than 0"));
        }

        if self.performance.request_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Request timeout must be greater than 0"));
        }

        Ok(())
    }
}
