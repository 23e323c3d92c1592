//! # Error Handling
//!
//! This module defines the application error taxonomy and how each error is converted
//! into an HTTP response.
//!
//! ## Key Rust Concepts for Error Handling:
//!
//! ### Result<T, E> Type
//! - **Purpose**: Forces you to handle both success and failure cases
//! - **No exceptions**: Rust doesn't have try/catch, it uses Result instead
//!
//! ### Traits for Error Conversion
//! - **From trait**: Automatically converts between error types (used by `?`)
//! - **ResponseError trait**: Converts errors to HTTP responses
//! - **Display trait**: Defines how errors are formatted as strings
//!
//! ## What is NOT an error here:
//! Web search failures never become an `AppError`. They are logged and the reply is
//! produced without search context (see `orchestrator::search_context`).

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// Custom error types for the application.
///
/// ## Error Categories:
/// - **ServiceUnconfigured**: A required API credential is missing (500)
/// - **MissingAudio**: The request carried no `audio` field (400)
/// - **BadRequest**: Malformed multipart data or an oversized clip (400)
/// - **TranscriptionFailure**: The speech-to-text call failed (500)
/// - **ChatFailure**: The chat call failed and errors are configured to surface (502)
/// - **ConfigError**: Configuration problems (500)
/// - **Internal**: Anything else that went wrong on the server (500)
///
/// ## Usage Example:
/// ```rust,ignore
/// fn require_clip(upload: Option<AudioUpload>) -> AppResult<AudioUpload> {
///     upload.ok_or(AppError::MissingAudio)
/// }
/// ```
#[derive(Debug)]
pub enum AppError {
    ServiceUnconfigured(String),
    MissingAudio,
    BadRequest(String),
    TranscriptionFailure(String),
    ChatFailure(String),
    ConfigError(String),
    Internal(String),
}

impl AppError {
    /// Message placed in the `error` field of the JSON body.
    ///
    /// Transcription and chat failures carry the upstream message unchanged,
    /// which is what the browser client shows to the user.
    pub fn message(&self) -> String {
        match self {
            AppError::ServiceUnconfigured(msg) => msg.clone(),
            AppError::MissingAudio => "No audio file provided".to_string(),
            AppError::BadRequest(msg) => msg.clone(),
            AppError::TranscriptionFailure(msg) => msg.clone(),
            AppError::ChatFailure(msg) => msg.clone(),
            AppError::ConfigError(msg) => format!("Configuration error: {}", msg),
            AppError::Internal(msg) => msg.clone(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::ServiceUnconfigured(msg) => write!(f, "Service unconfigured: {}", msg),
            AppError::MissingAudio => write!(f, "Bad request: No audio file provided"),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::TranscriptionFailure(msg) => write!(f, "Transcription failed: {}", msg),
            AppError::ChatFailure(msg) => write!(f, "Chat completion failed: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

/// Implementation of the ResponseError trait for AppError.
///
/// ## HTTP Status Code Mapping:
/// - ServiceUnconfigured/TranscriptionFailure/ConfigError/Internal → 500
/// - MissingAudio/BadRequest → 400
/// - ChatFailure → 502 (Bad Gateway: the upstream model failed)
///
/// ## JSON Response Format:
/// The browser client reads a single `error` string:
/// ```json
/// { "error": "No audio file provided" }
/// ```
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingAudio | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::ChatFailure(_) => StatusCode::BAD_GATEWAY,
            AppError::ServiceUnconfigured(_)
            | AppError::TranscriptionFailure(_)
            | AppError::ConfigError(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "error": self.message()
        }))
    }
}

/// Automatic conversion from anyhow::Error to AppError.
///
/// ## Usage:
/// When you use `?` with an anyhow::Error in a handler, it becomes an AppError::Internal.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(format!("I/O error: {}", err))
    }
}

/// Automatic conversion from configuration errors to AppError.
///
/// ## When this happens:
/// - config.toml file has invalid syntax
/// - An environment variable holds a value of the wrong type
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

/// Type alias for Results that use our custom error type.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    async fn body_json(err: AppError) -> serde_json::Value {
        let response = err.error_response();
        let bytes = to_bytes(response.into_body()).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::MissingAudio.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::ServiceUnconfigured("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::TranscriptionFailure("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(AppError::ChatFailure("x".into()).status_code(), StatusCode::BAD_GATEWAY);
    }

    #[actix_web::test]
    async fn test_error_body_is_flat_error_string() {
        let body = body_json(AppError::MissingAudio).await;
        assert_eq!(body, json!({ "error": "No audio file provided" }));

        let body = body_json(AppError::TranscriptionFailure("upstream 503".into())).await;
        assert_eq!(body["error"], "upstream 503");
    }

    #[test]
    fn test_anyhow_conversion() {
        let err: AppError = anyhow::anyhow!("boom").into();
        assert!(matches!(err, AppError::Internal(ref msg) if msg == "boom"));
    }
}
