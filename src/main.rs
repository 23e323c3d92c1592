//! # Voice Chat Backend - Main Application Entry Point
//!
//! This is the main entry point for the voice-chat-backend web server.
//! A browser records a short clip, uploads it, and gets back a transcript, a spoken-style
//! reply from a chat model, and the caller's running conversation history.
//!
//! ## Key Rust Concepts Used:
//! - **async/await**: The entire application is asynchronous; a request waiting on
//!   the transcription or chat API does not block other requests
//! - **modules**: Code is organized into separate modules (mod statements)
//! - **Result<T, E>**: Error handling using Rust's Result type
//! - **Arc & trait objects**: Shared state and swappable external service clients
//! - **static**: Global variables that live for the entire program duration
//!
//! ## Application Architecture:
//! - **config**: Application configuration (config file + environment variables)
//! - **state**: Shared application state, session store and metrics
//! - **conversation**: Message types, the per-client session store and prompt assembly
//! - **search**: The "does this need live data?" heuristic and the web search client
//! - **transcription** / **chat**: Clients for the speech-to-text and chat completion APIs
//! - **orchestrator**: One voice turn from uploaded clip to stored reply
//! - **handlers** / **health**: HTTP endpoints
//! - **middleware**: Custom request processing logic (logging, metrics)
//! - **error**: Custom error types and HTTP error responses

// Module declarations - These tell Rust about our other source files
mod chat;          // Chat completion client (chat/ directory)
mod config;        // Configuration management (config.rs)
mod conversation;  // Messages, sessions and prompt assembly (conversation/ directory)
mod error;         // Error handling types (error.rs)
mod handlers;      // HTTP request handlers (handlers/ directory)
mod health;        // Health check endpoints (health.rs)
mod middleware;    // Custom middleware (middleware/ directory)
mod orchestrator;  // Voice turn pipeline (orchestrator.rs)
mod search;        // Search heuristic and client (search/ directory)
mod state;         // Application state management (state.rs)
mod transcription; // Speech-to-text client (transcription/ directory)

#[cfg(test)]
mod test_utils;

// External crate imports - These are dependencies from Cargo.toml
use actix_cors::Cors;  // Cross-Origin Resource Sharing support
use actix_web::{middleware::Logger, web, App, HttpServer};  // Web framework
use anyhow::Result;    // Better error handling with context
use crate::config::AppConfig; // Our custom configuration struct
use crate::state::AppState;   // Our custom application state
use std::sync::atomic::{AtomicBool, Ordering};  // Thread-safe boolean for shutdown
use tracing::{error, info, warn};  // Structured logging
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};  // Logging setup

/// Global shutdown signal, set by the signal handler task and polled by `main`.
static SHUTDOWN_SIGNAL: AtomicBool = AtomicBool::new(false);

/// The main application entry point.
///
/// ## What this function does:
/// 1. **Loads configuration** from `.env`, an optional config file and environment variables
/// 2. **Sets up logging** for debugging and monitoring
/// 3. **Creates shared application state**: the session store and the API clients
/// 4. **Configures the HTTP server** with middleware and routes
/// 5. **Handles graceful shutdown** when receiving system signals
///
/// ## Error Handling:
/// Missing API keys are NOT startup errors. The server starts, logs a warning, and
/// `/process_audio` answers 500 until a key is provided. Invalid configuration values
/// (port 0, temperature out of range, ...) do stop startup.
#[actix_web::main]
async fn main() -> Result<()> {
    // .ok() means "ignore errors" - it's fine if there's no .env file
    dotenv::dotenv().ok();

    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting voice-chat-backend v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded: {}:{}", config.server.host, config.server.port);
    log_service_configuration(&config);

    // The state owns the session store and the outbound HTTP clients
    let app_state = AppState::new(config.clone())?;
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    setup_signal_handlers();

    info!("Starting HTTP server on {}", bind_addr);

    let server = HttpServer::new(move || {
        // The browser client may be served from another origin during development
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            // Middleware executes in reverse order of registration for requests
            .wrap(cors)
            .wrap(Logger::default())
            .wrap(middleware::MetricsMiddleware)
            .wrap(middleware::RequestLogging)
            // Voice chat endpoints used by the browser client
            .route("/", web::get().to(handlers::index))
            .route("/process_audio", web::post().to(handlers::process_audio))
            .route("/clear_history", web::post().to(handlers::clear_history))
            // Operational endpoints under /api/v1
            .service(
                web::scope("/api/v1")
                    .route("/health", web::get().to(health::health_check))
                    .route("/metrics", web::get().to(health::detailed_metrics))
                    .route("/config", web::get().to(handlers::get_config)),
            )
            // Also provide health check at root level for convenience
            .route("/health", web::get().to(health::health_check))
    })
    .bind(&bind_addr)?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    // Wait for either the server to finish OR a shutdown signal
    tokio::select! {
        result = server_task => {
            match result {
                Ok(server_result) => {
                    if let Err(e) = server_result {
                        error!("Server error: {}", e);
                    }
                }
                Err(e) => {
                    error!("Server task error: {}", e);
                }
            }
        }
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received, stopping server...");
            // Lets in-flight voice turns finish their API calls
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Initialize the tracing (logging) system for the application.
///
/// ## Environment Variables:
/// - `RUST_LOG`: Controls what gets logged (e.g., "debug", "voice_chat_backend=trace")
/// - If not set, defaults to "voice_chat_backend=debug,actix_web=info"
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voice_chat_backend=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

/// Report which external services are usable with the loaded credentials.
fn log_service_configuration(config: &AppConfig) {
    if config.openai.is_configured() {
        info!(
            transcription_model = %config.openai.transcription_model,
            chat_model = %config.openai.chat_model,
            "OpenAI API configured"
        );
    } else {
        warn!("OPENAI_API_KEY not set - audio processing requests will fail until it is provided");
    }

    if config.search.is_configured() {
        info!(num_results = config.search.num_results, "Web search configured");
    } else {
        warn!("GOOGLE_API_KEY or GOOGLE_CSE_ID not set - replies will not use web search");
    }
}

/// Set up signal handlers for graceful shutdown.
///
/// ## What this does:
/// - Listens for SIGTERM (termination signal from system)
/// - Listens for SIGINT (interrupt signal, usually Ctrl+C)
/// - When either signal is received, sets the global shutdown flag
///
/// If a handler cannot be installed the server keeps running without graceful
/// shutdown for that signal.
fn setup_signal_handlers() {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async {
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                return;
            }
        };
        let mut sigint = match signal(SignalKind::interrupt()) {
            Ok(sigint) => sigint,
            Err(e) => {
                error!("Failed to install SIGINT handler: {}", e);
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }

        // SeqCst (Sequential Consistency) ensures this change is visible to all threads
        SHUTDOWN_SIGNAL.store(true, Ordering::SeqCst);
    });
}

/// Wait for the shutdown signal to be set.
///
/// Polls every 100ms; `tokio::time::sleep` does not block other tasks.
async fn wait_for_shutdown() {
    while !SHUTDOWN_SIGNAL.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}
