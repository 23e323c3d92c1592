use crate::{error::AppError, state::AppState};
use actix_web::{web, HttpResponse};
use serde_json::json;

/// Effective configuration. Credentials are reported only as present or absent.
pub async fn get_config(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let config = state.get_config();

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "config": {
            "server": {
                "host": config.server.host,
                "port": config.server.port
            },
            "openai": {
                "configured": config.openai.is_configured(),
                "base_url": config.openai.base_url,
                "transcription_model": config.openai.transcription_model,
                "chat_model": config.openai.chat_model,
                "max_tokens": config.openai.max_tokens,
                "temperature": config.openai.temperature
            },
            "search": {
                "configured": config.search.is_configured(),
                "base_url": config.search.base_url,
                "num_results": config.search.num_results,
                "query_suffix": config.search.query_suffix
            },
            "chat": {
                "surface_errors": config.chat.surface_errors
            },
            "performance": {
                "max_audio_bytes": config.performance.max_audio_bytes,
                "request_timeout_secs": config.performance.request_timeout_secs
            }
        }
    })))
}
