//! Voice chat endpoints: the browser client page, clip processing and history reset.

use crate::{error::AppError, orchestrator::AudioUpload, state::AppState};
use actix_multipart::{Field, Multipart};
use actix_web::{http::header::ContentType, web, HttpMessage, HttpRequest, HttpResponse};
use futures_util::stream::StreamExt;
use serde_json::json;
use tracing::{debug, info};

/// Name of the multipart field carrying the recorded clip.
pub const AUDIO_FIELD: &str = "audio";

const INDEX_HTML: &str = include_str!("../../static/index.html");

/// Session key for a request: the caller's IP address.
pub fn session_id(req: &HttpRequest) -> String {
    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn index() -> HttpResponse {
    HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(INDEX_HTML)
}

pub async fn process_audio(
    req: HttpRequest,
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let session_id = session_id(&req);
    state.orchestrator.ensure_configured()?;

    // A request that is not a form upload simply carries no clip.
    let upload = if is_form_upload(&req) {
        read_audio_upload(payload, state.config.performance.max_audio_bytes).await?
    } else {
        debug!(session_id = %session_id, "Request body is not multipart/form-data");
        None
    };

    let outcome = state.orchestrator.process(&session_id, upload).await?;
    state.record_turn(&outcome);

    info!(
        session_id = %session_id,
        used_search = outcome.used_search,
        history_len = outcome.conversation_history.len(),
        "Voice turn processed"
    );

    Ok(HttpResponse::Ok().json(outcome))
}

pub async fn clear_history(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    let session_id = session_id(&req);
    state.orchestrator.clear(&session_id);
    info!(session_id = %session_id, "Conversation history cleared");

    HttpResponse::Ok().json(json!({ "status": "success" }))
}

fn is_form_upload(req: &HttpRequest) -> bool {
    matches!(
        req.mime_type(),
        Ok(Some(mime)) if mime.essence_str() == "multipart/form-data"
    )
}

/// Pull the `audio` file part out of the form. Other fields, and an `audio` field
/// sent without a file name, are skipped.
///
/// Returns `None` when the form has no `audio` file.
async fn read_audio_upload(
    mut payload: Multipart,
    max_bytes: usize,
) -> Result<Option<AudioUpload>, AppError> {
    let mut upload = None;

    while let Some(item) = payload.next().await {
        let mut field: Field =
            item.map_err(|e| AppError::BadRequest(format!("Multipart error: {}", e)))?;

        let (field_name, file_name) = match field.content_disposition() {
            Some(disposition) => (
                disposition.get_name().map(str::to_string),
                disposition.get_filename().map(str::to_string),
            ),
            None => (None, None),
        };

        if field_name.as_deref() != Some(AUDIO_FIELD) || file_name.is_none() {
            debug!(field = ?field_name, file_name = ?file_name, "Skipping multipart field");
            continue;
        }

        let content_type = field.content_type().map(|mime| mime.to_string());

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| AppError::BadRequest(format!("Chunk error: {}", e)))?;
            if bytes.len() + chunk.len() > max_bytes {
                return Err(AppError::BadRequest(format!(
                    "Audio file too large (max: {} bytes)",
                    max_bytes
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        debug!(
            size_bytes = bytes.len(),
            content_type = ?content_type,
            file_name = ?file_name,
            "Received audio upload"
        );

        upload = Some(AudioUpload {
            bytes,
            content_type,
            file_name,
        });
    }

    Ok(upload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::conversation::Role;
    use crate::test_utils::{sample_result, ScriptedChat, ScriptedSearch, ScriptedTranscriber};
    use actix_web::{test, App};
    use serde_json::Value;
    use std::sync::Arc;

    const BOUNDARY: &str = "voice-test-boundary";
    const CLIENT_ADDR: &str = "10.1.2.3:54321";

    fn multipart_body(fields: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, file_name, data) in fields {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match file_name {
                Some(file_name) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                            name, file_name
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(b"Content-Type: audio/webm\r\n\r\n");
                }
                None => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                            .as_bytes(),
                    );
                }
            }
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn upload_request(fields: &[(&str, Option<&str>, &[u8])]) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/process_audio")
            .peer_addr(CLIENT_ADDR.parse().unwrap())
            .insert_header((
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            ))
            .set_payload(multipart_body(fields))
    }

    fn state_with(
        config: AppConfig,
        transcriber: ScriptedTranscriber,
        chat: ScriptedChat,
        search: ScriptedSearch,
    ) -> AppState {
        AppState::with_services(config, Arc::new(transcriber), Arc::new(chat), Arc::new(search))
    }

    macro_rules! voice_app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($state.clone()))
                    .route("/", web::get().to(index))
                    .route("/process_audio", web::post().to(process_audio))
                    .route("/clear_history", web::post().to(clear_history)),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_index_serves_client_page() {
        let state = state_with(
            AppConfig::default(),
            ScriptedTranscriber::replying("hi"),
            ScriptedChat::replying("hello"),
            ScriptedSearch::unconfigured(),
        );
        let app = voice_app!(state);

        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert!(resp.status().is_success());
        let body = test::read_body(resp).await;
        assert!(std::str::from_utf8(&body).unwrap().contains("process_audio"));
    }

    #[actix_web::test]
    async fn test_process_audio_returns_turn() {
        let state = state_with(
            AppConfig::default(),
            ScriptedTranscriber::replying("Hello there"),
            ScriptedChat::replying("Hi! How can I help?"),
            ScriptedSearch::unconfigured(),
        );
        let app = voice_app!(state);

        let req = upload_request(&[("audio", Some("recording.webm"), b"fake-webm-bytes")]).to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["transcript"], "Hello there");
        assert_eq!(body["llm_response"], "Hi! How can I help?");
        assert_eq!(body["used_search"], false);
        assert!(body.get("chat_failed").is_none());

        let history = body["conversation_history"].as_array().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0]["role"], "user");
        assert_eq!(history[1]["role"], "assistant");
        assert!(history[0]["timestamp"].is_string());

        assert_eq!(state.sessions.read("10.1.2.3").len(), 2);
        assert_eq!(state.get_metrics_snapshot().turns_processed, 1);
    }

    #[actix_web::test]
    async fn test_process_audio_with_search() {
        let state = state_with(
            AppConfig::default(),
            ScriptedTranscriber::replying("What's the weather today?"),
            ScriptedChat::replying("Rainy."),
            ScriptedSearch::returning(vec![sample_result()]),
        );
        let app = voice_app!(state);

        let req = upload_request(&[("audio", Some("recording.webm"), b"clip")]).to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["used_search"], true);
        assert_eq!(state.get_metrics_snapshot().searches_used, 1);
    }

    #[actix_web::test]
    async fn test_missing_audio_is_bad_request() {
        let state = state_with(
            AppConfig::default(),
            ScriptedTranscriber::replying("unused"),
            ScriptedChat::replying("unused"),
            ScriptedSearch::unconfigured(),
        );
        let app = voice_app!(state);

        let req = upload_request(&[("note", None, b"no clip here")]).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 400);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "error": "No audio file provided" }));
    }

    #[actix_web::test]
    async fn test_plain_text_audio_field_is_not_a_clip() {
        let state = state_with(
            AppConfig::default(),
            ScriptedTranscriber::replying("unused"),
            ScriptedChat::replying("unused"),
            ScriptedSearch::unconfigured(),
        );
        let app = voice_app!(state);

        let req = upload_request(&[("audio", None, b"not a file")]).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 400);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "error": "No audio file provided" }));
        assert!(state.sessions.read("10.1.2.3").is_empty());
    }

    #[actix_web::test]
    async fn test_bodyless_post_without_credentials_is_server_error() {
        let state = state_with(
            AppConfig::default(),
            ScriptedTranscriber::unconfigured(),
            ScriptedChat::unconfigured(),
            ScriptedSearch::unconfigured(),
        );
        let app = voice_app!(state);

        let req = test::TestRequest::post().uri("/process_audio").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 500);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "error": "OpenAI API key not configured on the server" }));
    }

    #[actix_web::test]
    async fn test_bodyless_post_with_credentials_is_missing_audio() {
        let state = state_with(
            AppConfig::default(),
            ScriptedTranscriber::replying("unused"),
            ScriptedChat::replying("unused"),
            ScriptedSearch::unconfigured(),
        );
        let app = voice_app!(state);

        let req = test::TestRequest::post().uri("/process_audio").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 400);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "error": "No audio file provided" }));
    }

    #[actix_web::test]
    async fn test_corrupt_multipart_body_is_bad_request() {
        let state = state_with(
            AppConfig::default(),
            ScriptedTranscriber::replying("unused"),
            ScriptedChat::replying("unused"),
            ScriptedSearch::unconfigured(),
        );
        let app = voice_app!(state);

        // Declares form-data but has no boundary parameter
        let req = test::TestRequest::post()
            .uri("/process_audio")
            .insert_header(("content-type", "multipart/form-data"))
            .set_payload("garbage")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 400);

        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].as_str().unwrap().starts_with("Multipart error"));
    }

    #[actix_web::test]
    async fn test_unconfigured_service_is_server_error() {
        let state = state_with(
            AppConfig::default(),
            ScriptedTranscriber::unconfigured(),
            ScriptedChat::unconfigured(),
            ScriptedSearch::unconfigured(),
        );
        let app = voice_app!(state);

        let req = upload_request(&[("audio", Some("recording.webm"), b"clip")]).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 500);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "OpenAI API key not configured on the server");
    }

    #[actix_web::test]
    async fn test_transcription_failure_is_server_error() {
        let state = state_with(
            AppConfig::default(),
            ScriptedTranscriber::failing("invalid audio format"),
            ScriptedChat::replying("unused"),
            ScriptedSearch::unconfigured(),
        );
        let app = voice_app!(state);

        let req = upload_request(&[("audio", Some("recording.webm"), b"clip")]).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 500);

        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].as_str().unwrap().contains("invalid audio format"));
        assert!(state.sessions.read("10.1.2.3").is_empty());
    }

    #[actix_web::test]
    async fn test_oversized_clip_is_rejected() {
        let mut config = AppConfig::default();
        config.performance.max_audio_bytes = 8;
        let state = state_with(
            config,
            ScriptedTranscriber::replying("unused"),
            ScriptedChat::replying("unused"),
            ScriptedSearch::unconfigured(),
        );
        let app = voice_app!(state);

        let req = upload_request(&[("audio", Some("recording.webm"), b"far more than eight bytes")])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 400);
    }

    #[actix_web::test]
    async fn test_surfaced_chat_failure_is_bad_gateway() {
        let mut config = AppConfig::default();
        config.chat.surface_errors = true;
        let state = state_with(
            config,
            ScriptedTranscriber::replying("Hello"),
            ScriptedChat::failing("rate limited"),
            ScriptedSearch::unconfigured(),
        );
        let app = voice_app!(state);

        let req = upload_request(&[("audio", Some("recording.webm"), b"clip")]).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 502);
    }

    #[actix_web::test]
    async fn test_clear_history_empties_session() {
        let state = state_with(
            AppConfig::default(),
            ScriptedTranscriber::replying("unused"),
            ScriptedChat::replying("unused"),
            ScriptedSearch::unconfigured(),
        );
        state.sessions.append("10.1.2.3", Role::User, "hello");
        state.sessions.append("10.9.9.9", Role::User, "someone else");
        let app = voice_app!(state);

        let req = test::TestRequest::post()
            .uri("/clear_history")
            .peer_addr(CLIENT_ADDR.parse().unwrap())
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body, json!({ "status": "success" }));
        assert!(state.sessions.read("10.1.2.3").is_empty());
        assert_eq!(state.sessions.read("10.9.9.9").len(), 1);
    }

    #[actix_web::test]
    async fn test_missing_peer_address_uses_unknown_session() {
        let req = test::TestRequest::default().to_http_request();
        assert_eq!(session_id(&req), "unknown");
    }
}
