//! # Voice Turn Orchestrator
//!
//! The single entry point that turns one uploaded audio clip into one conversation turn.
//!
//! ## Turn Lifecycle:
//! 1. **ReceivingAudio**: credentials checked, audio payload required
//! 2. **Transcribing**: audio written to a scoped temporary file and sent to speech-to-text
//! 3. **EmptyTranscript** (terminal): nothing recognized, fixed reply, nothing recorded
//! 4. **SearchDecision**: user turn recorded, heuristic consulted
//! 5. **Searching** (optional): web results fetched, failures silently ignored
//! 6. **Assembling / Completing**: chat request built and sent
//! 7. **RecordingReply / Responded**: assistant turn recorded, outcome returned
//!
//! ## Error Policies:
//! - **Search**: silent degrade. Any failure or empty result means "no augmentation"
//!   for this turn and is only logged.
//! - **Chat**: governed by `ChatFailurePolicy`. By default the failure is turned into an
//!   apologetic reply that is recorded like any other assistant turn.
//!
//! ## Temporary Audio:
//! The clip lives in a `tempfile::NamedTempFile`, which deletes the file when dropped.
//! Every exit path (success, empty transcript, `?` on a failed transcription) drops it
//! before `process` returns.

use crate::chat::ChatCompleter;
use crate::conversation::{ConversationAssembler, Message, Role, SessionStore};
use crate::error::{AppError, AppResult};
use crate::search::{format_results, needs_search, WebSearch};
use crate::transcription::Transcriber;
use chrono::Local;
use serde::Serialize;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{error, info, warn};

/// Transcript reported when speech-to-text recognized nothing.
pub const NO_SPEECH_TRANSCRIPT: &str = "No speech detected";

/// Reply sent when speech-to-text recognized nothing.
pub const NO_SPEECH_REPLY: &str = "I couldn't hear what you said. Please try again.";

/// Extension used when the upload does not reveal its audio format.
const DEFAULT_AUDIO_SUFFIX: &str = ".wav";

/// An uploaded audio clip as received from the multipart form.
#[derive(Debug, Clone, Default)]
pub struct AudioUpload {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub file_name: Option<String>,
}

/// What a chat completion failure turns into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatFailurePolicy {
    /// Reply with an apology that embeds the error detail (HTTP 200).
    #[default]
    Apologize,
    /// Fail the request with `AppError::ChatFailure` (HTTP 502).
    Surface,
}

impl ChatFailurePolicy {
    pub fn from_surface_errors(surface_errors: bool) -> Self {
        if surface_errors {
            ChatFailurePolicy::Surface
        } else {
            ChatFailurePolicy::Apologize
        }
    }
}

/// Result of one processed clip, serialized as the `/process_audio` response body.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub transcript: String,
    pub llm_response: String,
    pub conversation_history: Vec<Message>,
    pub used_search: bool,
    /// True when the reply is an apology for a failed chat call.
    #[serde(skip)]
    pub chat_failed: bool,
}

/// Sequences transcription, search, chat and session bookkeeping for one request.
pub struct VoiceOrchestrator {
    sessions: Arc<SessionStore>,
    transcriber: Arc<dyn Transcriber>,
    chat: Arc<dyn ChatCompleter>,
    search: Arc<dyn WebSearch>,
    assembler: ConversationAssembler,
    chat_failure_policy: ChatFailurePolicy,
}

impl VoiceOrchestrator {
    pub fn new(
        sessions: Arc<SessionStore>,
        transcriber: Arc<dyn Transcriber>,
        chat: Arc<dyn ChatCompleter>,
        search: Arc<dyn WebSearch>,
        chat_failure_policy: ChatFailurePolicy,
    ) -> Self {
        Self {
            sessions,
            transcriber,
            chat,
            search,
            assembler: ConversationAssembler::default(),
            chat_failure_policy,
        }
    }

    /// Whether transcription and chat credentials are both present.
    pub fn is_configured(&self) -> bool {
        self.transcriber.is_configured() && self.chat.is_configured()
    }

    /// Fail with `ServiceUnconfigured` when transcription or chat credentials are missing.
    ///
    /// This is the first check of every turn, before the upload is even looked at.
    pub fn ensure_configured(&self) -> AppResult<()> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(AppError::ServiceUnconfigured(
                "OpenAI API key not configured on the server".to_string(),
            ))
        }
    }

    /// Whether web search augmentation can run.
    pub fn search_enabled(&self) -> bool {
        self.search.is_configured()
    }

    /// Process one uploaded clip for `session_id`.
    ///
    /// ## Errors:
    /// - `ServiceUnconfigured` before anything else if credentials are missing
    /// - `MissingAudio` when no clip was uploaded
    /// - `TranscriptionFailure` when speech-to-text fails
    /// - `ChatFailure` only under `ChatFailurePolicy::Surface`
    pub async fn process(
        &self,
        session_id: &str,
        upload: Option<AudioUpload>,
    ) -> AppResult<TurnOutcome> {
        self.ensure_configured()?;
        let upload = upload.ok_or(AppError::MissingAudio)?;

        let transcript = self.transcribe(&upload).await?;

        if transcript.is_empty() {
            info!(session_id, "No speech detected in uploaded audio");
            return Ok(TurnOutcome {
                transcript: NO_SPEECH_TRANSCRIPT.to_string(),
                llm_response: NO_SPEECH_REPLY.to_string(),
                conversation_history: self.sessions.read(session_id),
                used_search: false,
                chat_failed: false,
            });
        }

        self.sessions.append(session_id, Role::User, transcript.clone());

        let search_text = if needs_search(&transcript) && self.search_enabled() {
            self.search_context(&transcript).await
        } else {
            None
        };

        let history = self.sessions.read(session_id);
        let messages = self
            .assembler
            .assemble(&history, search_text.as_deref(), Local::now());

        let (llm_response, chat_failed) = match self.chat.complete(&messages).await {
            Ok(reply) => (reply, false),
            Err(err) => {
                error!(session_id, error = %format!("{:#}", err), "Error calling chat API");
                match self.chat_failure_policy {
                    ChatFailurePolicy::Apologize => (apology_for(&err), true),
                    ChatFailurePolicy::Surface => {
                        return Err(AppError::ChatFailure(format!("{:#}", err)));
                    }
                }
            }
        };

        self.sessions
            .append(session_id, Role::Assistant, llm_response.clone());

        Ok(TurnOutcome {
            transcript,
            llm_response,
            conversation_history: self.sessions.read(session_id),
            used_search: search_text.is_some(),
            chat_failed,
        })
    }

    /// Reset the caller's history.
    pub fn clear(&self, session_id: &str) {
        self.sessions.clear(session_id);
    }

    /// Write the clip to a scoped temporary file and transcribe it.
    ///
    /// The temporary file is dropped (deleted) when this function returns.
    async fn transcribe(&self, upload: &AudioUpload) -> AppResult<String> {
        let audio_file = write_temp_audio(upload)?;

        self.transcriber
            .transcribe(audio_file.path())
            .await
            .map_err(|err| {
                error!(error = %format!("{:#}", err), "Error processing audio");
                AppError::TranscriptionFailure(format!("{:#}", err))
            })
    }

    /// Fetch and format search results; absent on any failure or when nothing was found.
    async fn search_context(&self, query: &str) -> Option<String> {
        match self.search.search(query).await {
            Ok(results) if results.is_empty() => {
                info!("Web search returned no results");
                None
            }
            Ok(results) => {
                info!(result_count = results.len(), "Web search augmentation added");
                Some(format_results(&results))
            }
            Err(err) => {
                warn!(error = %format!("{:#}", err), "Error performing web search");
                None
            }
        }
    }
}

/// Reply text used when the chat call fails under `ChatFailurePolicy::Apologize`.
pub fn apology_for(err: &anyhow::Error) -> String {
    format!("Sorry, I encountered an error: {:#}", err)
}

fn write_temp_audio(upload: &AudioUpload) -> AppResult<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("voice-upload-")
        .suffix(audio_suffix(upload))
        .tempfile()?;
    file.write_all(&upload.bytes)?;
    file.flush()?;
    Ok(file)
}

/// File extension for the temporary audio file, so the transcription API can tell
/// the container format. Content type wins over the client-supplied file name.
pub fn audio_suffix(upload: &AudioUpload) -> &'static str {
    let from_content_type = upload.content_type.as_deref().and_then(|content_type| {
        let essence = content_type.split(';').next().unwrap_or("").trim();
        match essence.to_ascii_lowercase().as_str() {
            "audio/webm" | "video/webm" => Some(".webm"),
            "audio/wav" | "audio/wave" | "audio/x-wav" => Some(".wav"),
            "audio/ogg" | "audio/opus" => Some(".ogg"),
            "audio/mpeg" | "audio/mp3" => Some(".mp3"),
            "audio/mp4" | "audio/m4a" | "audio/x-m4a" => Some(".m4a"),
            "audio/flac" | "audio/x-flac" => Some(".flac"),
            _ => None,
        }
    });

    let from_file_name = || -> Option<&'static str> {
        let extension = upload.file_name.as_deref()?.rsplit_once('.')?.1;
        match extension.to_ascii_lowercase().as_str() {
            "webm" => Some(".webm"),
            "wav" => Some(".wav"),
            "ogg" | "oga" => Some(".ogg"),
            "mp3" | "mpeg" | "mpga" => Some(".mp3"),
            "m4a" | "mp4" => Some(".m4a"),
            "flac" => Some(".flac"),
            _ => None,
        }
    };

    from_content_type
        .or_else(from_file_name)
        .unwrap_or(DEFAULT_AUDIO_SUFFIX)
}
