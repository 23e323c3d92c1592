//! # Conversation Assembler
//!
//! Builds the ordered message list for one chat completion call. The list is produced
//! fresh on every call from immutable inputs:
//!
//! 1. the persona system message
//! 2. a time-context system message (always index 1)
//! 3. the stored history, in order, role + content only
//! 4. when search text is present, one search-augmentation system message placed
//!    directly after the most recent user message
//!
//! The order matters: it decides which context the model reads before the user's question.

use crate::conversation::message::{Message, Role, TIMESTAMP_FORMAT};
use chrono::{DateTime, Local};
use serde::Serialize;

/// Persona used for every conversation.
pub const DEFAULT_PERSONA: &str = "You are a helpful AI assistant engaged in a voice conversation. \
Keep your responses concise and natural for speech. You can reference our previous conversation. \
You can search the web for real-time information when necessary.";

/// A message in the shape expected by the chat completion API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

impl From<&Message> for ChatMessage {
    fn from(message: &Message) -> Self {
        Self::new(message.role, message.content.clone())
    }
}

/// Assembles chat requests around a fixed persona.
#[derive(Debug, Clone)]
pub struct ConversationAssembler {
    persona: String,
}

impl Default for ConversationAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_PERSONA)
    }
}

impl ConversationAssembler {
    pub fn new(persona: impl Into<String>) -> Self {
        Self {
            persona: persona.into(),
        }
    }

    /// Produce the message list for a chat call.
    ///
    /// ## Parameters:
    /// - **history**: The session's stored messages
    /// - **search_text**: Formatted search results, if augmentation ran for this turn
    /// - **now**: Time snapshot written into the time-context message
    ///
    /// If `search_text` is given but the history holds no user message, the search
    /// block has nothing to follow and is left out.
    pub fn assemble(
        &self,
        history: &[Message],
        search_text: Option<&str>,
        now: DateTime<Local>,
    ) -> Vec<ChatMessage> {
        let search_anchor = search_text.and_then(|text| {
            history
                .iter()
                .rposition(|message| message.role == Role::User)
                .map(|position| (position, search_message(text)))
        });

        let mut messages = Vec::with_capacity(history.len() + 3);
        messages.push(ChatMessage::system(self.persona.clone()));
        messages.push(time_context_message(now));

        for (index, message) in history.iter().enumerate() {
            messages.push(ChatMessage::from(message));
            if let Some((anchor, block)) = &search_anchor {
                if *anchor == index {
                    messages.push(block.clone());
                }
            }
        }

        messages
    }
}

fn time_context_message(now: DateTime<Local>) -> ChatMessage {
    ChatMessage::system(format!(
        "Current date and time: {}. You can use this information if the user asks about the current date, time, or day of the week.",
        now.format(TIMESTAMP_FORMAT)
    ))
}

fn search_message(search_text: &str) -> ChatMessage {
    ChatMessage::system(format!(
        "The user is asking about current events or real-time information. \
I've performed a web search and found these results that may help in formulating your response: {}\n\n\
Please use this information to provide an accurate and up-to-date answer. Cite sources when appropriate.",
        search_text
    ))
}
