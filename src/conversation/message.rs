//! Message types stored in a session.

use chrono::{DateTime, Local};
use serde::{Serialize, Serializer};
use std::fmt;

/// Format used for message timestamps in API responses and the time-context prompt.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Who produced a message.
///
/// Serialized in lowercase ("system", "user", "assistant"), which is also the
/// wire format expected by the chat completion API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single turn in a session's history.
///
/// Messages are never modified after they are appended. The timestamp is kept for
/// the `conversation_history` returned to the client; it is not sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Local>,
}

impl Message {
    /// Create a message stamped with the current local time.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Local::now(),
        }
    }
}

fn serialize_timestamp<S>(timestamp: &DateTime<Local>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(&timestamp.format(TIMESTAMP_FORMAT))
}
