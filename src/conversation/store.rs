//! # Session Store
//!
//! Process-wide, in-memory mapping from session id to an ordered list of messages.
//! Nothing is persisted: the store lives exactly as long as the server process.
//!
//! ## Concurrency:
//! The store is an explicit object owned by `AppState` (shared through `Arc`), not a
//! global. It is backed by a `DashMap`, a sharded concurrent hash map, so every
//! operation on one session runs under that key's shard lock:
//! - `append` is atomic per message
//! - concurrent requests for the SAME session interleave at message granularity
//!   (latest write wins, no cross-request ordering guarantee)
//! - requests for DIFFERENT sessions rarely contend

use crate::conversation::message::{Message, Role};
use dashmap::DashMap;

/// In-memory store of conversation histories keyed by session id.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<String, Vec<Message>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message timestamped now, creating the session if it does not exist.
    ///
    /// Returns a copy of the stored message.
    pub fn append(&self, session_id: &str, role: Role, content: impl Into<String>) -> Message {
        let message = Message::new(role, content);
        self.sessions
            .entry(session_id.to_string())
            .or_default()
            .push(message.clone());
        message
    }

    /// Snapshot of a session's messages in insertion order.
    ///
    /// Unknown sessions yield an empty list and are NOT created.
    pub fn read(&self, session_id: &str) -> Vec<Message> {
        self.sessions
            .get(session_id)
            .map(|messages| messages.value().clone())
            .unwrap_or_default()
    }

    /// Reset a session to an empty history. The key is created if absent.
    pub fn clear(&self, session_id: &str) {
        self.sessions
            .entry(session_id.to_string())
            .or_default()
            .clear();
    }

    /// Number of session keys currently known (including cleared ones).
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Total number of stored messages across all sessions.
    pub fn message_count(&self) -> usize {
        self.sessions.iter().map(|entry| entry.value().len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_read_unknown_session_is_empty_and_not_created() {
        let store = SessionStore::new();
        assert!(store.read("10.0.0.1").is_empty());
        assert_eq!(store.session_count(), 0);
    }

    #[test]
    fn test_append_then_read() {
        let store = SessionStore::new();
        store.append("10.0.0.1", Role::User, "What's the weather?");

        let history = store.read("10.0.0.1");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[0].content, "What's the weather?");
        assert_eq!(store.session_count(), 1);
    }

    #[test]
    fn test_append_preserves_insertion_order() {
        let store = SessionStore::new();
        store.append("s", Role::User, "one");
        store.append("s", Role::Assistant, "two");
        store.append("s", Role::User, "three");

        let contents: Vec<_> = store.read("s").into_iter().map(|m| m.content).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_sessions_are_isolated() {
        let store = SessionStore::new();
        store.append("a", Role::User, "hello from a");
        store.append("b", Role::User, "hello from b");

        assert_eq!(store.read("a").len(), 1);
        assert_eq!(store.read("b")[0].content, "hello from b");
        assert_eq!(store.message_count(), 2);
    }

    #[test]
    fn test_clear_seen_and_unseen_sessions() {
        let store = SessionStore::new();
        store.append("seen", Role::User, "hi");
        store.append("seen", Role::Assistant, "hello");

        store.clear("seen");
        store.clear("unseen");

        assert!(store.read("seen").is_empty());
        assert!(store.read("unseen").is_empty());
        // Clearing keeps (or creates) the key
        assert_eq!(store.session_count(), 2);

        // A cleared session accepts new messages
        store.append("seen", Role::User, "again");
        assert_eq!(store.read("seen").len(), 1);
    }

    #[test]
    fn test_concurrent_appends_are_all_recorded() {
        let store = Arc::new(SessionStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for j in 0..25 {
                        store.append("shared", Role::User, format!("{}-{}", i, j));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.read("shared").len(), 200);
    }
}
