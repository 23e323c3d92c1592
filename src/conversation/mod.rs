//! # Conversation Module
//!
//! Holds everything about a per-client conversation: the stored messages, the
//! process-wide session store, and the assembler that turns a stored history into
//! the exact message list sent to the chat completion API.
//!
//! ## Key Components:
//! - **Message / Role**: One immutable, timestamped turn
//! - **SessionStore**: Session id → ordered message list (in memory only)
//! - **ConversationAssembler**: Persona + time context + history + optional search block

pub mod message;     // Role and Message types
pub mod store;       // In-memory session store
pub mod assembler;   // Chat request assembly pipeline

pub use assembler::{ChatMessage, ConversationAssembler};
pub use message::{Message, Role};
pub use store::SessionStore;
