//! # Chat Module
//!
//! Chat completion through an external LLM API, behind the `ChatCompleter` trait.

pub mod client;      // OpenAI-compatible chat completion client

pub use client::{ChatCompleter, OpenAiChatClient};
