//! # Transcription Module
//!
//! Speech-to-text through an external API. The rest of the application only sees
//! the `Transcriber` trait, so tests can swap in a scripted backend.

pub mod client;      // OpenAI-compatible transcription client

pub use client::{Transcriber, WhisperApiClient};
