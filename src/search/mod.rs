//! # Web Search Module
//!
//! Optional augmentation of a spoken query with live web results:
//! - **heuristic**: decides whether a query needs real-time information
//! - **client**: calls the search API and formats the hits for the chat prompt

pub mod heuristic;   // Keyword/regex rule set
pub mod client;      // Google Custom Search client and result formatting

pub use client::{format_results, GoogleSearchClient, SearchResult, WebSearch};
pub use heuristic::needs_search;
