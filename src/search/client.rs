//! # Web Search Client
//!
//! Calls the Google Custom Search JSON API and folds the results into a text block
//! that is injected into the chat request.
//!
//! The client itself reports failures as errors. Turning them into "no search
//! augmentation" is the orchestrator's job (silent degrade policy).

use crate::config::SearchConfig;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Lead-in placed before the numbered results.
pub const RESULTS_LEAD_IN: &str =
    "Here are some recent search results that might help answer the query:\n\n";

/// One web search hit. Never stored; only formatted into a prompt block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub title: String,
    pub link: String,
    pub snippet: String,
    pub source: String,
}

/// A web search backend.
#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Whether credentials are present. Unconfigured backends are never called.
    fn is_configured(&self) -> bool;

    /// Search for `query`. An empty list means the API had no results.
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>>;
}

/// Format results as numbered blocks with title, source and snippet.
pub fn format_results(results: &[SearchResult]) -> String {
    let mut formatted = String::from(RESULTS_LEAD_IN);
    for (i, result) in results.iter().enumerate() {
        formatted.push_str(&format!("{}. {}\n", i + 1, result.title));
        formatted.push_str(&format!("   Source: {}\n", result.source));
        formatted.push_str(&format!("   Summary: {}\n\n", result.snippet));
    }
    formatted
}

#[derive(Debug, Deserialize)]
struct CustomSearchResponse {
    #[serde(default)]
    items: Option<Vec<CustomSearchItem>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CustomSearchItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    display_link: String,
}

impl From<CustomSearchItem> for SearchResult {
    fn from(item: CustomSearchItem) -> Self {
        Self {
            title: item.title,
            link: item.link,
            snippet: item.snippet,
            source: item.display_link,
        }
    }
}

/// Google Custom Search client.
#[derive(Debug, Clone)]
pub struct GoogleSearchClient {
    client: reqwest::Client,
    config: SearchConfig,
}

impl GoogleSearchClient {
    pub fn new(config: SearchConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build search http client")?;
        Ok(Self { client, config })
    }

    /// Query actually sent to the API: the spoken text plus the recency suffix.
    fn search_query(&self, query: &str) -> String {
        format!("{} {}", query, self.config.query_suffix)
    }
}

#[async_trait]
impl WebSearch for GoogleSearchClient {
    fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        let (Some(api_key), Some(engine_id)) =
            (self.config.api_key.as_deref(), self.config.engine_id.as_deref())
        else {
            return Err(anyhow!("search credentials not configured"));
        };

        let search_query = self.search_query(query);
        debug!(query = %search_query, "Calling web search API");

        let num = self.config.num_results.to_string();
        let response = self
            .client
            .get(&self.config.base_url)
            .query(&[
                ("key", api_key),
                ("cx", engine_id),
                ("q", search_query.as_str()),
                ("num", num.as_str()),
            ])
            .send()
            .await
            .context("search request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("search API error {}: {}", status, body));
        }

        let payload: CustomSearchResponse = response
            .json()
            .await
            .context("search response was not valid JSON")?;

        Ok(payload
            .items
            .unwrap_or_default()
            .into_iter()
            .map(SearchResult::from)
            .collect())
    }
}
