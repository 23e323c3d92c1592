//! # Search Heuristic
//!
//! Decides whether a spoken query needs live web data. This is a flat rule set,
//! not a classifier: false positives and false negatives are expected.
//!
//! ## Decision order:
//! 1. Any topical keyword appears as a substring of the lower-cased text
//! 2. Any date/time or "what happened" regular expression matches
//! 3. A known city is mentioned together with "what", "happened" or "news"

use regex::RegexSet;
use std::sync::LazyLock;
use tracing::debug;

/// Substrings that indicate a question about recent or real-time information.
const CURRENT_EVENT_KEYWORDS: &[&str] = &[
    "current", "latest", "recent", "today", "yesterday", "this week", "this month",
    "this year", "happening now", "news", "stock market", "weather", "forecast",
    "covid", "pandemic", "election", "sports", "score", "winner", "president",
    "prime minister", "war", "conflict", "price of", "update on", "what is going on",
    "right now", "breaking", "last week", "last month", "jammu", "kashmir",
    "incident", "happened", "event", "attack", "border", "occurred", "took place",
];

/// Questions about dates, times and recent happenings.
const DATE_TIME_PATTERNS: &[&str] = &[
    r"what (day|date|time|month|year) is (it|today)",
    r"what is (today|tomorrow|yesterday)",
    r"what is the (date|time)",
    r"what is the current (time|year|month)",
    r"what is happening (today|now)",
    r"what happened (in|on|at|during) (last|this|the past|the previous|recent)",
    r"know what happened",
    r"tell me about (the|recent|latest)",
    r"news (about|on|in|regarding)",
];

const LOCATIONS: &[&str] = &[
    "jammu", "kashmir", "delhi", "mumbai", "kolkata", "chennai", "bangalore",
];

const LOCATION_QUESTION_WORDS: &[&str] = &["what", "happened", "news"];

static DATE_TIME_SET: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new(DATE_TIME_PATTERNS).expect("date/time search patterns are valid regexes")
});

/// Which rule triggered a search. Used for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchTrigger {
    Keyword(&'static str),
    Pattern(usize),
    Location(&'static str),
}

/// Return the first rule that asks for a web search, if any.
pub fn search_trigger(text: &str) -> Option<SearchTrigger> {
    let text_lower = text.to_lowercase();

    if let Some(keyword) = CURRENT_EVENT_KEYWORDS
        .iter()
        .find(|keyword| text_lower.contains(*keyword))
    {
        return Some(SearchTrigger::Keyword(*keyword));
    }

    if let Some(index) = DATE_TIME_SET.matches(&text_lower).iter().next() {
        return Some(SearchTrigger::Pattern(index));
    }

    let asks_about_events = LOCATION_QUESTION_WORDS
        .iter()
        .any(|word| text_lower.contains(word));
    if asks_about_events {
        if let Some(location) = LOCATIONS.iter().find(|location| text_lower.contains(*location)) {
            return Some(SearchTrigger::Location(*location));
        }
    }

    None
}

/// Whether the query should be augmented with web search results.
pub fn needs_search(text: &str) -> bool {
    match search_trigger(text) {
        Some(SearchTrigger::Keyword(keyword)) => {
            debug!(keyword, "Web search triggered by keyword in: '{}'", text);
            true
        }
        Some(SearchTrigger::Pattern(index)) => {
            debug!(
                pattern = DATE_TIME_PATTERNS[index],
                "Web search triggered by pattern match in: '{}'", text
            );
            true
        }
        Some(SearchTrigger::Location(location)) => {
            debug!(location, "Web search triggered by location query: '{}'", text);
            true
        }
        None => {
            debug!("No web search triggered for: '{}'", text);
            false
        }
    }
}
