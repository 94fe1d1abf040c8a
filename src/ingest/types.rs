// src/ingest/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_SUMMARY_CHARS: usize = 500;

/// One ingested article. Built by the source fetcher and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewsItem {
    pub title: String,
    pub url: String,
    pub source: String, // display name, e.g. "CoinDesk"
    pub published_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl NewsItem {
    /// Builds an item applying the title/summary length caps.
    pub fn new(
        title: &str,
        url: impl Into<String>,
        source: impl Into<String>,
        published_at: DateTime<Utc>,
        summary: Option<&str>,
    ) -> Self {
        let summary = summary
            .map(|s| truncate_chars(s, MAX_SUMMARY_CHARS))
            .filter(|s| !s.is_empty());
        Self {
            title: truncate_chars(title, MAX_TITLE_CHARS),
            url: url.into(),
            source: source.into(),
            published_at,
            summary,
        }
    }
}

/// Per-source configuration. Adding a source is a config change only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceConfig {
    pub id: String,
    pub name: String,
    pub feed_url: String,
    pub homepage: String,
    /// Tried in order; the first rule that yields any link wins.
    #[serde(default = "default_scrape_rules")]
    pub scrape_rules: Vec<String>,
}

pub fn default_scrape_rules() -> Vec<String> {
    [
        "h2 a",
        "h3 a",
        ".article-title a",
        "[data-test='article-title']",
        "article h2 a",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Char-boundary safe prefix.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
