// src/analyze/mod.rs
//! Annotation boundary: turns `NewsItem`s into `NewsAnalysis` records.
//!
//! The judgment itself (sentiment, impact, which assets matter) comes from an
//! external reasoner plugged in through [`Annotator`]. [`KeywordAnnotator`] is a
//! keyword heuristic meant for tests and as the fallback when no reasoner answers.

pub mod ai_adapter;
pub mod assets;
pub mod keywords;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::ingest::types::NewsItem;

pub use crate::analyze::assets::AssetCatalog;
pub use crate::analyze::keywords::{KeywordAnnotator, KeywordRules};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Bullish,
    Bearish,
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Bullish => "bullish",
            Sentiment::Bearish => "bearish",
            Sentiment::Neutral => "neutral",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    High,
    Medium,
    Low,
}

/// Per-article judgment, produced outside the signal engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsAnalysis {
    pub title: String,
    pub url: String,
    pub source: String,
    pub sentiment: Sentiment,
    pub impact: Impact,
    #[serde(default)]
    pub assets: Vec<String>,
    /// 0–100.
    pub confidence: u8,
    pub actionable: bool,
    #[serde(default)]
    pub key_takeaways: Vec<String>,
    #[serde(default)]
    pub reasoning: String,
    /// Article publish time, when the annotator knows it. Only the publish-time
    /// recency mode reads it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

impl NewsAnalysis {
    /// Skeleton carrying the item's identity; annotators fill in the judgment.
    pub fn for_item(item: &NewsItem, sentiment: Sentiment, impact: Impact) -> Self {
        Self {
            title: item.title.clone(),
            url: item.url.clone(),
            source: item.source.clone(),
            sentiment,
            impact,
            assets: Vec::new(),
            confidence: 0,
            actionable: false,
            key_takeaways: Vec::new(),
            reasoning: String::new(),
            published_at: Some(item.published_at),
        }
    }
}

#[async_trait]
pub trait Annotator: Send + Sync {
    async fn annotate(&self, item: &NewsItem) -> NewsAnalysis;
    fn name(&self) -> &'static str;
}

pub type SharedAnnotator = Arc<dyn Annotator>;

/// Annotate at most `max_items` items (newest first, as the aggregator returns them).
pub async fn annotate_batch(
    annotator: &dyn Annotator,
    items: &[NewsItem],
    max_items: usize,
) -> Vec<NewsAnalysis> {
    let mut out = Vec::with_capacity(items.len().min(max_items));
    for item in items.iter().take(max_items) {
        out.push(annotator.annotate(item).await);
    }
    debug!(
        annotator = annotator.name(),
        annotated = out.len(),
        available = items.len(),
        "batch annotated"
    );
    out
}
