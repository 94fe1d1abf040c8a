// src/analyze/keywords.rs
//! Keyword heuristic annotator. Looks at titles only.

use async_trait::async_trait;

use crate::analyze::{Annotator, AssetCatalog, Impact, NewsAnalysis, Sentiment};
use crate::ingest::types::{truncate_chars, NewsItem};

const TAKEAWAY_CHARS: usize = 80;

/// Keyword lists and per-outlet confidence. Matching is lowercase substring.
#[derive(Debug, Clone)]
pub struct KeywordRules {
    pub bullish: Vec<String>,
    pub bearish: Vec<String>,
    pub high_impact: Vec<String>,
    pub medium_impact: Vec<String>,
    /// Outlets whose articles get `trusted_confidence` instead of `base_confidence`.
    pub trusted_sources: Vec<String>,
    pub trusted_confidence: u8,
    pub base_confidence: u8,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

impl Default for KeywordRules {
    fn default() -> Self {
        Self {
            bullish: words(&["surge", "rally", "soar", "jump", "gain", "bull", "positive"]),
            bearish: words(&["plunge", "crash", "dump", "fall", "bear", "negative", "fear"]),
            high_impact: words(&["break", "record", "major", "significant", "alert", "urgent"]),
            medium_impact: words(&["update", "report", "data", "news"]),
            trusted_sources: words(&["coindesk", "the block"]),
            trusted_confidence: 70,
            base_confidence: 50,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct KeywordAnnotator {
    rules: KeywordRules,
    catalog: AssetCatalog,
}

impl KeywordAnnotator {
    pub fn new(rules: KeywordRules, catalog: AssetCatalog) -> Self {
        Self { rules, catalog }
    }

    pub fn analyze(&self, item: &NewsItem) -> NewsAnalysis {
        let title = item.title.to_lowercase();
        let hit = |list: &[String]| list.iter().any(|w| title.contains(w.as_str()));

        // Bullish words win when both sides appear.
        let sentiment = if hit(&self.rules.bullish) {
            Sentiment::Bullish
        } else if hit(&self.rules.bearish) {
            Sentiment::Bearish
        } else {
            Sentiment::Neutral
        };

        let impact = if hit(&self.rules.high_impact) {
            Impact::High
        } else if hit(&self.rules.medium_impact) {
            Impact::Medium
        } else {
            Impact::Low
        };

        let source = item.source.to_lowercase();
        let confidence = if self.rules.trusted_sources.iter().any(|s| source == *s) {
            self.rules.trusted_confidence
        } else {
            self.rules.base_confidence
        };

        let text = match &item.summary {
            Some(s) => format!("{} {}", item.title, s),
            None => item.title.clone(),
        };
        let assets = self.catalog.extract(&text);
        let actionable = !assets.is_empty();
        let key_takeaways = if actionable {
            vec![truncate_chars(&item.title, TAKEAWAY_CHARS)]
        } else {
            Vec::new()
        };

        NewsAnalysis {
            assets,
            confidence: confidence.min(100),
            actionable,
            key_takeaways,
            reasoning: format!(
                "Based on keywords in title: {} sentiment",
                sentiment.as_str()
            ),
            ..NewsAnalysis::for_item(item, sentiment, impact)
        }
    }
}

#[async_trait]
impl Annotator for KeywordAnnotator {
    async fn annotate(&self, item: &NewsItem) -> NewsAnalysis {
        self.analyze(item)
    }

    fn name(&self) -> &'static str {
        "keywords"
    }
}
