// src/ingest/fetcher.rs
//! Per-source retrieval: feed first, homepage scrape as fallback, both behind the
//! URL cache. Nothing here returns an error to the caller; a broken source simply
//! produces no items.

use metrics::counter;
use tracing::{debug, info, warn};

use crate::clock::SharedClock;
use crate::ingest::cache::SharedCache;
use crate::ingest::clean_text;
use crate::ingest::http::SharedPageClient;
use crate::ingest::providers::feed::{parse_feed, FeedEntry};
use crate::ingest::providers::scrape::extract_links;
use crate::ingest::types::{NewsItem, SourceConfig};

/// Max feed entries considered per source.
pub const MAX_FEED_ENTRIES: usize = 50;
/// Max scraped headlines per source.
pub const MAX_SCRAPED_LINKS: usize = 10;

#[derive(Clone)]
pub struct SourceFetcher {
    client: SharedPageClient,
    cache: SharedCache,
    clock: SharedClock,
}

impl SourceFetcher {
    pub fn new(client: SharedPageClient, cache: SharedCache, clock: SharedClock) -> Self {
        Self {
            client,
            cache,
            clock,
        }
    }

    /// Feed items, or scraped headlines when the feed yields nothing.
    pub async fn fetch_source(&self, source: &SourceConfig) -> Vec<NewsItem> {
        let mut items = self.fetch_feed(source).await;

        if items.is_empty() {
            info!(source = %source.name, "feed empty, trying homepage scrape");
            counter!("ingest_scrape_fallbacks_total").increment(1);
            items = self.scrape_homepage(source).await;
        }

        counter!("ingest_items_total").increment(items.len() as u64);
        items
    }

    /// Primary strategy. Empty on fetch/parse failure.
    pub async fn fetch_feed(&self, source: &SourceConfig) -> Vec<NewsItem> {
        let body = match self.client.get_text(&source.feed_url).await {
            Ok(b) => b,
            Err(e) => {
                warn!(error = ?e, source = %source.name, "feed fetch failed");
                counter!("ingest_source_errors_total").increment(1);
                return Vec::new();
            }
        };
        let entries = match parse_feed(&body) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = ?e, source = %source.name, "feed parse failed");
                counter!("ingest_source_errors_total").increment(1);
                return Vec::new();
            }
        };

        entries
            .into_iter()
            .take(MAX_FEED_ENTRIES)
            .filter_map(|entry| self.item_from_entry(source, entry))
            .collect()
    }

    fn item_from_entry(&self, source: &SourceConfig, entry: FeedEntry) -> Option<NewsItem> {
        let Some(url) = entry.link else {
            debug!(source = %source.name, "feed entry without link skipped");
            return None;
        };

        if let Some(hit) = self.cached(&url) {
            return Some(hit);
        }

        let title = entry.title.as_deref().map(clean_text).unwrap_or_default();
        let summary = entry.summary.as_deref().map(clean_text);
        let published_at = entry.published.unwrap_or_else(|| self.clock.now());
        let item = NewsItem::new(&title, url, &source.name, published_at, summary.as_deref());

        self.cache.set(&item.url, &item);
        Some(item)
    }

    /// Secondary strategy: first scrape rule that matches anything wins.
    pub async fn scrape_homepage(&self, source: &SourceConfig) -> Vec<NewsItem> {
        let html = match self.client.get_text(&source.homepage).await {
            Ok(b) => b,
            Err(e) => {
                warn!(error = ?e, source = %source.name, "homepage scrape failed");
                counter!("ingest_source_errors_total").increment(1);
                return Vec::new();
            }
        };

        let links = extract_links(&html, &source.scrape_rules, &source.homepage, MAX_SCRAPED_LINKS);
        let now = self.clock.now();

        links
            .into_iter()
            .map(|link| {
                if let Some(hit) = self.cached(&link.url) {
                    return hit;
                }
                let item = NewsItem::new(&link.title, link.url, &source.name, now, None);
                self.cache.set(&item.url, &item);
                item
            })
            .collect()
    }

    fn cached(&self, url: &str) -> Option<NewsItem> {
        let hit = self.cache.get(url)?;
        counter!("ingest_cache_hits_total").increment(1);
        Some(hit)
    }
}
