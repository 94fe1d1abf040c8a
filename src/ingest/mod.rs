// src/ingest/mod.rs
pub mod aggregator;
pub mod cache;
pub mod config;
pub mod fetcher;
pub mod http;
pub mod providers;
pub mod types;

use chrono::{DateTime, Duration, Utc};
use metrics::{describe_counter, describe_histogram};
use once_cell::sync::OnceCell;
use std::collections::HashSet;

use crate::ingest::cache::url_key;
use crate::ingest::types::NewsItem;

/// One-time metrics registration (so series show up once a recorder is installed).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_items_total", "Items produced by source fetchers.");
        describe_counter!(
            "ingest_cache_hits_total",
            "Items served from the URL cache instead of being re-parsed."
        );
        describe_counter!(
            "ingest_scrape_fallbacks_total",
            "Sources that fell back from feed to homepage scraping."
        );
        describe_counter!(
            "ingest_source_errors_total",
            "Source fetch failures (feed or page)."
        );
        describe_counter!(
            "ingest_source_timeouts_total",
            "Source tasks abandoned after their time box."
        );
        describe_histogram!("ingest_parse_ms", "Feed parse time in milliseconds.");
        describe_counter!("signals_emitted_total", "Signals produced by the engine.");
    });
}

/// Plain text from an HTML fragment: decode entities, strip tags, normalize quotes,
/// collapse whitespace.
pub fn clean_text(s: &str) -> String {
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());

    // Tags first so escaped markup in text (`&lt;b&gt;`) survives as literal text.
    let out = re_tags.replace_all(s, " ");
    let out = html_escape::decode_html_entities(&out)
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace('\u{00A0}', " ");
    re_ws.replace_all(&out, " ").trim().to_string()
}

/// Merge per-source results: drop repeated URLs, newest first, keep only items
/// strictly newer than `now - lookback`.
pub fn dedup_sort_window(
    items: Vec<NewsItem>,
    now: DateTime<Utc>,
    lookback: Duration,
) -> Vec<NewsItem> {
    let cutoff = now - lookback;

    let mut items = items;
    items.sort_by(|a, b| b.published_at.cmp(&a.published_at));

    let mut seen: HashSet<String> = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|it| it.published_at > cutoff)
        .filter(|it| seen.insert(url_key(&it.url)))
        .collect()
}
