// tests/ingest_pipeline.rs
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use crypto_news_signals::clock::{FixedClock, SharedClock};
use crypto_news_signals::ingest::cache::{default_ttl, CacheStore, FileCache, MemoryCache};
use crypto_news_signals::ingest::http::StaticPages;
use crypto_news_signals::ingest::types::default_scrape_rules;
use crypto_news_signals::{Aggregator, PoolConfig, SourceConfig, SourceFetcher};

const COINDESK_RSS: &str = include_str!("fixtures/coindesk_rss.xml");
const DECRYPT_ATOM: &str = include_str!("fixtures/decrypt_atom.xml");
const COINTELEGRAPH_HOME: &str = include_str!("fixtures/cointelegraph_home.html");

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap()
}

fn source(id: &str, name: &str, feed: &str, home: &str) -> SourceConfig {
    SourceConfig {
        id: id.into(),
        name: name.into(),
        feed_url: feed.into(),
        homepage: home.into(),
        scrape_rules: default_scrape_rules(),
    }
}

fn sources() -> Vec<SourceConfig> {
    vec![
        source("coindesk", "CoinDesk", "https://cd.test/rss", "https://cd.test/"),
        source("decrypt", "Decrypt", "https://decrypt.test/feed", "https://decrypt.test/"),
        // Feed URL not served: falls back to the homepage.
        source(
            "cointelegraph",
            "Cointelegraph",
            "https://ct.test/rss",
            "https://cointelegraph.com/",
        ),
    ]
}

fn pages() -> StaticPages {
    StaticPages::new()
        .with_page("https://cd.test/rss", COINDESK_RSS)
        .with_page("https://decrypt.test/feed", DECRYPT_ATOM)
        .with_page("https://cointelegraph.com/", COINTELEGRAPH_HOME)
}

fn fetcher(pages: StaticPages, clock: SharedClock) -> SourceFetcher {
    let cache = Arc::new(MemoryCache::new(clock.clone()));
    SourceFetcher::new(Arc::new(pages), cache, clock)
}

#[tokio::test]
async fn rss_feed_items_are_normalized() {
    let clock: SharedClock = Arc::new(FixedClock::new(now()));
    let f = fetcher(pages(), clock);

    let items = f.fetch_source(&sources()[0]).await;
    assert_eq!(items.len(), 3);
    assert_eq!(items[0].title, "Bitcoin surges past $100K as ETF inflows hit record");
    assert_eq!(items[0].source, "CoinDesk");
    assert_eq!(
        items[0].summary.as_deref(),
        Some("Spot ETF demand lifted BTC to a new high.")
    );
    assert_eq!(
        items[0].published_at,
        Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap()
    );
}

#[tokio::test]
async fn cached_item_is_served_instead_of_reparsing() {
    let dir = tempfile::tempdir().unwrap();
    let clock: SharedClock = Arc::new(FixedClock::new(now()));
    let cache = Arc::new(FileCache::with_clock(dir.path(), default_ttl(), clock.clone()));

    let first = SourceFetcher::new(Arc::new(pages()), cache.clone(), clock.clone());
    first.fetch_source(&sources()[0]).await;

    // Same links, different titles: the cache wins while entries are fresh.
    let edited = COINDESK_RSS.replace("Ether prices fall", "Ether prices tumble");
    let second = SourceFetcher::new(
        Arc::new(StaticPages::new().with_page("https://cd.test/rss", edited)),
        cache.clone(),
        clock,
    );
    let items = second.fetch_source(&sources()[0]).await;
    assert!(items.iter().any(|i| i.title.starts_with("Ether prices fall")));

    let hit = cache
        .get("https://www.coindesk.com/markets/2025/01/15/ether-prices-fall")
        .unwrap();
    assert_eq!(hit.source, "CoinDesk");
}

#[tokio::test]
async fn expired_cache_entry_is_reparsed() {
    let fixed = Arc::new(FixedClock::new(now()));
    let clock: SharedClock = fixed.clone();
    let cache = Arc::new(MemoryCache::new(clock.clone()));

    let first = SourceFetcher::new(Arc::new(pages()), cache.clone(), clock.clone());
    first.fetch_source(&sources()[0]).await;

    fixed.advance(chrono::Duration::hours(3));
    let edited = COINDESK_RSS.replace("Ether prices fall", "Ether prices tumble");
    let second = SourceFetcher::new(
        Arc::new(StaticPages::new().with_page("https://cd.test/rss", edited)),
        cache,
        clock,
    );
    let items = second.fetch_source(&sources()[0]).await;
    assert!(items.iter().any(|i| i.title.starts_with("Ether prices tumble")));
}

#[tokio::test]
async fn broken_feed_falls_back_to_homepage_scrape() {
    let clock: SharedClock = Arc::new(FixedClock::new(now()));
    let f = fetcher(pages(), clock);

    let items = f.fetch_source(&sources()[2]).await;
    let urls: Vec<_> = items.iter().map(|i| i.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "https://cointelegraph.com/news/xrp-jumps-on-court-ruling",
            "https://cointelegraph.com/news/dogecoin-plunges",
        ]
    );
    assert_eq!(items[1].title, "Dogecoin plunges amid market fear");
    assert!(items.iter().all(|i| i.published_at == now() && i.summary.is_none()));
    assert!(items.iter().all(|i| i.source == "Cointelegraph"));
}

#[tokio::test]
async fn dead_source_yields_nothing() {
    let clock: SharedClock = Arc::new(FixedClock::new(now()));
    let f = fetcher(StaticPages::new(), clock);
    assert!(f.fetch_source(&sources()[0]).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn aggregate_dedups_windows_and_orders() {
    let clock: SharedClock = Arc::new(FixedClock::new(now()));
    // Decrypt reads its syndicated link after CoinDesk has cached the original.
    let pages = pages().with_delay("https://decrypt.test/feed", Duration::from_secs(1));
    let agg = Aggregator::new(fetcher(pages, clock.clone()), sources(), PoolConfig::default(), clock);

    let items = agg.fetch(24, None).await;
    assert_eq!(items.len(), 5);

    // Scraped headlines carry fetch time, so they lead.
    assert!(items[..2].iter().all(|i| i.source == "Cointelegraph"));
    let rest: Vec<_> = items[2..].iter().map(|i| (i.source.as_str(), i.title.as_str())).collect();
    assert_eq!(
        rest,
        vec![
            ("CoinDesk", "Bitcoin surges past $100K as ETF inflows hit record"),
            ("CoinDesk", "Ether prices fall as staking data shows outflows"),
            ("Decrypt", "Bitcoin miners rally after hashrate record"),
        ]
    );
    assert!(items.windows(2).all(|w| w[0].published_at >= w[1].published_at));
    assert!(!items.iter().any(|i| i.title.contains("syndicated")));
    assert!(!items.iter().any(|i| i.title.contains("Solana")));
}

fn one_item_feed(link: &str, title: &str) -> String {
    format!(
        r#"<?xml version="1.0"?><rss version="2.0"><channel><title>t</title>
<item><title>{title}</title><link>{link}</link><pubDate>Wed, 15 Jan 2025 11:00:00 +0000</pubDate></item>
</channel></rss>"#
    )
}

async fn fetch_tied_pair(slow_feed: &str) -> Vec<String> {
    let clock: SharedClock = Arc::new(FixedClock::new(now()));
    let pages = StaticPages::new()
        .with_page("https://a.test/rss", one_item_feed("https://a.test/x", "Alpha story"))
        .with_page("https://b.test/rss", one_item_feed("https://b.test/y", "Beta story"))
        .with_delay(slow_feed, Duration::from_secs(2));
    let sources = vec![
        source("a", "Alpha", "https://a.test/rss", "https://a.test/"),
        source("b", "Beta", "https://b.test/rss", "https://b.test/"),
    ];
    let agg = Aggregator::new(fetcher(pages, clock.clone()), sources, PoolConfig::default(), clock);
    agg.fetch(24, None).await.into_iter().map(|i| i.url).collect()
}

#[tokio::test(start_paused = true)]
async fn completion_order_does_not_change_output() {
    let alpha_slow = fetch_tied_pair("https://a.test/rss").await;
    let beta_slow = fetch_tied_pair("https://b.test/rss").await;

    // Same timestamp: configuration order breaks the tie.
    assert_eq!(alpha_slow, vec!["https://a.test/x", "https://b.test/y"]);
    assert_eq!(alpha_slow, beta_slow);
}

#[tokio::test]
async fn wider_window_includes_older_items() {
    let clock: SharedClock = Arc::new(FixedClock::new(now()));
    let agg = Aggregator::new(fetcher(pages(), clock.clone()), sources(), PoolConfig::default(), clock);
    let items = agg.fetch(72, None).await;
    assert!(items.iter().any(|i| i.title.contains("Solana")));
}

#[tokio::test]
async fn only_selected_sources_are_fetched() {
    let clock: SharedClock = Arc::new(FixedClock::new(now()));
    let agg = Aggregator::new(fetcher(pages(), clock.clone()), sources(), PoolConfig::default(), clock);

    let only = vec!["decrypt".to_string(), "nope".to_string()];
    let items = agg.fetch(24, Some(&only)).await;
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|i| i.source == "Decrypt"));
    // Without CoinDesk in the run, the syndicated copy survives.
    assert!(items.iter().any(|i| i.title.contains("syndicated")));
}

#[tokio::test(start_paused = true)]
async fn slow_source_is_timed_out_without_hurting_siblings() {
    let clock: SharedClock = Arc::new(FixedClock::new(now()));
    let slow = pages().with_delay("https://decrypt.test/feed", Duration::from_secs(60));
    let pool = PoolConfig {
        workers: 1,
        task_timeout: Duration::from_secs(5),
    };
    let agg = Aggregator::new(fetcher(slow, clock.clone()), sources(), pool, clock);

    let items = agg.fetch(24, None).await;
    assert!(!items.iter().any(|i| i.source == "Decrypt"));
    assert_eq!(items.iter().filter(|i| i.source == "CoinDesk").count(), 2);
    assert_eq!(items.iter().filter(|i| i.source == "Cointelegraph").count(), 2);
}

#[tokio::test]
async fn no_sources_is_empty() {
    let clock: SharedClock = Arc::new(FixedClock::new(now()));
    let agg = Aggregator::new(fetcher(pages(), clock.clone()), Vec::new(), PoolConfig::default(), clock);
    assert!(agg.fetch(24, None).await.is_empty());
}
