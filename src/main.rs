//! crypto-news-signals: binary entrypoint.
//! Fetches the configured outlets, annotates the newest articles, scores them into
//! per-asset signals and prints the result as JSON on stdout. Logs go to stderr.

use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crypto_news_signals::analyze::ai_adapter::build_annotator;
use crypto_news_signals::clock::system_clock;
use crypto_news_signals::config::ai::AiConfig;
use crypto_news_signals::config::Settings;
use crypto_news_signals::ingest::cache::FileCache;
use crypto_news_signals::ingest::config::load_sources_default;
use crypto_news_signals::ingest::http::ReqwestClient;
use crypto_news_signals::{
    annotate_batch, Aggregator, EngineConfig, Signal, SignalEngine, SignalSummary,
    SourceAuthority, SourceFetcher,
};

/// `LOG_FORMAT=json` switches to JSON lines; otherwise compact human output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("crypto_news_signals=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

#[derive(Serialize)]
struct Report<'a> {
    generated_at: chrono::DateTime<chrono::Utc>,
    lookback_hours: u32,
    articles: usize,
    analyzed: usize,
    annotator: &'static str,
    summary: SignalSummary,
    signals: &'a [Signal],
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let settings = Settings::from_env();
    let clock = system_clock();

    let sources = load_sources_default().context("loading news sources")?;
    let client = Arc::new(ReqwestClient::new()?);
    let cache = Arc::new(FileCache::new(&settings.cache_dir));
    let fetcher = SourceFetcher::new(client, cache, clock.clone());
    let aggregator = Aggregator::new(fetcher, sources, settings.pool, clock.clone());

    let items = aggregator.fetch(settings.lookback_hours, None).await;

    let annotator = build_annotator(&AiConfig::load_or_default(&settings.ai_config_path));
    let analyses = annotate_batch(annotator.as_ref(), &items, settings.max_analyses).await;

    let engine = SignalEngine::new(
        EngineConfig {
            authority: SourceAuthority::load_or_seed(&settings.authority_path),
            recency: settings.recency,
        },
        clock.clone(),
    );
    let signals = settings
        .filter
        .apply(engine.generate_signals(&analyses, settings.min_confidence));

    let report = Report {
        generated_at: clock.now(),
        lookback_hours: settings.lookback_hours,
        articles: items.len(),
        analyzed: analyses.len(),
        annotator: annotator.name(),
        summary: SignalSummary::of(&signals),
        signals: &signals,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    info!(signals = signals.len(), "done");
    Ok(())
}
