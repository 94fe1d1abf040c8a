// src/ingest/config.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ingest::types::{default_scrape_rules, SourceConfig};

const ENV_PATH: &str = "NEWS_SOURCES_PATH";

#[derive(Deserialize)]
struct SourcesFile {
    sources: Vec<SourceConfig>,
}

/// Load sources from an explicit path. Supports TOML or JSON formats.
pub fn load_sources_from(path: &Path) -> Result<Vec<SourceConfig>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading sources from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_sources(&content, ext.as_str())
}

/// Load sources using env var + fallbacks:
/// 1) $NEWS_SOURCES_PATH
/// 2) config/sources.toml
/// 3) config/sources.json
/// 4) built-in seed
pub fn load_sources_default() -> Result<Vec<SourceConfig>> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_sources_from(&pb);
        } else {
            return Err(anyhow!("NEWS_SOURCES_PATH points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/sources.toml");
    if toml_p.exists() {
        return load_sources_from(&toml_p);
    }
    let json_p = PathBuf::from("config/sources.json");
    if json_p.exists() {
        return load_sources_from(&json_p);
    }
    Ok(default_sources())
}

fn parse_sources(s: &str, hint_ext: &str) -> Result<Vec<SourceConfig>> {
    if hint_ext == "toml" || (hint_ext != "json" && s.contains("[[sources]]")) {
        let v: SourcesFile = toml::from_str(s).context("parsing sources toml")?;
        return Ok(clean_list(v.sources));
    }
    // JSON: either {"sources": [...]} or a bare array.
    if let Ok(v) = serde_json::from_str::<SourcesFile>(s) {
        return Ok(clean_list(v.sources));
    }
    let v: Vec<SourceConfig> = serde_json::from_str(s).context("parsing sources json")?;
    Ok(clean_list(v))
}

/// Trim fields, drop entries without id/name, keep the first entry per id.
fn clean_list(items: Vec<SourceConfig>) -> Vec<SourceConfig> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for mut it in items {
        it.id = it.id.trim().to_string();
        it.name = it.name.trim().to_string();
        it.feed_url = it.feed_url.trim().to_string();
        it.homepage = it.homepage.trim().to_string();
        it.scrape_rules.retain(|r| !r.trim().is_empty());
        if it.id.is_empty() || it.name.is_empty() || !seen.insert(it.id.clone()) {
            continue;
        }
        out.push(it);
    }
    out
}

/// Built-in outlets used when no config file is present.
pub fn default_sources() -> Vec<SourceConfig> {
    [
        (
            "coindesk",
            "CoinDesk",
            "https://www.coindesk.com/arc/outboundfeeds/rss/",
            "https://www.coindesk.com/",
        ),
        (
            "cointelegraph",
            "Cointelegraph",
            "https://cointelegraph.com/rss",
            "https://cointelegraph.com/",
        ),
        (
            "bitcoin_magazine",
            "Bitcoin Magazine",
            "https://bitcoinmagazine.com/.rss/full/",
            "https://bitcoinmagazine.com/",
        ),
        (
            "decrypt",
            "Decrypt",
            "https://decrypt.co/feed",
            "https://decrypt.co/",
        ),
    ]
    .into_iter()
    .map(|(id, name, feed, home)| SourceConfig {
        id: id.to_string(),
        name: name.to_string(),
        feed_url: feed.to_string(),
        homepage: home.to_string(),
        scrape_rules: default_scrape_rules(),
    })
    .collect()
}
