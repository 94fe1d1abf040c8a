// src/ingest/providers/feed.rs
//! RSS 2.0 / Atom parsing into flat feed entries.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use metrics::histogram;
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{
    format_description::well_known::{Rfc2822, Rfc3339},
    OffsetDateTime,
};

/// One entry as it appears in the feed, before caching / normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub summary: Option<String>,
}

// --- RSS 2.0 ---

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    guid: Option<Text>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

// --- Atom ---

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entry: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<Text>,
    #[serde(default)]
    link: Vec<AtomLink>,
    published: Option<String>,
    updated: Option<String>,
    summary: Option<Text>,
    content: Option<Text>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

/// Element text with attributes ignored (`<title type="html">`, `<guid isPermaLink>`).
#[derive(Debug, Deserialize)]
struct Text {
    #[serde(rename = "$text", default)]
    value: String,
}

/// Parse a feed body. RSS is tried first, then Atom.
pub fn parse_feed(body: &str) -> Result<Vec<FeedEntry>> {
    let t0 = std::time::Instant::now();
    let xml = scrub_html_entities_for_xml(body);

    let out = match from_str::<Rss>(&xml) {
        Ok(rss) => rss.channel.item.into_iter().map(from_rss).collect(),
        Err(_) if looks_like_atom(&xml) => from_str::<AtomFeed>(&xml)
            .context("parsing atom xml")?
            .entry
            .into_iter()
            .map(from_atom)
            .collect(),
        Err(e) => return Err(e).context("parsing rss xml"),
    };

    histogram!("ingest_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    Ok(out)
}

fn looks_like_atom(xml: &str) -> bool {
    xml.contains("<feed")
}

fn from_rss(it: Item) -> FeedEntry {
    // Some feeds only carry a permalink guid.
    let permalink = it
        .guid
        .map(|g| g.value.trim().to_string())
        .filter(|g| g.starts_with("http"));
    FeedEntry {
        title: non_empty(it.title),
        link: non_empty(it.link).or(permalink),
        published: it.pub_date.as_deref().and_then(parse_rfc2822),
        summary: non_empty(it.description),
    }
}

fn from_atom(e: AtomEntry) -> FeedEntry {
    let link = e
        .link
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| e.link.first())
        .and_then(|l| l.href.clone());
    let published = e
        .published
        .as_deref()
        .or(e.updated.as_deref())
        .and_then(parse_rfc3339);
    FeedEntry {
        title: non_empty(e.title.map(|t| t.value)),
        link: non_empty(link),
        published,
        summary: non_empty(e.summary.or(e.content).map(|t| t.value)),
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn to_chrono(dt: OffsetDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(dt.unix_timestamp(), dt.nanosecond())
}

pub fn parse_rfc2822(ts: &str) -> Option<DateTime<Utc>> {
    let ts = ts.trim();
    OffsetDateTime::parse(ts, &Rfc2822)
        .ok()
        .and_then(to_chrono)
        .or_else(|| {
            DateTime::parse_from_rfc2822(ts)
                .ok()
                .map(|d| d.with_timezone(&Utc))
        })
}

pub fn parse_rfc3339(ts: &str) -> Option<DateTime<Utc>> {
    let ts = ts.trim();
    OffsetDateTime::parse(ts, &Rfc3339)
        .ok()
        .and_then(to_chrono)
        .or_else(|| {
            DateTime::parse_from_rfc3339(ts)
                .ok()
                .map(|d| d.with_timezone(&Utc))
        })
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}
