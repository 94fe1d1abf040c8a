// src/ingest/http.rs
//! Body fetching behind a small trait so fetchers run against fixtures in tests.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait PageClient: Send + Sync {
    /// GET `url` and return the body text; non-2xx is an error.
    async fn get_text(&self, url: &str) -> Result<String>;
}

pub type SharedPageClient = Arc<dyn PageClient>;

pub struct ReqwestClient {
    http: reqwest::Client,
}

impl ReqwestClient {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (compatible; crypto-news-signals/0.1)")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(10))
            .build()
            .context("building reqwest client")?;
        Ok(Self { http })
    }
}

#[async_trait]
impl PageClient for ReqwestClient {
    async fn get_text(&self, url: &str) -> Result<String> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("GET {url}: HTTP {status}"));
        }
        resp.text().await.with_context(|| format!("reading body of {url}"))
    }
}

/// Fixture client: serves canned bodies by URL, errors for anything unknown.
/// An optional per-URL delay lets tests exercise task timeouts.
#[derive(Default, Clone)]
pub struct StaticPages {
    pages: HashMap<String, String>,
    delays: HashMap<String, Duration>,
}

impl StaticPages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.pages.insert(url.into(), body.into());
        self
    }

    pub fn with_delay(mut self, url: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(url.into(), delay);
        self
    }
}

#[async_trait]
impl PageClient for StaticPages {
    async fn get_text(&self, url: &str) -> Result<String> {
        if let Some(d) = self.delays.get(url) {
            tokio::time::sleep(*d).await;
        }
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("GET {url}: connection refused (fixture)"))
    }
}
