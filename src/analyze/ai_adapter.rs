//! LLM annotator: provider abstraction + per-run call budget + keyword fallback.
//!
//! A provider returns a [`Verdict`] (the judgment part of a `NewsAnalysis`) or `None`.
//! Whenever it returns `None`, or the call budget is spent, the item is annotated by
//! the fallback annotator instead, so a run always yields one analysis per item.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::analyze::{Annotator, Impact, KeywordAnnotator, NewsAnalysis, Sentiment, SharedAnnotator};
use crate::config::ai::AiConfig;
use crate::ingest::types::NewsItem;

const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const MAX_TAKEAWAYS: usize = 3;
const MAX_REASONING_CHARS: usize = 300;

/// Judgment returned by a provider, before it is attached to an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub sentiment: Sentiment,
    pub impact: Impact,
    #[serde(default)]
    pub assets: Vec<String>,
    /// Accepts any number; clamped to 0–100 when applied.
    pub confidence: f64,
    #[serde(default)]
    pub actionable: bool,
    #[serde(default)]
    pub key_takeaways: Vec<String>,
    #[serde(default)]
    pub reasoning: String,
}

impl Verdict {
    fn apply(self, item: &NewsItem) -> NewsAnalysis {
        let mut assets: Vec<String> = Vec::new();
        for a in self.assets {
            let a = a.trim().to_ascii_uppercase();
            if !a.is_empty() && !assets.contains(&a) {
                assets.push(a);
            }
        }
        let confidence = if self.confidence.is_finite() {
            self.confidence.round().clamp(0.0, 100.0) as u8
        } else {
            0
        };
        NewsAnalysis {
            actionable: self.actionable && !assets.is_empty(),
            assets,
            confidence,
            key_takeaways: self
                .key_takeaways
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .take(MAX_TAKEAWAYS)
                .collect(),
            reasoning: self.reasoning.trim().chars().take(MAX_REASONING_CHARS).collect(),
            ..NewsAnalysis::for_item(item, self.sentiment, self.impact)
        }
    }
}

/// Low-level provider: does a *real* remote call. Separated so the same annotator
/// wrapper serves production and tests.
pub trait Provider: Send + Sync + 'static {
    fn judge<'a>(
        &'a self,
        item: &'a NewsItem,
    ) -> Pin<Box<dyn Future<Output = Option<Verdict>> + Send + 'a>>;
    fn name(&self) -> &'static str;
}

/// OpenAI Chat Completions in JSON mode.
pub struct OpenAiProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("crypto-news-signals/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(20))
            .build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            model: model.into(),
        })
    }
}

const SYSTEM_PROMPT: &str = "You analyze crypto market news for trading relevance. \
Reply with ONE JSON object and nothing else, with keys: \
sentiment (\"bullish\"|\"bearish\"|\"neutral\"), impact (\"high\"|\"medium\"|\"low\"), \
assets (array of upper-case tickers such as \"BTC\"), confidence (integer 0-100), \
actionable (boolean), key_takeaways (array of short strings), reasoning (one or two sentences; \
mention risk explicitly when there is one).";

fn user_prompt(item: &NewsItem) -> String {
    let mut s = format!("Source: {}\nTitle: {}\n", item.source, item.title);
    if let Some(summary) = &item.summary {
        s.push_str("Summary: ");
        s.push_str(summary);
        s.push('\n');
    }
    s
}

impl Provider for OpenAiProvider {
    fn judge<'a>(
        &'a self,
        item: &'a NewsItem,
    ) -> Pin<Box<dyn Future<Output = Option<Verdict>> + Send + 'a>> {
        Box::pin(async move {
            if self.api_key.is_empty() {
                return None;
            }

            #[derive(Serialize)]
            struct Msg<'a> {
                role: &'a str,
                content: &'a str,
            }
            #[derive(Serialize)]
            struct ResponseFormat {
                #[serde(rename = "type")]
                kind: &'static str,
            }
            #[derive(Serialize)]
            struct Req<'a> {
                model: &'a str,
                messages: Vec<Msg<'a>>,
                temperature: f32,
                max_tokens: u32,
                response_format: ResponseFormat,
            }
            #[derive(Deserialize)]
            struct Resp {
                choices: Vec<Choice>,
            }
            #[derive(Deserialize)]
            struct Choice {
                message: ChoiceMsg,
            }
            #[derive(Deserialize)]
            struct ChoiceMsg {
                content: String,
            }

            let user = user_prompt(item);
            let req = Req {
                model: &self.model,
                messages: vec![
                    Msg {
                        role: "system",
                        content: SYSTEM_PROMPT,
                    },
                    Msg {
                        role: "user",
                        content: &user,
                    },
                ],
                temperature: 0.1,
                max_tokens: 300,
                response_format: ResponseFormat {
                    kind: "json_object",
                },
            };

            let resp = match self
                .http
                .post(OPENAI_URL)
                .bearer_auth(&self.api_key)
                .json(&req)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    warn!(error = %e, "openai request failed");
                    return None;
                }
            };
            if !resp.status().is_success() {
                warn!(status = %resp.status(), "openai returned non-success");
                return None;
            }
            let body: Resp = resp.json().await.ok()?;
            let content = body.choices.first().map(|c| c.message.content.as_str())?;
            parse_verdict(content)
        })
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Parse a model reply. Tolerates code fences and prose around the JSON object.
pub fn parse_verdict(content: &str) -> Option<Verdict> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end < start {
        return None;
    }
    match serde_json::from_str(&content[start..=end]) {
        Ok(v) => Some(v),
        Err(e) => {
            debug!(error = %e, "unparseable verdict");
            None
        }
    }
}

/// Fixed verdict for tests and `AI_TEST_MODE=mock` runs.
#[derive(Clone)]
pub struct MockProvider {
    pub fixed: Option<Verdict>,
}

impl Provider for MockProvider {
    fn judge<'a>(
        &'a self,
        _item: &'a NewsItem,
    ) -> Pin<Box<dyn Future<Output = Option<Verdict>> + Send + 'a>> {
        let out = self.fixed.clone();
        Box::pin(async move { out })
    }
    fn name(&self) -> &'static str {
        "mock"
    }
}

pub struct LlmAnnotator<P: Provider> {
    provider: P,
    fallback: SharedAnnotator,
    call_limit: u32,
    calls: AtomicU32,
}

impl<P: Provider> LlmAnnotator<P> {
    pub fn new(provider: P, fallback: SharedAnnotator, call_limit: u32) -> Self {
        Self {
            provider,
            fallback,
            call_limit,
            calls: AtomicU32::new(0),
        }
    }

    /// Remote calls made so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }

    fn take_call(&self) -> bool {
        self.calls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.call_limit).then_some(n + 1)
            })
            .is_ok()
    }
}

#[async_trait]
impl<P: Provider> Annotator for LlmAnnotator<P> {
    async fn annotate(&self, item: &NewsItem) -> NewsAnalysis {
        if self.take_call() {
            if let Some(v) = self.provider.judge(item).await {
                return v.apply(item);
            }
            debug!(provider = self.provider.name(), url = %item.url, "no verdict, using fallback");
        }
        self.fallback.annotate(item).await
    }

    fn name(&self) -> &'static str {
        self.provider.name()
    }
}

/// Factory: build an annotator according to config and environment variables.
///
/// * `AI_TEST_MODE=mock` gives an LLM annotator over a provider that never answers,
///   which exercises the fallback path.
/// * Disabled config, unknown provider, or an HTTP client that fails to build gives the
///   keyword annotator.
pub fn build_annotator(config: &AiConfig) -> SharedAnnotator {
    let fallback: SharedAnnotator = Arc::new(KeywordAnnotator::default());

    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        let mock = MockProvider { fixed: None };
        return Arc::new(LlmAnnotator::new(mock, fallback, config.call_limit));
    }

    if !config.enabled {
        return fallback;
    }

    match config.provider.as_str() {
        "openai" => match OpenAiProvider::new(config.api_key.clone(), config.model.clone()) {
            Ok(p) => Arc::new(LlmAnnotator::new(p, fallback, config.call_limit)),
            Err(e) => {
                warn!(error = %e, "openai client build failed, using keyword annotator");
                fallback
            }
        },
        other => {
            warn!(provider = other, "unsupported annotator provider, using keyword annotator");
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item() -> NewsItem {
        NewsItem::new(
            "Bitcoin rally extends",
            "https://example.com/btc",
            "CoinDesk",
            Utc::now(),
            None,
        )
    }

    fn verdict() -> Verdict {
        Verdict {
            sentiment: Sentiment::Bearish,
            impact: Impact::High,
            assets: vec![" eth ".into(), "ETH".into()],
            confidence: 142.0,
            actionable: true,
            key_takeaways: vec!["ETF delay".into(), "".into()],
            reasoning: "Regulatory risk rising".into(),
        }
    }

    #[test]
    fn verdict_is_normalized() {
        let a = verdict().apply(&item());
        assert_eq!(a.assets, vec!["ETH"]);
        assert_eq!(a.confidence, 100);
        assert_eq!(a.key_takeaways, vec!["ETF delay"]);
        assert_eq!(a.url, "https://example.com/btc");
        assert!(a.published_at.is_some());
    }

    #[test]
    fn parses_fenced_reply() {
        let raw = "```json\n{\"sentiment\":\"bullish\",\"impact\":\"low\",\"assets\":[\"SOL\"],\"confidence\":61}\n```";
        let v = parse_verdict(raw).unwrap();
        assert_eq!(v.sentiment, Sentiment::Bullish);
        assert_eq!(v.assets, vec!["SOL"]);
        assert!(parse_verdict("no json here").is_none());
    }

    #[tokio::test]
    async fn uses_provider_then_falls_back_after_budget() {
        let ann = LlmAnnotator::new(
            MockProvider {
                fixed: Some(verdict()),
            },
            Arc::new(KeywordAnnotator::default()),
            1,
        );
        let first = ann.annotate(&item()).await;
        assert_eq!(first.sentiment, Sentiment::Bearish);

        let second = ann.annotate(&item()).await;
        assert_eq!(second.sentiment, Sentiment::Bullish);
        assert!(second.reasoning.starts_with("Based on keywords"));
        assert_eq!(ann.calls(), 1);
    }

    #[tokio::test]
    async fn silent_provider_falls_back() {
        let ann = LlmAnnotator::new(
            MockProvider { fixed: None },
            Arc::new(KeywordAnnotator::default()),
            5,
        );
        let a = ann.annotate(&item()).await;
        assert_eq!(a.confidence, 70);
        assert_eq!(a.assets, vec!["BTC"]);
    }
}
