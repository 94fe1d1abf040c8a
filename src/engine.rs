//! # Signal Engine
//! Pure scoring that maps per-article analyses → per-asset `Signal`s.
//! No I/O apart from logs/metrics; the clock and authority table are injected.
//!
//! Policy: every actionable analysis contributes `sentiment × impact × recency ×
//! authority × confidence` to each asset it names. Assets with too little total
//! weight are dropped. The net score picks the direction; confidence blends how
//! much the two sides agree with how much evidence there is.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::analyze::{Impact, NewsAnalysis, Sentiment};
use crate::clock::SharedClock;
use crate::ingest::ensure_metrics_described;
use crate::ingest::types::truncate_chars;
use crate::signal::{Direction, Signal};
use crate::source_weights::SourceAuthority;

/// Assets whose summed weight is below this are not reported.
pub const MIN_EVIDENCE_WEIGHT: f64 = 1.0;
/// `net > LONG_THRESHOLD` → LONG.
pub const LONG_THRESHOLD: f64 = 0.2;
/// `net < SHORT_THRESHOLD` → SHORT.
pub const SHORT_THRESHOLD: f64 = -0.2;
pub const MAX_KEY_DRIVERS: usize = 5;
pub const MAX_RISK_NOTES: usize = 3;

const DRIVER_TITLE_CHARS: usize = 80;
const RISK_NOTE_CHARS: usize = 100;
/// Summed weight at which the evidence part of confidence saturates.
const WEIGHT_SATURATION: f64 = 3.0;

/// Which instant an analysis's age is measured from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecencyMode {
    /// Age is taken at scoring time against scoring time, so it is always zero
    /// and every analysis gets the full recency factor.
    #[default]
    ScoringTime,
    /// Age is `now - published_at`; analyses without a publish time count as fresh.
    PublishTime,
}

impl RecencyMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scoring_time" | "scoring" => Some(RecencyMode::ScoringTime),
            "publish_time" | "publish" => Some(RecencyMode::PublishTime),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub authority: SourceAuthority,
    pub recency: RecencyMode,
}

pub fn sentiment_score(s: Sentiment) -> i32 {
    match s {
        Sentiment::Bullish => 1,
        Sentiment::Bearish => -1,
        Sentiment::Neutral => 0,
    }
}

pub fn impact_score(i: Impact) -> u32 {
    match i {
        Impact::High => 3,
        Impact::Medium => 2,
        Impact::Low => 1,
    }
}

/// Step function: ≤ 6h → 1.0, ≤ 12h → 0.7, older → 0.4. Negative ages count as fresh.
pub fn recency_score(age: Duration) -> f64 {
    if age <= Duration::hours(6) {
        1.0
    } else if age <= Duration::hours(12) {
        0.7
    } else {
        0.4
    }
}

pub fn classify_direction(net: f64) -> Direction {
    if net > LONG_THRESHOLD {
        Direction::Long
    } else if net < SHORT_THRESHOLD {
        Direction::Short
    } else {
        Direction::Neutral
    }
}

/// `floor((agreement·0.4 + evidence·0.6) · 100)` where agreement is
/// `min(b,s)/max(b,s,1)` and evidence is `min(total_weight/3, 1)`.
pub fn blend_confidence(bullish: usize, bearish: usize, total_weight: f64) -> u8 {
    let agreement = bullish.min(bearish) as f64 / bullish.max(bearish).max(1) as f64;
    let weight_conf = (total_weight / WEIGHT_SATURATION).min(1.0);
    ((agreement * 0.4 + weight_conf * 0.6) * 100.0)
        .floor()
        .clamp(0.0, 100.0) as u8
}

/// Evidence collected for one asset.
#[derive(Default)]
struct AssetEvidence<'a> {
    total_score: f64,
    total_weight: f64,
    bullish: usize,
    bearish: usize,
    analyses: Vec<&'a NewsAnalysis>,
}

pub struct SignalEngine {
    cfg: EngineConfig,
    clock: SharedClock,
}

impl SignalEngine {
    pub fn new(cfg: EngineConfig, clock: SharedClock) -> Self {
        Self { cfg, clock }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    fn age_of(&self, a: &NewsAnalysis, now: DateTime<Utc>) -> Duration {
        match (self.cfg.recency, a.published_at) {
            (RecencyMode::PublishTime, Some(ts)) => now - ts,
            _ => Duration::zero(),
        }
    }

    /// Aggregate analyses into signals, strongest first. Assets keep first-appearance
    /// order among equal confidences.
    pub fn generate_signals(&self, analyses: &[NewsAnalysis], min_confidence: u8) -> Vec<Signal> {
        ensure_metrics_described();
        let now = self.clock.now();

        // 1) Group actionable analyses by asset, in first-appearance order.
        let mut order: Vec<String> = Vec::new();
        let mut by_asset: HashMap<String, AssetEvidence> = HashMap::new();

        for a in analyses.iter().filter(|a| a.actionable) {
            let recency = recency_score(self.age_of(a, now));
            let authority = self.cfg.authority.weight_for(&a.source);
            let sentiment = sentiment_score(a.sentiment);
            let impact = impact_score(a.impact);

            let weight = sentiment.abs() as f64 * impact as f64 * recency * authority
                * (a.confidence as f64 / 100.0);
            let score = sentiment as f64 * weight;

            let mut seen: Vec<&str> = Vec::with_capacity(a.assets.len());
            for asset in &a.assets {
                let asset = asset.trim();
                if asset.is_empty() || seen.iter().any(|s| s.eq_ignore_ascii_case(asset)) {
                    continue;
                }
                seen.push(asset);
                let key = asset.to_ascii_uppercase();

                let ev = by_asset.entry(key.clone()).or_insert_with(|| {
                    order.push(key);
                    AssetEvidence::default()
                });
                ev.total_score += score;
                ev.total_weight += weight;
                match a.sentiment {
                    Sentiment::Bullish => ev.bullish += 1,
                    Sentiment::Bearish => ev.bearish += 1,
                    Sentiment::Neutral => {}
                }
                ev.analyses.push(a);
            }
        }

        // 2) Gate, classify, and describe each asset.
        let mut signals = Vec::new();
        for asset in order {
            let Some(ev) = by_asset.remove(&asset) else {
                continue;
            };
            if ev.total_weight < MIN_EVIDENCE_WEIGHT {
                debug!(asset = %asset, weight = ev.total_weight, "insufficient evidence");
                continue;
            }

            let net = ev.total_score / ev.total_weight;
            let direction = classify_direction(net);
            let confidence = blend_confidence(ev.bullish, ev.bearish, ev.total_weight);
            if confidence < min_confidence {
                debug!(asset = %asset, confidence, min_confidence, "below confidence floor");
                continue;
            }

            let key_drivers = ev
                .analyses
                .iter()
                .filter(|a| matches!(a.impact, Impact::High | Impact::Medium))
                .take(MAX_KEY_DRIVERS)
                .map(|a| {
                    format!(
                        "• {}... ({})",
                        truncate_chars(&a.title, DRIVER_TITLE_CHARS),
                        a.source
                    )
                })
                .collect();

            let mut risk_notes: Vec<String> = ev
                .analyses
                .iter()
                .filter(|a| a.reasoning.to_lowercase().contains("risk"))
                .take(MAX_RISK_NOTES)
                .map(|a| truncate_chars(&a.reasoning, RISK_NOTE_CHARS))
                .collect();
            if ev.bullish > 0 && ev.bearish > 0 {
                risk_notes.push(format!(
                    "Mixed signals: {} bullish, {} bearish",
                    ev.bullish, ev.bearish
                ));
            }

            signals.push(Signal {
                asset,
                direction,
                confidence,
                key_drivers,
                risk_notes,
                news_count: ev.analyses.len(),
                last_updated: now,
            });
        }

        // 3) Strongest first; stable for ties.
        signals.sort_by(|a, b| b.confidence.cmp(&a.confidence));

        metrics::counter!("signals_emitted_total").increment(signals.len() as u64);
        info!(
            analyses = analyses.len(),
            signals = signals.len(),
            "signals generated"
        );
        signals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap()
    }

    fn engine(recency: RecencyMode) -> SignalEngine {
        SignalEngine::new(
            EngineConfig {
                authority: SourceAuthority::default_seed(),
                recency,
            },
            Arc::new(FixedClock::new(now())),
        )
    }

    fn analysis(
        asset: &str,
        sentiment: Sentiment,
        impact: Impact,
        source: &str,
        confidence: u8,
    ) -> NewsAnalysis {
        NewsAnalysis {
            title: format!("{asset} headline"),
            url: format!("https://example.com/{asset}/{confidence}"),
            source: source.to_string(),
            sentiment,
            impact,
            assets: vec![asset.to_string()],
            confidence,
            actionable: true,
            key_takeaways: vec![],
            reasoning: "Momentum".to_string(),
            published_at: None,
        }
    }

    #[test]
    fn single_bullish_high_coindesk() {
        let a = NewsAnalysis {
            title: "Bitcoin surges past $100K".into(),
            reasoning: "Strong buy pressure".into(),
            ..analysis("BTC", Sentiment::Bullish, Impact::High, "CoinDesk", 85)
        };
        let out = engine(RecencyMode::ScoringTime).generate_signals(&[a], 0);
        assert_eq!(out.len(), 1);
        let s = &out[0];
        assert_eq!(s.asset, "BTC");
        assert_eq!(s.direction, Direction::Long);
        assert_eq!(s.confidence, 51);
        assert_eq!(s.news_count, 1);
        assert_eq!(s.key_drivers, vec!["• Bitcoin surges past $100K... (CoinDesk)"]);
        assert!(s.risk_notes.is_empty());
        assert_eq!(s.last_updated, now());
    }

    #[test]
    fn balanced_sides_are_neutral_with_mixed_note() {
        let out = engine(RecencyMode::ScoringTime).generate_signals(
            &[
                analysis("BTC", Sentiment::Bullish, Impact::High, "CoinDesk", 85),
                analysis("BTC", Sentiment::Bearish, Impact::High, "CoinDesk", 85),
            ],
            0,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].direction, Direction::Neutral);
        assert_eq!(out[0].news_count, 2);
        assert_eq!(out[0].confidence, 100);
        assert!(out[0]
            .risk_notes
            .contains(&"Mixed signals: 1 bullish, 1 bearish".to_string()));
    }

    #[test]
    fn evidence_gate_boundary() {
        let e = engine(RecencyMode::ScoringTime);
        let below = analysis("SOL", Sentiment::Bullish, Impact::Low, "CoinDesk", 99);
        assert!(e.generate_signals(&[below], 0).is_empty());

        let at = analysis("SOL", Sentiment::Bullish, Impact::Low, "CoinDesk", 100);
        let out = e.generate_signals(&[at], 0);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].direction, Direction::Long);
        // Low-impact news counts as evidence but is not listed as a driver.
        assert!(out[0].key_drivers.is_empty());
        assert_eq!(out[0].news_count, 1);
    }

    #[test]
    fn direction_thresholds() {
        assert_eq!(classify_direction(0.3), Direction::Long);
        assert_eq!(classify_direction(-0.3), Direction::Short);
        assert_eq!(classify_direction(0.05), Direction::Neutral);
        assert_eq!(classify_direction(0.2), Direction::Neutral);
        assert_eq!(classify_direction(-0.2), Direction::Neutral);
    }

    #[test]
    fn moderate_net_goes_long() {
        // bullish weight 1.3 (medium, conf 65, authority 1.0) vs bearish 0.7 (low, default authority)
        let out = engine(RecencyMode::ScoringTime).generate_signals(
            &[
                analysis("ETH", Sentiment::Bullish, Impact::Medium, "CoinDesk", 65),
                analysis("ETH", Sentiment::Bearish, Impact::Low, "Some Blog", 100),
            ],
            0,
        );
        assert_eq!(out[0].direction, Direction::Long);
    }

    #[test]
    fn non_actionable_and_neutral_only_contribute_nothing() {
        let e = engine(RecencyMode::ScoringTime);
        let mut skipped = analysis("BTC", Sentiment::Bullish, Impact::High, "CoinDesk", 100);
        skipped.actionable = false;
        assert!(e.generate_signals(&[skipped], 0).is_empty());

        let neutral = analysis("BTC", Sentiment::Neutral, Impact::High, "CoinDesk", 100);
        assert!(e.generate_signals(&[neutral], 0).is_empty());
        assert!(e.generate_signals(&[], 0).is_empty());
    }

    #[test]
    fn min_confidence_filters() {
        let a = analysis("BTC", Sentiment::Bullish, Impact::High, "CoinDesk", 85);
        let e = engine(RecencyMode::ScoringTime);
        assert_eq!(e.generate_signals(std::slice::from_ref(&a), 51).len(), 1);
        assert!(e.generate_signals(&[a], 52).is_empty());
    }

    #[test]
    fn drivers_and_risk_notes_are_capped_but_mixed_note_is_extra() {
        let mut batch = Vec::new();
        for i in 0..4 {
            batch.push(NewsAnalysis {
                title: format!("Bull story {i}"),
                reasoning: "Liquidation risk is elevated".into(),
                ..analysis("BTC", Sentiment::Bullish, Impact::High, "CoinDesk", 90)
            });
        }
        for i in 0..3 {
            batch.push(NewsAnalysis {
                title: format!("Bear story {i}"),
                reasoning: "RISK of further outflows".into(),
                ..analysis("BTC", Sentiment::Bearish, Impact::High, "CoinDesk", 90)
            });
        }
        let out = engine(RecencyMode::ScoringTime).generate_signals(&batch, 0);
        let s = &out[0];
        assert_eq!(s.news_count, 7);
        assert_eq!(s.key_drivers.len(), MAX_KEY_DRIVERS);
        assert_eq!(s.risk_notes.len(), MAX_RISK_NOTES + 1);
        assert_eq!(
            s.risk_notes.last().map(String::as_str),
            Some("Mixed signals: 4 bullish, 3 bearish")
        );
    }

    #[test]
    fn long_titles_and_reasoning_are_truncated() {
        let a = NewsAnalysis {
            title: "x".repeat(120),
            reasoning: format!("risk {}", "y".repeat(200)),
            ..analysis("BTC", Sentiment::Bullish, Impact::High, "CoinDesk", 100)
        };
        let out = engine(RecencyMode::ScoringTime).generate_signals(&[a], 0);
        assert_eq!(out[0].key_drivers[0], format!("• {}... (CoinDesk)", "x".repeat(80)));
        assert_eq!(out[0].risk_notes[0].chars().count(), 100);
    }

    #[test]
    fn one_analysis_feeds_every_named_asset() {
        let a = NewsAnalysis {
            assets: vec!["BTC".into(), "ETH".into(), "btc".into()],
            ..analysis("BTC", Sentiment::Bearish, Impact::High, "CoinDesk", 100)
        };
        let out = engine(RecencyMode::ScoringTime).generate_signals(&[a], 0);
        let assets: Vec<_> = out.iter().map(|s| s.asset.as_str()).collect();
        assert_eq!(assets, vec!["BTC", "ETH"]);
        assert!(out.iter().all(|s| s.direction == Direction::Short && s.news_count == 1));
    }

    #[test]
    fn sorted_by_confidence_descending() {
        let out = engine(RecencyMode::ScoringTime).generate_signals(
            &[
                analysis("SOL", Sentiment::Bullish, Impact::Low, "CoinDesk", 100),
                analysis("BTC", Sentiment::Bullish, Impact::High, "CoinDesk", 100),
            ],
            0,
        );
        let assets: Vec<_> = out.iter().map(|s| s.asset.as_str()).collect();
        assert_eq!(assets, vec!["BTC", "SOL"]);
        assert!(out[0].confidence > out[1].confidence);
    }

    #[test]
    fn recency_steps() {
        assert_eq!(recency_score(Duration::zero()), 1.0);
        assert_eq!(recency_score(Duration::hours(6)), 1.0);
        assert_eq!(recency_score(Duration::hours(7)), 0.7);
        assert_eq!(recency_score(Duration::hours(12)), 0.7);
        assert_eq!(recency_score(Duration::hours(13)), 0.4);
        assert_eq!(recency_score(Duration::hours(-1)), 1.0);
    }

    #[test]
    fn publish_time_mode_decays_old_news() {
        let mut a = analysis("BTC", Sentiment::Bullish, Impact::Low, "CoinDesk", 100);
        a.published_at = Some(now() - Duration::hours(8));

        // Scoring-time mode ignores the publish time: weight 1.0 passes the gate.
        assert_eq!(
            engine(RecencyMode::ScoringTime)
                .generate_signals(std::slice::from_ref(&a), 0)
                .len(),
            1
        );
        // Publish-time mode: weight 0.7 fails it.
        assert!(engine(RecencyMode::PublishTime).generate_signals(&[a], 0).is_empty());
    }

    #[test]
    fn recency_mode_parse() {
        assert_eq!(RecencyMode::parse("publish_time"), Some(RecencyMode::PublishTime));
        assert_eq!(RecencyMode::parse("Scoring_Time"), Some(RecencyMode::ScoringTime));
        assert_eq!(RecencyMode::parse("later"), None);
    }
}
