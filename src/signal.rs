//! Per-asset trading signal shape plus the caller-side filters.
//!
//! Signals are computed fresh on every engine run and handed to the caller as-is;
//! nothing here persists or mutates them afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analyze::Sentiment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
    Neutral,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Long => "LONG",
            Direction::Short => "SHORT",
            Direction::Neutral => "NEUTRAL",
        }
    }

    /// Accepts direction names and sentiment words: "long"/"bullish", "short"/"bearish",
    /// "neutral".
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "long" | "bullish" => Some(Direction::Long),
            "short" | "bearish" => Some(Direction::Short),
            "neutral" => Some(Direction::Neutral),
            _ => None,
        }
    }
}

impl From<Sentiment> for Direction {
    fn from(s: Sentiment) -> Self {
        match s {
            Sentiment::Bullish => Direction::Long,
            Sentiment::Bearish => Direction::Short,
            Sentiment::Neutral => Direction::Neutral,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub asset: String,
    pub direction: Direction,
    /// 0–100.
    pub confidence: u8,
    pub key_drivers: Vec<String>,
    /// Up to 3 notes, plus one "Mixed signals" note when both sides are present.
    pub risk_notes: Vec<String>,
    pub news_count: usize,
    pub last_updated: DateTime<Utc>,
}

/// Post-hoc filters applied by callers after the engine has run.
#[derive(Debug, Clone, Default)]
pub struct SignalFilter {
    pub asset: Option<String>,
    pub direction: Option<Direction>,
}

impl SignalFilter {
    pub fn apply(&self, signals: Vec<Signal>) -> Vec<Signal> {
        let asset = self.asset.as_ref().map(|a| a.trim().to_ascii_uppercase());
        signals
            .into_iter()
            .filter(|s| asset.as_ref().map_or(true, |a| &s.asset == a))
            .filter(|s| self.direction.map_or(true, |d| s.direction == d))
            .collect()
    }
}

/// Direction counts over a result list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SignalSummary {
    pub total: usize,
    pub long: usize,
    pub short: usize,
    pub neutral: usize,
}

impl SignalSummary {
    pub fn of(signals: &[Signal]) -> Self {
        signals.iter().fold(Self::default(), |mut acc, s| {
            acc.total += 1;
            match s.direction {
                Direction::Long => acc.long += 1,
                Direction::Short => acc.short += 1,
                Direction::Neutral => acc.neutral += 1,
            }
            acc
        })
    }
}
