// src/config/mod.rs
//! Runtime settings for the binary, read from the environment (`.env` included).

pub mod ai;

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::engine::RecencyMode;
use crate::ingest::aggregator::PoolConfig;
use crate::signal::{Direction, SignalFilter};

pub const DEFAULT_AUTHORITY_PATH: &str = "config/authority.json";
pub const DEFAULT_AI_CONFIG_PATH: &str = "config/ai.json";

#[derive(Debug, Clone)]
pub struct Settings {
    pub lookback_hours: u32,
    pub min_confidence: u8,
    pub pool: PoolConfig,
    pub cache_dir: PathBuf,
    pub recency: RecencyMode,
    /// Items handed to the annotator per run.
    pub max_analyses: usize,
    pub filter: SignalFilter,
    pub authority_path: PathBuf,
    pub ai_config_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            lookback_hours: 24,
            min_confidence: 0,
            pool: PoolConfig::default(),
            cache_dir: PathBuf::from("data/cache"),
            recency: RecencyMode::ScoringTime,
            max_analyses: 20,
            filter: SignalFilter::default(),
            authority_path: PathBuf::from(DEFAULT_AUTHORITY_PATH),
            ai_config_path: PathBuf::from(DEFAULT_AI_CONFIG_PATH),
        }
    }
}

/// Parse `key` or fall back to `default`; unparseable values are logged and ignored.
fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                warn!(key, value = %raw, "invalid setting, using default");
                default
            }
        },
        Err(_) => default,
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Settings {
    pub fn from_env() -> Self {
        let d = Self::default();

        let workers = env_parse("FETCH_WORKERS", d.pool.workers).max(1);
        let timeout_secs = env_parse("FETCH_TIMEOUT_SECS", d.pool.task_timeout.as_secs()).max(1);

        let recency = match env_nonempty("RECENCY_MODE") {
            Some(raw) => RecencyMode::parse(&raw).unwrap_or_else(|| {
                warn!(value = %raw, "unknown RECENCY_MODE, using scoring_time");
                RecencyMode::ScoringTime
            }),
            None => d.recency,
        };

        let direction = env_nonempty("SIGNAL_DIRECTION").and_then(|raw| {
            let dir = Direction::parse(&raw);
            if dir.is_none() {
                warn!(value = %raw, "unknown SIGNAL_DIRECTION, not filtering by direction");
            }
            dir
        });

        Self {
            lookback_hours: env_parse("LOOKBACK_HOURS", d.lookback_hours),
            min_confidence: env_parse("MIN_CONFIDENCE", d.min_confidence).min(100),
            pool: PoolConfig {
                workers,
                task_timeout: Duration::from_secs(timeout_secs),
            },
            cache_dir: env_nonempty("NEWS_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(d.cache_dir),
            recency,
            max_analyses: env_parse("MAX_ANALYSES", d.max_analyses),
            filter: SignalFilter {
                asset: env_nonempty("SIGNAL_ASSET"),
                direction,
            },
            authority_path: env_nonempty("AUTHORITY_PATH")
                .map(PathBuf::from)
                .unwrap_or(d.authority_path),
            ai_config_path: env_nonempty("AI_CONFIG_PATH")
                .map(PathBuf::from)
                .unwrap_or(d.ai_config_path),
        }
    }
}
