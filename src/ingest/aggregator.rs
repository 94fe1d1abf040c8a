// src/ingest/aggregator.rs
//! Concurrent multi-source fetch with a bounded worker pool.
//!
//! One task per source is spawned onto a `JoinSet`; a `Semaphore` caps how many run
//! at once. Each task is time-boxed from the moment it gets a worker slot, so the
//! whole call is bounded by `timeout * ceil(sources / workers)`. A task that runs
//! over is dropped and its source contributes nothing this cycle; siblings keep
//! going. Results are concatenated in configuration order before the final sort,
//! so completion order never reaches the output.

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use metrics::counter;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::clock::SharedClock;
use crate::ingest::fetcher::SourceFetcher;
use crate::ingest::types::{NewsItem, SourceConfig};
use crate::ingest::{dedup_sort_window, ensure_metrics_described};

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub workers: usize,
    pub task_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            task_timeout: Duration::from_secs(30),
        }
    }
}

enum TaskOutcome {
    Done(Vec<NewsItem>),
    TimedOut,
}

pub struct Aggregator {
    fetcher: SourceFetcher,
    sources: Vec<SourceConfig>,
    pool: PoolConfig,
    clock: SharedClock,
}

impl Aggregator {
    pub fn new(
        fetcher: SourceFetcher,
        sources: Vec<SourceConfig>,
        pool: PoolConfig,
        clock: SharedClock,
    ) -> Self {
        Self {
            fetcher,
            sources,
            pool,
            clock,
        }
    }

    pub fn sources(&self) -> &[SourceConfig] {
        &self.sources
    }

    /// Fetch all (or the selected) sources and return deduplicated items newer than
    /// `now - lookback_hours`, newest first.
    pub async fn fetch(&self, lookback_hours: u32, only: Option<&[String]>) -> Vec<NewsItem> {
        ensure_metrics_described();

        let selected: Vec<SourceConfig> = match only {
            None => self.sources.clone(),
            Some(ids) => {
                for id in ids {
                    if !self.sources.iter().any(|s| &s.id == id) {
                        warn!(source = %id, "unknown source id skipped");
                    }
                }
                self.sources
                    .iter()
                    .filter(|s| ids.contains(&s.id))
                    .cloned()
                    .collect()
            }
        };

        let all = self.run_pool(selected).await;
        let out = dedup_sort_window(
            all,
            self.clock.now(),
            ChronoDuration::hours(i64::from(lookback_hours)),
        );

        info!(total = out.len(), hours = lookback_hours, "articles within window");
        out
    }

    /// Results are reassembled in configuration order, so completion order never
    /// decides ties in the later sort or which duplicate survives.
    async fn run_pool(&self, sources: Vec<SourceConfig>) -> Vec<NewsItem> {
        let permits = Arc::new(Semaphore::new(self.pool.workers.max(1)));
        let timeout = self.pool.task_timeout;
        let mut set = JoinSet::new();
        let mut slots: Vec<Option<Vec<NewsItem>>> = vec![None; sources.len()];

        for (idx, source) in sources.into_iter().enumerate() {
            let fetcher = self.fetcher.clone();
            let permits = permits.clone();
            set.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return (idx, source.name, TaskOutcome::Done(Vec::new()));
                };
                let outcome = match tokio::time::timeout(timeout, fetcher.fetch_source(&source)).await {
                    Ok(items) => TaskOutcome::Done(items),
                    Err(_) => TaskOutcome::TimedOut,
                };
                (idx, source.name, outcome)
            });
        }

        // Join barrier.
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, name, TaskOutcome::Done(items))) => {
                    info!(source = %name, count = items.len(), "fetched");
                    slots[idx] = Some(items);
                }
                Ok((_, name, TaskOutcome::TimedOut)) => {
                    warn!(source = %name, timeout_secs = timeout.as_secs_f64(), "source timed out, results discarded");
                    counter!("ingest_source_timeouts_total").increment(1);
                }
                Err(e) => {
                    warn!(error = ?e, "source task failed");
                    counter!("ingest_source_errors_total").increment(1);
                }
            }
        }
        slots.into_iter().flatten().flatten().collect()
    }
}
