// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod analyze;
pub mod clock;
pub mod config;
pub mod engine;
pub mod ingest;
pub mod signal;
pub mod source_weights;

// ---- Re-exports for stable public API ----
pub use crate::analyze::{annotate_batch, Annotator, Impact, NewsAnalysis, Sentiment};
pub use crate::engine::{EngineConfig, RecencyMode, SignalEngine};
pub use crate::ingest::aggregator::{Aggregator, PoolConfig};
pub use crate::ingest::fetcher::SourceFetcher;
pub use crate::ingest::types::{NewsItem, SourceConfig};
pub use crate::signal::{Direction, Signal, SignalFilter, SignalSummary};
pub use crate::source_weights::SourceAuthority;
