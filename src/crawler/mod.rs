//! Crawler module for catalog walking and item prefetching
//!
//! This module contains the core prefetch logic, including:
//! - Per-catalog and global limit tracking
//! - Cooperative checkpoints for pause, cancel and the time budget
//! - Item prefetching against the freshness cache
//! - Stream cache warming
//! - Overall crawl coordination and progress reporting

mod checkpoint;
mod limits;
mod pipeline;
mod prefetcher;
mod progress;
mod warmer;

pub use checkpoint::{Checkpoint, RunControl, Uninterrupted};
pub use limits::{CatalogQuota, Limit, LimitTracker, RunLimits};
pub use pipeline::{CrawlOutcome, CrawlPipeline};
pub use prefetcher::{ItemOutcome, ItemPrefetcher, PrefetchReport};
pub use progress::{estimate_eta, ProgressPhase, ProgressSnapshot};
pub use warmer::{classify_streams, StreamWarmer, WarmBudget, WarmOutcome};

use crate::catalog::CatalogSource;
use crate::config::RunConfig;
use crate::output::StopReason;
use crate::storage::Storage;
use crate::PrefetchError;
use tokio::sync::watch;

/// Runs a complete prefetch pass without external control
///
/// Convenience for callers that do not need pause or cancel. Returns the stop
/// reason together with the collected statistics.
pub async fn crawl(
    source: &dyn CatalogSource,
    storage: &mut dyn Storage,
    config: &RunConfig,
) -> Result<(StopReason, CrawlOutcome), PrefetchError> {
    let (progress, _) = watch::channel(ProgressSnapshot::default());
    let mut pipeline = CrawlPipeline::new(source, storage, config, &Uninterrupted, &progress);
    let reason = pipeline.run().await?;
    Ok((reason, pipeline.into_outcome()))
}
