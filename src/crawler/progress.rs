//! Progress snapshots published while a run is in flight

use crate::catalog::{CatalogType, ItemType};
use serde::Serialize;
use std::time::Duration;

/// What the worker is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressPhase {
    #[default]
    Idle,
    /// Fetching addon manifests
    Discovering,
    /// Waiting on a catalog page
    FetchingPage,
    /// Working through the items of the current page
    ProcessingItems,
    Finished,
}

/// Point-in-time view of a run for observers
///
/// Overwritten throughout the run; readers may see any intermediate state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProgressSnapshot {
    pub phase: ProgressPhase,

    /// 1-based index of the current catalog
    pub catalog_index: usize,
    pub total_catalogs: usize,
    pub current_catalog: Option<String>,
    pub current_catalog_type: Option<CatalogType>,
    pub current_item: Option<String>,
    pub current_item_type: Option<ItemType>,

    /// 1-based page number within the current catalog
    pub page_number: u32,
    pub page_items_discovered: usize,
    pub page_items_processed: usize,

    pub catalog_prefetched: u64,
    /// Per-catalog limit of the current catalog, -1 for unlimited
    pub catalog_limit: i64,

    pub movies_prefetched: u64,
    pub series_prefetched: u64,
    pub episodes_prefetched: u64,
    pub cached_count: u64,
    pub failed_count: u64,
    pub cache_requests_sent: u64,
    pub cache_requests_successful: u64,

    pub movies_global_limit: i64,
    pub series_global_limit: i64,

    pub elapsed_secs: f64,
    pub eta_secs: Option<f64>,
}

impl ProgressSnapshot {
    /// Recomputes elapsed time and ETA
    pub fn update_timing(&mut self, elapsed: Duration, budget: Option<Duration>) {
        self.elapsed_secs = elapsed.as_secs_f64();
        self.eta_secs = estimate_eta(
            elapsed,
            budget,
            self.movies_prefetched + self.series_prefetched,
            self.movies_global_limit,
            self.series_global_limit,
        );
    }
}

/// Estimates seconds left in a run
///
/// Two estimates are considered: time left in the execution budget, and time to
/// reach both global item limits at the current rate. The earlier one wins.
/// Returns None when neither applies.
pub fn estimate_eta(
    elapsed: Duration,
    budget: Option<Duration>,
    items_done: u64,
    movies_limit: i64,
    series_limit: i64,
) -> Option<f64> {
    let by_budget = budget.map(|b| b.saturating_sub(elapsed).as_secs_f64());

    let by_limits = if movies_limit >= 0 && series_limit >= 0 && items_done > 0 {
        let target = (movies_limit + series_limit) as u64;
        let per_item = elapsed.as_secs_f64() / items_done as f64;
        Some(per_item * target.saturating_sub(items_done) as f64)
    } else {
        None
    };

    match (by_budget, by_limits) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}
