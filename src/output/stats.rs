//! Run statistics and the stored-statistics report
//!
//! [`RunStatistics`] and [`CatalogStats`] are accumulated by the crawl
//! pipeline. [`load_statistics`] reads the persisted view used by `--stats`.

use crate::catalog::CatalogType;
use crate::config::format_duration;
use crate::output::summary::RunSummary;
use crate::storage::{RunRecord, Storage, StorageResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Run-wide counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunStatistics {
    /// Catalogs advertised by the manifests of the selected addons
    pub total_catalogs_in_manifest: u64,
    /// Manifest catalogs dropped as search-only or live TV
    pub filtered_catalogs: u64,
    /// Enabled selections that matched a prefetchable catalog
    pub selected_catalogs: u64,
    pub total_pages_fetched: u64,

    pub movies_prefetched: u64,
    pub series_prefetched: u64,
    pub episodes_prefetched: u64,
    pub episodes_found: u64,

    /// Items served from the freshness cache
    pub cached_count: u64,
    pub failed_count: u64,
    /// Items passed over because a global limit was exhausted
    pub items_skipped_by_limit: u64,

    pub stream_requests_sent: u64,
    pub stream_requests_successful: u64,
    pub cache_requests_sent: u64,
    pub cache_requests_successful: u64,

    /// Catalog-level failures (missing catalogs, page fetch errors)
    pub errors: u64,
}

/// Per-catalog breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogStats {
    pub name: String,
    pub catalog_id: String,
    pub catalog_type: CatalogType,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_secs: f64,
    pub success_count: u64,
    pub failed_count: u64,
    pub cached_count: u64,
    pub cache_requests_sent: u64,
    pub cache_requests_successful: u64,
    /// Why the catalog was abandoned, if it was
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CatalogStats {
    pub fn new(name: &str, catalog_id: &str, catalog_type: CatalogType) -> Self {
        Self {
            name: name.to_string(),
            catalog_id: catalog_id.to_string(),
            catalog_type,
            started_at: Utc::now(),
            finished_at: None,
            duration_secs: 0.0,
            success_count: 0,
            failed_count: 0,
            cached_count: 0,
            cache_requests_sent: 0,
            cache_requests_successful: 0,
            error: None,
        }
    }

    /// Closes the breakdown with the time spent on the catalog
    pub fn finish(&mut self, duration_secs: f64) {
        self.finished_at = Some(Utc::now());
        self.duration_secs = duration_secs;
    }
}

/// Persisted state shown by `--stats`
#[derive(Debug, Clone)]
pub struct StoredStatistics {
    /// Items currently tracked by the freshness cache
    pub freshness_records: u64,
    pub latest_run: Option<RunRecord>,
    pub latest_summary: Option<RunSummary>,
}

/// Loads statistics from storage
pub fn load_statistics(storage: &dyn Storage) -> StorageResult<StoredStatistics> {
    Ok(StoredStatistics {
        freshness_records: storage.count_freshness_records()?,
        latest_run: storage.get_latest_run()?,
        latest_summary: storage.get_latest_summary()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &StoredStatistics) {
    println!("=== Prefetch Statistics ===\n");

    println!("Freshness cache:");
    println!("  Tracked items: {}", stats.freshness_records);
    println!();

    match &stats.latest_run {
        Some(run) => {
            println!("Latest run:");
            println!("  Run ID: {}", run.id);
            println!("  Started: {}", run.started_at);
            if let Some(finished) = &run.finished_at {
                println!("  Finished: {}", finished);
            }
            println!("  Status: {}", run.status.to_db_string());
            if let Some(error) = &run.error {
                println!("  Error: {}", error);
            }
            println!();
        }
        None => {
            println!("No runs recorded yet.");
            return;
        }
    }

    if let Some(summary) = &stats.latest_summary {
        let s = &summary.statistics;
        println!("Last summary:");
        println!(
            "  Duration: {}",
            format_duration(summary.timing.total_duration_secs)
        );
        println!("  Stop reason: {}", summary.stop_reason);
        println!("  Movies prefetched: {}", s.movies_prefetched);
        println!("  Series prefetched: {}", s.series_prefetched);
        println!("  Episodes prefetched: {}", s.episodes_prefetched);
        println!("  Served from cache: {}", s.cached_count);
        println!("  Failed: {}", s.failed_count);
        println!(
            "  Cache warm-up: {} / {} succeeded",
            s.cache_requests_successful, s.cache_requests_sent
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{RunStatus, SqliteStorage};

    #[test]
    fn test_load_statistics_empty() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let stats = load_statistics(&storage).unwrap();
        assert_eq!(stats.freshness_records, 0);
        assert!(stats.latest_run.is_none());
        assert!(stats.latest_summary.is_none());
    }

    #[test]
    fn test_load_statistics_with_run() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage
            .mark_prefetched("movie:tt1", Some("One"), Utc::now())
            .unwrap();
        let run_id = storage.create_run(Some("abc")).unwrap();
        let mut summary = RunSummary::empty(Utc::now());
        summary.statistics.movies_prefetched = 1;
        storage
            .finish_run(run_id, RunStatus::Completed, None, Some(&summary))
            .unwrap();

        let stats = load_statistics(&storage).unwrap();
        assert_eq!(stats.freshness_records, 1);
        assert_eq!(stats.latest_run.unwrap().id, run_id);
        assert_eq!(
            stats.latest_summary.unwrap().statistics.movies_prefetched,
            1
        );
    }

    #[test]
    fn test_statistics_tolerate_missing_fields() {
        let stats: RunStatistics = serde_json::from_str(r#"{"movies_prefetched": 3}"#).unwrap();
        assert_eq!(stats.movies_prefetched, 3);
        assert_eq!(stats.errors, 0);
    }
}
