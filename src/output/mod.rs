//! Output module for run summaries and reports
//!
//! This module handles:
//! - The statistics accumulated during a run
//! - The frozen run summary persisted with each run
//! - Printing and markdown export of summaries

mod markdown;
pub mod stats;
mod summary;

pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use stats::{load_statistics, print_statistics, CatalogStats, RunStatistics, StoredStatistics};
pub use summary::{OutputError, OutputResult, RunSummary, RunTiming, StopReason};

use crate::config::format_duration;

/// Prints a run summary to stdout
pub fn print_summary(summary: &RunSummary) {
    let s = &summary.statistics;

    println!("=== Prefetch Run Summary ===\n");
    println!("Stop reason: {}", summary.stop_reason);
    if let Some(error) = &summary.error {
        println!("Error: {}", error);
    }
    println!(
        "Duration: {}",
        format_duration(summary.timing.total_duration_secs)
    );
    println!();

    println!("Items:");
    println!("  Movies prefetched: {}", s.movies_prefetched);
    println!("  Series prefetched: {}", s.series_prefetched);
    println!(
        "  Episodes prefetched: {} ({} found)",
        s.episodes_prefetched, s.episodes_found
    );
    println!("  Served from cache: {}", s.cached_count);
    println!("  Failed: {}", s.failed_count);
    println!();

    println!("Requests:");
    println!("  Pages fetched: {}", s.total_pages_fetched);
    println!(
        "  Stream requests: {} / {} succeeded",
        s.stream_requests_successful, s.stream_requests_sent
    );
    println!(
        "  Cache warm-up: {} / {} succeeded ({:.1}%)",
        s.cache_requests_successful,
        s.cache_requests_sent,
        summary.cache_success_rate()
    );
    println!();

    if !summary.processed_catalogs.is_empty() {
        println!("Catalogs:");
        for catalog in &summary.processed_catalogs {
            let status = match &catalog.error {
                Some(e) => format!(" [abandoned: {}]", e),
                None => String::new(),
            };
            println!(
                "  {} ({}): {} prefetched, {} cached, {} failed in {}{}",
                catalog.name,
                catalog.catalog_type,
                catalog.success_count,
                catalog.cached_count,
                catalog.failed_count,
                format_duration(catalog.duration_secs),
                status
            );
        }
        println!();
    }

    println!(
        "Success rate: {:.1}% ({:.2} items/minute)",
        summary.success_rate(),
        summary.items_per_minute()
    );
}
