//! Markdown summary generation
//!
//! This module renders a finished run as a human-readable markdown report,
//! including the overall counters and the per-catalog breakdown.

use crate::config::format_duration;
use crate::output::summary::{OutputResult, RunSummary};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes a markdown summary of a run
///
/// # Arguments
///
/// * `summary` - The run summary
/// * `output_path` - Path where the markdown file should be written
pub fn generate_markdown_summary(summary: &RunSummary, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_summary(summary);

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a run summary as markdown
pub fn format_markdown_summary(summary: &RunSummary) -> String {
    let mut md = String::new();
    let timing = &summary.timing;
    let s = &summary.statistics;

    md.push_str("# Streams Prefetcher Run Summary\n\n");

    // Run metadata
    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Started**: {}\n", timing.start_time.to_rfc3339()));
    if let Some(end) = timing.end_time {
        md.push_str(&format!("- **Finished**: {}\n", end.to_rfc3339()));
    }
    md.push_str(&format!(
        "- **Duration**: {}\n",
        format_duration(timing.total_duration_secs)
    ));
    md.push_str(&format!(
        "- **Discovery**: {}\n",
        format_duration(timing.discovery_duration_secs)
    ));
    md.push_str(&format!(
        "- **Processing**: {}\n",
        format_duration(timing.processing_duration_secs)
    ));
    md.push_str(&format!("- **Stop Reason**: {}\n", summary.stop_reason));
    if let Some(error) = &summary.error {
        md.push_str(&format!("- **Error**: {}\n", error));
    }
    md.push('\n');

    // Overall statistics
    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!(
        "- **Catalogs**: {} selected of {} in manifests ({} filtered)\n",
        s.selected_catalogs, s.total_catalogs_in_manifest, s.filtered_catalogs
    ));
    md.push_str(&format!("- **Pages Fetched**: {}\n", s.total_pages_fetched));
    md.push_str(&format!("- **Movies Prefetched**: {}\n", s.movies_prefetched));
    md.push_str(&format!("- **Series Prefetched**: {}\n", s.series_prefetched));
    md.push_str(&format!(
        "- **Episodes Prefetched**: {} of {} found\n",
        s.episodes_prefetched, s.episodes_found
    ));
    md.push_str(&format!("- **Served From Cache**: {}\n", s.cached_count));
    md.push_str(&format!("- **Failed**: {}\n", s.failed_count));
    if s.items_skipped_by_limit > 0 {
        md.push_str(&format!(
            "- **Skipped By Global Limit**: {}\n",
            s.items_skipped_by_limit
        ));
    }
    md.push_str(&format!(
        "- **Stream Requests**: {} / {} succeeded\n",
        s.stream_requests_successful, s.stream_requests_sent
    ));
    md.push_str(&format!(
        "- **Cache Warm-up Requests**: {} / {} succeeded\n",
        s.cache_requests_successful, s.cache_requests_sent
    ));
    md.push_str(&format!("- **Errors**: {}\n", s.errors));
    md.push_str(&format!(
        "- **Success Rate**: {:.2}%\n",
        summary.success_rate()
    ));
    md.push_str(&format!(
        "- **Rate**: {:.2} items/minute\n\n",
        summary.items_per_minute()
    ));

    // Catalog breakdown
    if !summary.processed_catalogs.is_empty() {
        md.push_str("## Catalogs\n\n");
        md.push_str("| Catalog | Type | Duration | Prefetched | Cached | Failed | Warm-up |\n");
        md.push_str("|---------|------|----------|------------|--------|--------|---------|\n");

        for catalog in &summary.processed_catalogs {
            md.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} | {}/{} |\n",
                catalog.name,
                catalog.catalog_type,
                format_duration(catalog.duration_secs),
                catalog.success_count,
                catalog.cached_count,
                catalog.failed_count,
                catalog.cache_requests_successful,
                catalog.cache_requests_sent
            ));
        }
        md.push('\n');

        let abandoned: Vec<_> = summary
            .processed_catalogs
            .iter()
            .filter_map(|c| c.error.as_ref().map(|e| (&c.name, e)))
            .collect();
        if !abandoned.is_empty() {
            md.push_str("## Abandoned Catalogs\n\n");
            for (name, error) in abandoned {
                md.push_str(&format!("- **{}**: {}\n", name, error));
            }
            md.push('\n');
        }
    }

    md
}
