//! Run summary types
//!
//! A [`RunSummary`] is frozen when a job reaches a terminal state. It is
//! persisted as JSON with the run record and rendered by the output helpers.

use crate::output::stats::{CatalogStats, RunStatistics};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every selected catalog was walked to its end or limit
    #[default]
    Completed,
    CancelledByUser,
    /// The execution-time budget ran out
    TimeLimit,
    Failed,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::CancelledByUser => "cancelled by user",
            Self::TimeLimit => "execution time limit reached",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wall-clock timing of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunTiming {
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Time spent fetching manifests before the first catalog page
    pub discovery_duration_secs: f64,
    pub processing_duration_secs: f64,
    pub total_duration_secs: f64,
}

/// Frozen record of a finished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub timing: RunTiming,
    pub stop_reason: StopReason,
    pub statistics: RunStatistics,
    /// Catalogs the run reached, in processing order
    pub processed_catalogs: Vec<CatalogStats>,
    /// Message of the error that failed the run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunSummary {
    /// Creates a summary with zeroed statistics
    pub fn empty(start_time: DateTime<Utc>) -> Self {
        Self {
            timing: RunTiming {
                start_time,
                end_time: None,
                discovery_duration_secs: 0.0,
                processing_duration_secs: 0.0,
                total_duration_secs: 0.0,
            },
            stop_reason: StopReason::Completed,
            statistics: RunStatistics::default(),
            processed_catalogs: Vec::new(),
            error: None,
        }
    }

    /// Movies, series and episodes prefetched in total
    pub fn items_prefetched(&self) -> u64 {
        let s = &self.statistics;
        s.movies_prefetched + s.series_prefetched + s.episodes_prefetched
    }

    /// Prefetched items per minute of processing time
    pub fn items_per_minute(&self) -> f64 {
        let minutes = self.timing.processing_duration_secs / 60.0;
        if minutes <= 0.0 {
            return 0.0;
        }
        (self.statistics.movies_prefetched + self.statistics.series_prefetched) as f64 / minutes
    }

    /// Percentage of attempted movies and series that succeeded
    pub fn success_rate(&self) -> f64 {
        let s = &self.statistics;
        let succeeded = s.movies_prefetched + s.series_prefetched;
        let attempted = succeeded + s.failed_count;
        if attempted == 0 {
            return 0.0;
        }
        (succeeded as f64 / attempted as f64) * 100.0
    }

    /// Percentage of cache warm-up requests that succeeded
    pub fn cache_success_rate(&self) -> f64 {
        let s = &self.statistics;
        if s.cache_requests_sent == 0 {
            return 0.0;
        }
        (s.cache_requests_successful as f64 / s.cache_requests_sent as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_summary() {
        let summary = RunSummary::empty(Utc::now());
        assert_eq!(summary.stop_reason, StopReason::Completed);
        assert_eq!(summary.items_prefetched(), 0);
        assert!(summary.processed_catalogs.is_empty());
    }

    #[test]
    fn test_items_per_minute() {
        let mut summary = RunSummary::empty(Utc::now());
        summary.timing.processing_duration_secs = 120.0;
        summary.statistics.movies_prefetched = 10;
        summary.statistics.series_prefetched = 2;
        assert!((summary.items_per_minute() - 6.0).abs() < 0.001);
    }

    #[test]
    fn test_items_per_minute_zero_duration() {
        let mut summary = RunSummary::empty(Utc::now());
        summary.statistics.movies_prefetched = 10;
        assert_eq!(summary.items_per_minute(), 0.0);
    }

    #[test]
    fn test_success_rate() {
        let mut summary = RunSummary::empty(Utc::now());
        summary.statistics.movies_prefetched = 8;
        summary.statistics.failed_count = 2;
        assert!((summary.success_rate() - 80.0).abs() < 0.01);
        assert_eq!(RunSummary::empty(Utc::now()).success_rate(), 0.0);
    }

    #[test]
    fn test_summary_json_shape() {
        let mut summary = RunSummary::empty(Utc::now());
        summary.stop_reason = StopReason::TimeLimit;
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["stop_reason"], "time_limit");
        assert!(json.get("error").is_none());
        assert!(json["timing"]["total_duration_secs"].is_number());
    }
}
