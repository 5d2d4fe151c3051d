//! Streams Prefetcher: a cache warmer for content-catalog addons
//!
//! This crate walks configured addon catalogs, requests per-item stream metadata
//! so the upstream addon caches it, and optionally nudges the upstream service into
//! materializing streams that are not yet ready for instant playback. Jobs run on a
//! single background worker that can be paused, resumed and cancelled between items.

pub mod catalog;
pub mod config;
pub mod crawler;
pub mod job;
pub mod output;
pub mod schedule;
pub mod storage;
pub mod testing;

use thiserror::Error;

/// Main error type for prefetch operations
///
/// Only conditions that make continued correct operation impossible end up here.
/// Per-item and per-page network failures are converted to counters by the crawler.
#[derive(Debug, Error)]
pub enum PrefetchError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Catalog source error: {0}")]
    Source(#[from] catalog::SourceError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition {
        from: job::JobStatus,
        to: job::JobStatus,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("Invalid cached-stream pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Result type alias for prefetch operations
pub type Result<T> = std::result::Result<T, PrefetchError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::{Config, RunConfig};
pub use job::{JobEngine, JobState, JobStatus, RunRejected, SignalOutcome};
pub use output::RunSummary;
pub use schedule::{Schedule, ScheduleEntry, ScheduleRunner};
