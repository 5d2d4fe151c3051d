//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::output::RunSummary;
use crate::storage::{CacheValidity, FreshnessRecord, RunRecord, RunStatus};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// The job worker is the only writer. Readers (the CLI's stats view) open their
/// own handle.
pub trait Storage: Send {
    // ===== Freshness Cache =====

    /// Returns the freshness record for an item key
    fn get_freshness(&self, item_key: &str) -> StorageResult<Option<FreshnessRecord>>;

    /// Checks whether an item was prefetched recently enough to skip
    ///
    /// # Arguments
    ///
    /// * `item_key` - Composite key of item type and external id
    /// * `validity` - How long a record stays fresh
    /// * `now` - The time to evaluate against
    fn is_fresh(
        &self,
        item_key: &str,
        validity: CacheValidity,
        now: DateTime<Utc>,
    ) -> StorageResult<bool> {
        Ok(self
            .get_freshness(item_key)?
            .map(|record| super::is_fresh_at(record.last_prefetched_at, validity, now))
            .unwrap_or(false))
    }

    /// Records a successful prefetch, replacing any earlier record for the key
    fn mark_prefetched(
        &mut self,
        item_key: &str,
        title: Option<&str>,
        at: DateTime<Utc>,
    ) -> StorageResult<()>;

    /// Counts freshness records
    fn count_freshness_records(&self) -> StorageResult<u64>;

    /// Deletes every freshness record, returning how many were removed
    fn clear_freshness(&mut self) -> StorageResult<u64>;

    // ===== Run Management =====

    /// Creates a new run in the running state
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: Option<&str>) -> StorageResult<i64>;

    /// Records the terminal status of a run with its summary
    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        error: Option<&str>,
        summary: Option<&RunSummary>,
    ) -> StorageResult<()>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Gets the summary stored with a run, if it finished with one
    fn get_run_summary(&self, run_id: i64) -> StorageResult<Option<RunSummary>>;

    /// Gets the summary of the most recent run that has one
    fn get_latest_summary(&self) -> StorageResult<Option<RunSummary>>;
}
