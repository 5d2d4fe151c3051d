//! Storage module for persisting prefetch data
//!
//! This module handles all database operations for the prefetcher, including:
//! - SQLite database initialization and schema management
//! - The freshness cache (when each item was last prefetched)
//! - Run tracking with the frozen summary of each finished run

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::PrefetchError;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::time::Duration;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(PrefetchError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, PrefetchError> {
    SqliteStorage::new(path)
}

/// How long a freshness record stays valid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheValidity {
    /// Once recorded, an item is fresh forever
    Forever,
    /// Fresh while `now - last_prefetched_at` is below the window
    Window(Duration),
}

impl CacheValidity {
    /// Validity in seconds, -1 for forever
    pub fn as_secs_f64(&self) -> f64 {
        match self {
            Self::Forever => -1.0,
            Self::Window(d) => d.as_secs_f64(),
        }
    }
}

/// Decides freshness for a record written at `last_prefetched_at`
///
/// A zero window never yields fresh. Timestamps in the future (clock changes)
/// count as fresh.
pub fn is_fresh_at(
    last_prefetched_at: DateTime<Utc>,
    validity: CacheValidity,
    now: DateTime<Utc>,
) -> bool {
    match validity {
        CacheValidity::Forever => true,
        CacheValidity::Window(window) => {
            let elapsed = now.signed_duration_since(last_prefetched_at);
            match chrono::Duration::from_std(window) {
                Ok(window) => elapsed < window,
                // Window too large to represent: nothing ever expires
                Err(_) => true,
            }
        }
    }
}

/// A row of the freshness cache
#[derive(Debug, Clone, PartialEq)]
pub struct FreshnessRecord {
    pub item_key: String,
    pub last_prefetched_at: DateTime<Utc>,
    pub title: Option<String>,
}

/// Represents a prefetch run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: Option<String>,
    pub status: RunStatus,
    pub error: Option<String>,
}

/// Status of a persisted run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
