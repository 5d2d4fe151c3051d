//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::output::RunSummary;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{FreshnessRecord, RunRecord, RunStatus};
use crate::PrefetchError;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(PrefetchError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, PrefetchError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, PrefetchError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Failed),
        error: row.get(5)?,
    })
}

fn decode_summary(json: Option<String>) -> StorageResult<Option<RunSummary>> {
    json.map(|text| {
        serde_json::from_str(&text).map_err(|e| StorageError::Serialization(e.to_string()))
    })
    .transpose()
}

impl Storage for SqliteStorage {
    // ===== Freshness Cache =====

    fn get_freshness(&self, item_key: &str) -> StorageResult<Option<FreshnessRecord>> {
        let row: Option<(i64, Option<String>)> = self
            .conn
            .query_row(
                "SELECT last_prefetched_at_ms, title FROM freshness WHERE item_key = ?1",
                params![item_key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        row.map(|(millis, title)| {
            let last_prefetched_at = Utc.timestamp_millis_opt(millis).single().ok_or_else(|| {
                StorageError::Database(format!(
                    "invalid timestamp {} for item {}",
                    millis, item_key
                ))
            })?;
            Ok(FreshnessRecord {
                item_key: item_key.to_string(),
                last_prefetched_at,
                title,
            })
        })
        .transpose()
    }

    fn mark_prefetched(
        &mut self,
        item_key: &str,
        title: Option<&str>,
        at: DateTime<Utc>,
    ) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO freshness (item_key, last_prefetched_at_ms, title) VALUES (?1, ?2, ?3)
             ON CONFLICT(item_key) DO UPDATE SET
                last_prefetched_at_ms = excluded.last_prefetched_at_ms,
                title = COALESCE(excluded.title, freshness.title)",
            params![item_key, at.timestamp_millis(), title],
        )?;
        Ok(())
    }

    fn count_freshness_records(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM freshness", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn clear_freshness(&mut self) -> StorageResult<u64> {
        let removed = self.conn.execute("DELETE FROM freshness", [])?;
        Ok(removed as u64)
    }

    // ===== Run Management =====

    fn create_run(&mut self, config_hash: Option<&str>) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        error: Option<&str>,
        summary: Option<&RunSummary>,
    ) -> StorageResult<()> {
        let summary_json = summary
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let now = Utc::now().to_rfc3339();

        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, error = ?3, summary = ?4 WHERE id = ?5",
            params![status.to_db_string(), now, error, summary_json, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status, error FROM runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status, error FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn get_run_summary(&self, run_id: i64) -> StorageResult<Option<RunSummary>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT summary FROM runs WHERE id = ?1",
                params![run_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))?;
        decode_summary(json)
    }

    fn get_latest_summary(&self) -> StorageResult<Option<RunSummary>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT summary FROM runs WHERE summary IS NOT NULL ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        decode_summary(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::StopReason;
    use crate::storage::CacheValidity;
    use std::time::Duration;

    #[test]
    fn test_create_in_memory() {
        let storage = SqliteStorage::new_in_memory();
        assert!(storage.is_ok());
    }

    #[test]
    fn test_mark_and_check_fresh() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let now = Utc::now();
        let validity = CacheValidity::Window(Duration::from_secs(3600));

        assert!(!storage.is_fresh("movie:tt1", validity, now).unwrap());

        storage
            .mark_prefetched("movie:tt1", Some("Heat (1995)"), now)
            .unwrap();

        assert!(storage.is_fresh("movie:tt1", validity, now).unwrap());
        assert!(!storage
            .is_fresh("movie:tt1", validity, now + chrono::Duration::hours(1))
            .unwrap());
        assert!(storage
            .is_fresh(
                "movie:tt1",
                CacheValidity::Forever,
                now + chrono::Duration::days(3650)
            )
            .unwrap());
    }

    #[test]
    fn test_mark_prefetched_upserts() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let first = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let second = first + chrono::Duration::days(1);

        storage.mark_prefetched("movie:tt1", Some("A"), first).unwrap();
        storage.mark_prefetched("movie:tt1", None, second).unwrap();

        assert_eq!(storage.count_freshness_records().unwrap(), 1);
        let record = storage.get_freshness("movie:tt1").unwrap().unwrap();
        assert_eq!(record.last_prefetched_at, second);
        assert_eq!(record.title.as_deref(), Some("A"));
    }

    #[test]
    fn test_clear_freshness() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let now = Utc::now();
        storage.mark_prefetched("movie:tt1", None, now).unwrap();
        storage.mark_prefetched("series:tt2", None, now).unwrap();

        assert_eq!(storage.clear_freshness().unwrap(), 2);
        assert_eq!(storage.count_freshness_records().unwrap(), 0);
        assert!(storage.get_freshness("movie:tt1").unwrap().is_none());
    }

    #[test]
    fn test_create_run() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run(Some("test_hash")).unwrap();
        assert!(run_id > 0);

        let run = storage.get_run(run_id).unwrap();
        assert_eq!(run.status, RunStatus::Running);
        assert_eq!(run.config_hash.as_deref(), Some("test_hash"));
        assert!(run.finished_at.is_none());
    }

    #[test]
    fn test_finish_run_stores_summary() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run(None).unwrap();

        let mut summary = RunSummary::empty(Utc::now());
        summary.stop_reason = StopReason::CancelledByUser;
        summary.statistics.movies_prefetched = 7;

        storage
            .finish_run(run_id, RunStatus::Cancelled, None, Some(&summary))
            .unwrap();

        let run = storage.get_latest_run().unwrap().unwrap();
        assert_eq!(run.id, run_id);
        assert_eq!(run.status, RunStatus::Cancelled);
        assert!(run.finished_at.is_some());

        let loaded = storage.get_run_summary(run_id).unwrap().unwrap();
        assert_eq!(loaded.statistics.movies_prefetched, 7);
        assert_eq!(loaded.stop_reason, StopReason::CancelledByUser);
    }

    #[test]
    fn test_latest_summary_skips_runs_without_one() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let first = storage.create_run(None).unwrap();
        storage
            .finish_run(first, RunStatus::Completed, None, Some(&RunSummary::empty(Utc::now())))
            .unwrap();
        let second = storage.create_run(None).unwrap();
        storage
            .finish_run(second, RunStatus::Failed, Some("disk full"), None)
            .unwrap();

        assert!(storage.get_latest_summary().unwrap().is_some());
        assert_eq!(
            storage.get_run(second).unwrap().error.as_deref(),
            Some("disk full")
        );
    }

    #[test]
    fn test_missing_run() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        assert!(matches!(
            storage.get_run(99),
            Err(StorageError::RunNotFound(99))
        ));
        assert!(matches!(
            storage.finish_run(99, RunStatus::Completed, None, None),
            Err(StorageError::RunNotFound(99))
        ));
    }
}
