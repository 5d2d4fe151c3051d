//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the prefetcher database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- When each item was last prefetched successfully
CREATE TABLE IF NOT EXISTS freshness (
    item_key TEXT PRIMARY KEY,
    last_prefetched_at_ms INTEGER NOT NULL,
    title TEXT
);

-- Track prefetch runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT,
    status TEXT NOT NULL,
    error TEXT,
    summary TEXT
);

CREATE INDEX IF NOT EXISTS idx_runs_status ON runs(status);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
