//! Database schema definitions
//!
//! This module contains the SQL schema for the crawl ledger.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    pages_crawled INTEGER NOT NULL DEFAULT 0,
    pages_failed INTEGER NOT NULL DEFAULT 0
);

-- Outcome of every URL taken from the frontier, per run
CREATE TABLE IF NOT EXISTS pages (
    url TEXT NOT NULL,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    depth INTEGER NOT NULL,
    state TEXT NOT NULL,
    status_code INTEGER,
    content_type TEXT,
    content_hash TEXT,
    title TEXT,
    error_message TEXT,
    retry_count INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (url, run_id)
);

CREATE INDEX IF NOT EXISTS idx_pages_run_state ON pages(run_id, state);
CREATE INDEX IF NOT EXISTS idx_pages_content_hash ON pages(content_hash);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    Ok(())
}

/// Current schema version, stored in SQLite's `user_version`
pub const SCHEMA_VERSION: u32 = 1;
