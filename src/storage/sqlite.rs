//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Ledger trait.

use crate::state::PageState;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Ledger, StorageError, StorageResult};
use crate::storage::{LedgerPage, PageOutcome, RunRecord, RunStatus};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;

const RUN_COLUMNS: &str =
    "id, started_at, finished_at, config_hash, status, pages_crawled, pages_failed";

const PAGE_COLUMNS: &str = "url, run_id, depth, state, status_code, content_type, content_hash,
     title, error_message, retry_count, updated_at";

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
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
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
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?).unwrap_or(RunStatus::Failed),
        pages_crawled: row.get::<_, i64>(5)? as u64,
        pages_failed: row.get::<_, i64>(6)? as u64,
    })
}

fn page_from_row(row: &Row<'_>) -> rusqlite::Result<LedgerPage> {
    Ok(LedgerPage {
        run_id: row.get(1)?,
        outcome: PageOutcome {
            url: row.get(0)?,
            depth: row.get(2)?,
            state: PageState::from_db_string(&row.get::<_, String>(3)?)
                .unwrap_or(PageState::Failed),
            status_code: row.get(4)?,
            content_type: row.get(5)?,
            content_hash: row.get(6)?,
            title: row.get(7)?,
            error_message: row.get(8)?,
            retry_count: row.get(9)?,
        },
        updated_at: row.get(10)?,
    })
}

impl Ledger for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS),
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
                &format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS),
                [],
                run_from_row,
            )
            .optional()?;

        Ok(run)
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        pages_crawled: u64,
        pages_failed: u64,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, pages_crawled = ?3, pages_failed = ?4
             WHERE id = ?5",
            params![
                status.to_db_string(),
                now,
                pages_crawled as i64,
                pages_failed as i64,
                run_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Page Outcomes =====

    fn record_page(&mut self, run_id: i64, outcome: &PageOutcome) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO pages (url, run_id, depth, state, status_code, content_type, content_hash,
                                title, error_message, retry_count, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(url, run_id) DO UPDATE SET
                depth = excluded.depth,
                state = excluded.state,
                status_code = excluded.status_code,
                content_type = excluded.content_type,
                content_hash = excluded.content_hash,
                title = excluded.title,
                error_message = excluded.error_message,
                retry_count = excluded.retry_count,
                updated_at = excluded.updated_at",
            params![
                outcome.url,
                run_id,
                outcome.depth,
                outcome.state.to_db_string(),
                outcome.status_code,
                outcome.content_type,
                outcome.content_hash,
                outcome.title,
                outcome.error_message,
                outcome.retry_count,
                now
            ],
        )?;
        Ok(())
    }

    fn get_page(&self, run_id: i64, url: &str) -> StorageResult<Option<LedgerPage>> {
        let page = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM pages WHERE run_id = ?1 AND url = ?2",
                    PAGE_COLUMNS
                ),
                params![run_id, url],
                page_from_row,
            )
            .optional()?;

        Ok(page)
    }

    fn get_pages_by_state(&self, run_id: i64, state: PageState) -> StorageResult<Vec<LedgerPage>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM pages WHERE run_id = ?1 AND state = ?2 ORDER BY url",
            PAGE_COLUMNS
        ))?;

        let pages = stmt
            .query_map(params![run_id, state.to_db_string()], page_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(pages)
    }

    // ===== Statistics =====

    fn count_pages_by_state(&self, run_id: i64, state: PageState) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pages WHERE run_id = ?1 AND state = ?2",
            params![run_id, state.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_pages(&self, run_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pages WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn get_state_summary(&self, run_id: i64) -> StorageResult<HashMap<PageState, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT state, COUNT(*) FROM pages WHERE run_id = ?1 GROUP BY state")?;

        let rows = stmt.query_map(params![run_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut summary = HashMap::new();
        for row in rows {
            let (state_str, count) = row?;
            match PageState::from_db_string(&state_str) {
                Some(state) => {
                    summary.insert(state, count as u64);
                }
                None => {
                    return Err(StorageError::Database(format!(
                        "Unknown page state in ledger: {}",
                        state_str
                    )))
                }
            }
        }

        Ok(summary)
    }

    fn get_depth_breakdown(&self, run_id: i64) -> StorageResult<HashMap<u32, usize>> {
        let mut stmt = self
            .conn
            .prepare("SELECT depth, COUNT(*) FROM pages WHERE run_id = ?1 GROUP BY depth")?;

        let breakdown = stmt
            .query_map(params![run_id], |row| {
                Ok((row.get::<_, u32>(0)?, row.get::<_, i64>(1)? as usize))
            })?
            .collect::<Result<HashMap<_, _>, _>>()?;

        Ok(breakdown)
    }
}
