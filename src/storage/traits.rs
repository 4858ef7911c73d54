//! Storage traits and error types
//!
//! This module defines the trait interface for the crawl ledger and the error
//! type shared by the ledger and the content store.

use crate::state::PageState;
use crate::storage::{LedgerPage, PageOutcome, RunRecord, RunStatus};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Not a content hash: {0:?}")]
    InvalidHash(String),

    #[error("Stored content for {expected} is corrupt (hashes to {actual})")]
    Corrupt { expected: String, actual: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for crawl ledger backends
///
/// The ledger records what happened to every URL a run took from the
/// frontier. It is written by a single owner (the coordinator's writer loop)
/// and read by the statistics report.
pub trait Ledger {
    // ===== Run Management =====

    /// Creates a new crawl run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Closes a run with its final status and page tallies
    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        pages_crawled: u64,
        pages_failed: u64,
    ) -> StorageResult<()>;

    // ===== Page Outcomes =====

    /// Records (or overwrites) the outcome of a URL within a run
    fn record_page(&mut self, run_id: i64, outcome: &PageOutcome) -> StorageResult<()>;

    /// Gets the recorded outcome of a URL within a run
    fn get_page(&self, run_id: i64, url: &str) -> StorageResult<Option<LedgerPage>>;

    /// Gets every page of a run in a given state
    fn get_pages_by_state(&self, run_id: i64, state: PageState) -> StorageResult<Vec<LedgerPage>>;

    // ===== Statistics =====

    /// Counts pages of a run in a given state
    fn count_pages_by_state(&self, run_id: i64, state: PageState) -> StorageResult<u64>;

    /// Counts every page recorded for a run
    fn count_pages(&self, run_id: i64) -> StorageResult<u64>;

    /// Gets the state breakdown of a run (state -> count)
    fn get_state_summary(&self, run_id: i64) -> StorageResult<HashMap<PageState, u64>>;

    /// Gets the depth breakdown of a run (depth -> count)
    fn get_depth_breakdown(&self, run_id: i64) -> StorageResult<HashMap<u32, usize>>;
}
