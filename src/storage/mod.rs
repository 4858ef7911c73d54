//! Storage module for persisting crawl data
//!
//! Two stores live here:
//! - the content store, a directory of raw fetched bytes named by their SHA-256
//! - the crawl ledger, a SQLite database with one row per run and one row per
//!   URL outcome within a run

mod content;
mod schema;
mod sqlite;
mod traits;

pub use content::{hash_bytes, ContentStore};
pub use sqlite::SqliteStorage;
pub use traits::{Ledger, StorageError, StorageResult};

use crate::state::PageState;

use std::path::Path;

/// Opens (creating if necessary) the crawl ledger at `path`
pub fn open_ledger(path: &Path) -> StorageResult<SqliteStorage> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    SqliteStorage::new(path)
}

/// What happened to one URL taken from the frontier
#[derive(Debug, Clone, PartialEq)]
pub struct PageOutcome {
    pub url: String,
    pub depth: u32,
    pub state: PageState,
    pub status_code: Option<u16>,
    pub content_type: Option<String>,
    pub content_hash: Option<String>,
    pub title: Option<String>,
    pub error_message: Option<String>,
    pub retry_count: u32,
}

impl PageOutcome {
    /// An outcome carrying only a URL, depth and state
    pub fn new(url: impl Into<String>, depth: u32, state: PageState) -> Self {
        Self {
            url: url.into(),
            depth,
            state,
            status_code: None,
            content_type: None,
            content_hash: None,
            title: None,
            error_message: None,
            retry_count: 0,
        }
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

/// A page outcome as stored in the ledger
#[derive(Debug, Clone)]
pub struct LedgerPage {
    pub run_id: i64,
    pub outcome: PageOutcome,
    pub updated_at: String,
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub pages_crawled: u64,
    pub pages_failed: u64,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_roundtrip() {
        for status in &[
            RunStatus::Running,
            RunStatus::Completed,
            RunStatus::Failed,
        ] {
            let db_str = status.to_db_string();
            let parsed = RunStatus::from_db_string(db_str);
            assert_eq!(Some(*status), parsed);
        }
    }

    #[test]
    fn test_run_status_invalid() {
        assert_eq!(RunStatus::from_db_string("invalid"), None);
    }

    #[test]
    fn test_open_ledger_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ledger.db");

        let ledger = open_ledger(&path).unwrap();
        assert!(path.exists());
        assert!(ledger.get_latest_run().unwrap().is_none());
    }
}
