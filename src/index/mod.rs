//! Full-text index over page records
//!
//! This module handles:
//! - Building a fresh tantivy index generation from the crawl's page records
//! - Searching the committed generation
//! - Exporting the committed corpus for the search frontend

mod builder;
mod export;
mod schema;

pub use builder::{CommittedIndex, Generation, IndexBuilder, IndexedPage, SearchHit};
pub use export::{export_index, read_export, write_export, ExportDocument};
pub use schema::PageSchema;

use crate::config::Config;
use crate::output::read_records;
use crate::{Result, SitedexError};
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building or reading the index
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Tantivy error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    #[error("Invalid search query: {0}")]
    Query(String),

    #[error("An index generation is already being built")]
    GenerationInProgress,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for index operations
pub type IndexResult<T> = std::result::Result<T, IndexError>;

/// Errors raised while exporting the committed corpus
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to write export {}: {}", .path.display(), .source)]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read export {}: {}", .path.display(), .source)]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize export: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to read committed index: {0}")]
    Index(#[from] IndexError),
}

/// Summary of an indexing run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexReport {
    /// Records read from the record file
    pub records_read: usize,

    /// Documents in the committed generation
    pub documents_indexed: u64,

    /// Records rejected because their URL was already indexed
    pub duplicates: usize,

    /// Records the index writer failed on
    pub failures: usize,

    /// Documents written to the export payload
    pub exported: usize,
}

/// Rebuilds the index from the record file and exports it
///
/// Index write failures are page-local until `max-storage-failures` of them
/// happen in a row; then the generation is abandoned and the previously
/// committed index is left untouched.
pub fn run_index(config: &Config) -> Result<IndexReport> {
    let records = read_records(&config.output.records_path)?;
    tracing::info!(
        "Indexing {} records from {}",
        records.len(),
        config.output.records_path.display()
    );

    let builder = IndexBuilder::new(config.output.index_dir.clone());
    let mut generation = builder.begin_generation()?;
    let failure_limit = config.crawler.max_storage_failures.max(1);

    let mut report = IndexReport {
        records_read: records.len(),
        ..IndexReport::default()
    };
    let mut consecutive_failures = 0;

    for record in &records {
        match generation.add_document(record) {
            Ok(true) => consecutive_failures = 0,
            Ok(false) => report.duplicates += 1,
            Err(e) => {
                tracing::warn!("Failed to index {}: {}", record.url, e);
                report.failures += 1;
                consecutive_failures += 1;
                if consecutive_failures >= failure_limit {
                    tracing::error!(
                        "{} consecutive index failures, abandoning generation",
                        consecutive_failures
                    );
                    return Err(SitedexError::StorageEscalation {
                        failures: consecutive_failures,
                    });
                }
            }
        }
    }

    if generation.is_empty() {
        tracing::warn!("No records to index; committing an empty generation");
    } else {
        tracing::debug!("Committing {} documents", generation.len());
    }
    let committed = generation.commit()?;
    report.documents_indexed = committed.num_docs();
    report.exported = export_index(&committed, &config.output.export_path)?;

    tracing::info!(
        "Index run complete: {} documents, {} duplicates, {} failures",
        report.documents_indexed,
        report.duplicates,
        report.failures
    );

    Ok(report)
}
