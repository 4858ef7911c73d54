//! Record sink trait and error types
//!
//! The crawl coordinator hands every finished page record to a sink. The
//! production sink is the newline-delimited JSON file; tests collect records
//! in memory.

use crate::output::PageRecord;
use thiserror::Error;

/// Errors that can occur while writing or reading page records
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed record on line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for record operations
pub type RecordResult<T> = Result<T, RecordError>;

/// Destination for finished page records
///
/// Sinks are owned by a single writer; they need not be thread-safe.
pub trait RecordSink {
    /// Appends one record
    fn write_record(&mut self, record: &PageRecord) -> RecordResult<()>;

    /// Makes every appended record durable
    fn flush(&mut self) -> RecordResult<()>;
}

impl RecordSink for Vec<PageRecord> {
    fn write_record(&mut self, record: &PageRecord) -> RecordResult<()> {
        self.push(record.clone());
        Ok(())
    }

    fn flush(&mut self) -> RecordResult<()> {
        Ok(())
    }
}
