//! Page records and their newline-delimited JSON file format
//!
//! The crawl appends one JSON object per successfully extracted page; the index
//! stage reads them back. Only `url`, `title` and `text` are required on
//! read, so record files produced elsewhere can be indexed too.

use crate::output::traits::{RecordError, RecordResult, RecordSink};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// One successfully fetched and extracted page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub url: String,

    pub title: String,

    /// Plain-text body preview
    #[serde(rename = "text")]
    pub body_text: String,

    /// Key of the raw bytes in the content store
    #[serde(default)]
    pub content_hash: String,

    #[serde(default)]
    pub fetched_at: DateTime<Utc>,

    /// Resolved link targets, in document order
    #[serde(default)]
    pub links: Vec<String>,

    #[serde(default)]
    pub depth: u32,
}

/// Writes page records as newline-delimited JSON to a file
pub struct RecordWriter {
    out: BufWriter<File>,
}

impl RecordWriter {
    /// Creates (or truncates) the record file at `path`
    pub fn create(path: &Path) -> RecordResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        Ok(Self {
            out: BufWriter::new(file),
        })
    }
}

impl RecordSink for RecordWriter {
    fn write_record(&mut self, record: &PageRecord) -> RecordResult<()> {
        serde_json::to_writer(&mut self.out, record)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> RecordResult<()> {
        self.out.flush()?;
        self.out.get_ref().sync_all()?;
        Ok(())
    }
}

/// Reads every record from a newline-delimited JSON file, in file order
///
/// Blank lines are skipped. A line that is not a valid record fails the whole
/// read with its line number.
pub fn read_records(path: &Path) -> RecordResult<Vec<PageRecord>> {
    let reader = BufReader::new(File::open(path)?);
    parse_records(reader)
}

fn parse_records(reader: impl BufRead) -> RecordResult<Vec<PageRecord>> {
    let mut records = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let record = serde_json::from_str(&line).map_err(|source| RecordError::Malformed {
            line: index + 1,
            source,
        })?;
        records.push(record);
    }

    Ok(records)
}
