//! Output module for crawl results
//!
//! This module handles:
//! - The page record produced for every successfully extracted page
//! - The newline-delimited JSON record file shared by the crawl and index stages
//! - Crawl statistics read back from the ledger

mod record;
pub mod stats;
mod traits;

pub use record::{read_records, PageRecord, RecordWriter};
pub use stats::{load_statistics, print_statistics, CrawlStatistics};
pub use traits::{RecordError, RecordResult, RecordSink};
