//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - The breadth-first frontier and its visited set
//! - Per-host politeness and request caps
//! - HTTP fetching with bounded redirects
//! - Title, body text and link extraction
//! - Worker pool coordination

mod coordinator;
mod extractor;
mod fetcher;
mod frontier;
mod scheduler;

pub use coordinator::{run_crawl, Coordinator, CrawlReport};
pub use extractor::{extract, ExtractResult, NO_TITLE};
pub use fetcher::{build_http_client, fetch_url, is_html, FetchResult};
pub use frontier::{Frontier, FrontierEntry, FrontierStats};
pub use scheduler::{Admission, HostThrottle};
