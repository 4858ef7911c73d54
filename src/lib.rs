//! Sitedex: crawl a site, keep what it says, make it searchable
//!
//! This crate implements a breadth-first web crawler feeding a content-addressed
//! page store and a full-text index. A crawl turns seed URLs into a stream of
//! newline-delimited JSON page records; an index run turns those records into a
//! fresh index generation and a JSON payload for a static search frontend.

pub mod config;
pub mod crawler;
pub mod index;
pub mod output;
pub mod robots;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Sitedex operations
#[derive(Debug, Error)]
pub enum SitedexError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("No seed URLs configured; nothing to crawl")]
    NoSeeds,

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Giving up after {failures} consecutive storage failures")]
    StorageEscalation { failures: u32 },

    #[error("Index error: {0}")]
    Index(#[from] index::IndexError),

    #[error("Export error: {0}")]
    Export(#[from] index::ExportError),

    #[error("Record error: {0}")]
    Record(#[from] output::RecordError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid host pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Sitedex operations
pub type Result<T> = std::result::Result<T, SitedexError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use output::PageRecord;
pub use state::PageState;
pub use url::{extract_host, normalize_url};
