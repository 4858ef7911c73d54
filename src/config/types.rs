use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Sitedex
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Starting URLs, crawled at depth 0 in the order given
    #[serde(default)]
    pub seeds: Vec<String>,

    #[serde(default)]
    pub crawler: CrawlerConfig,

    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,

    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CrawlerConfig {
    /// Maximum link depth from a seed (seeds are depth 0)
    pub max_depth: u32,

    /// Hard stop on the number of URLs taken from the frontier
    pub max_pages: u32,

    /// Size of the fetch worker pool
    pub max_concurrent_fetches: u32,

    /// Minimum time between requests to the same host (milliseconds)
    pub politeness_delay_ms: u64,

    /// Per-request timeout (milliseconds)
    pub request_timeout_ms: u64,

    /// Redirect hops the HTTP client may follow on its own
    pub max_redirects: u32,

    /// Extra attempts for transient fetch failures
    pub max_retries: u32,

    /// Pause between retry attempts (milliseconds)
    pub retry_delay_ms: u64,

    /// Maximum number of requests per host
    pub max_host_requests: u32,

    /// Cutoff for the plain-text body preview, in characters
    pub body_preview_chars: usize,

    /// Consecutive storage failures tolerated before the crawl stops
    pub max_storage_failures: u32,

    /// Whether robots.txt exclusion rules are honored
    pub respect_robots_txt: bool,

    /// Host patterns the crawl may enter; empty means the seed hosts only
    pub allowed_hosts: Vec<String>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: 2,
            max_pages: 500,
            max_concurrent_fetches: 4,
            politeness_delay_ms: 1000,
            request_timeout_ms: 10_000,
            max_redirects: 1,
            max_retries: 0,
            retry_delay_ms: 1000,
            max_host_requests: 1000,
            body_preview_chars: 2000,
            max_storage_failures: 5,
            respect_robots_txt: false,
            allowed_hosts: Vec::new(),
        }
    }
}

impl CrawlerConfig {
    pub fn politeness_delay(&self) -> Duration {
        Duration::from_millis(self.politeness_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the User-Agent header value
    ///
    /// Format: `CrawlerName/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output locations
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Newline-delimited JSON page records written by the crawl
    pub records_path: PathBuf,

    /// Directory of content-hash-named raw page bodies
    pub content_dir: PathBuf,

    /// SQLite crawl ledger
    pub database_path: PathBuf,

    /// Directory holding the committed search index
    pub index_dir: PathBuf,

    /// JSON payload read by the search frontend
    pub export_path: PathBuf,
}
