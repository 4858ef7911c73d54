//! Crawler coordinator - main crawl orchestration logic
//!
//! A fixed pool of fetch workers pulls entries from the frontier, runs each URL
//! through robots, throttling, fetching, storage and extraction, and sends the
//! result down a channel. The coordinator itself is the only writer: it owns
//! the record sink and the ledger, and it decides when repeated storage
//! failures end the crawl.

use crate::config::{Config, CrawlerConfig};
use crate::crawler::extractor::extract;
use crate::crawler::fetcher::{build_http_client, fetch_url, is_html, FetchResult};
use crate::crawler::frontier::{Frontier, FrontierEntry, FrontierStats};
use crate::crawler::scheduler::{Admission, HostThrottle};
use crate::output::{PageRecord, RecordSink, RecordWriter};
use crate::robots::RobotsCache;
use crate::state::PageState;
use crate::storage::{open_ledger, ContentStore, Ledger, PageOutcome, RunStatus};
use crate::url::{extract_host, normalize_url, strip_fragment, HostScope};
use crate::{Result, SitedexError};
use chrono::Utc;
use reqwest::Client;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use url::Url;

/// Finished pages buffered between the workers and the writer
const EVENT_BUFFER: usize = 64;

/// Pages between progress log lines
const PROGRESS_INTERVAL: usize = 10;

/// Summary of a finished crawl
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlReport {
    pub run_id: i64,

    /// URLs taken from the frontier and recorded in the ledger
    pub pages_visited: usize,

    /// Page records handed to the sink
    pub records_written: usize,

    /// Visited URLs that ended in an error state
    pub pages_failed: usize,

    pub frontier: FrontierStats,
}

/// One visited URL on its way to the writer
#[derive(Debug)]
struct PageEvent {
    outcome: PageOutcome,
    record: Option<PageRecord>,
}

impl From<PageOutcome> for PageEvent {
    fn from(outcome: PageOutcome) -> Self {
        Self {
            outcome,
            record: None,
        }
    }
}

/// Everything a fetch worker needs, shared by the pool
struct CrawlContext {
    client: Client,
    frontier: Frontier,
    throttle: HostThrottle,
    robots: Option<RobotsCache>,
    content: ContentStore,
    scope: HostScope,
    crawler: CrawlerConfig,

    /// Product token matched against robots.txt groups
    robots_agent: String,
}

impl CrawlContext {
    /// Runs one URL through the whole pipeline
    async fn process(&self, entry: &FrontierEntry) -> PageEvent {
        let url = &entry.url;
        let outcome = |state: PageState| PageOutcome::new(url.as_str(), entry.depth, state);

        let Some(host) = extract_host(url) else {
            return outcome(PageState::Failed).with_error("URL has no host").into();
        };

        if let Some(robots) = &self.robots {
            let rules = robots.rules_for(&self.client, url).await;
            self.throttle
                .set_crawl_delay(&host, rules.crawl_delay(&self.robots_agent));

            if !rules.is_allowed(url.as_str(), &self.robots_agent) {
                tracing::info!("URL {} disallowed by robots.txt", url);
                return outcome(PageState::RobotsDenied)
                    .with_error("Disallowed by robots.txt")
                    .into();
            }
        }

        let mut retries = 0;
        let result = loop {
            if self.throttle.acquire(&host).await == Admission::LimitReached {
                return outcome(PageState::RequestLimitHit)
                    .with_error(format!("Request cap reached for {}", host))
                    .into();
            }

            let result = fetch_url(&self.client, url).await;
            match result.failure_state() {
                Some(state) if state.is_transient() && retries < self.crawler.max_retries => {
                    retries += 1;
                    tracing::debug!(
                        "Retrying {} after {} ({}/{})",
                        url,
                        state,
                        retries,
                        self.crawler.max_retries
                    );
                    tokio::time::sleep(self.crawler.retry_delay()).await;
                }
                _ => break result,
            }
        };

        let mut page = outcome(PageState::Processed);
        page.retry_count = retries;

        match result {
            FetchResult::Success {
                final_url,
                status_code,
                content_type,
                body,
            } => {
                page.status_code = Some(status_code);
                self.store_and_extract(entry, page, &final_url, content_type, &body)
            }

            FetchResult::HttpError { status_code, state } => {
                tracing::debug!("{} returned HTTP {}", url, status_code);
                page.state = state;
                page.status_code = Some(status_code);
                page.with_error(format!("HTTP {}", status_code)).into()
            }

            FetchResult::NetworkError { error, state } => {
                tracing::debug!("Fetching {} failed: {}", url, error);
                page.state = state;
                page.with_error(error).into()
            }
        }
    }

    /// Stores a successful response and, for HTML, extracts its record
    fn store_and_extract(
        &self,
        entry: &FrontierEntry,
        mut page: PageOutcome,
        final_url: &Url,
        content_type: String,
        body: &[u8],
    ) -> PageEvent {
        let html = is_html(&content_type);
        if !content_type.is_empty() {
            page.content_type = Some(content_type);
        }

        let hash = match self.content.put(body) {
            Ok(hash) => hash,
            Err(e) => {
                tracing::error!("Failed to store content of {}: {}", entry.url, e);
                page.state = PageState::StorageFailed;
                return page.with_error(format!("Content store: {}", e)).into();
            }
        };
        page.content_hash = Some(hash.clone());

        if !html {
            let content_type = page.content_type.clone().unwrap_or_default();
            page.state = PageState::ContentMismatch;
            return page
                .with_error(format!("Expected HTML, got {}", content_type))
                .into();
        }

        let final_url = strip_fragment(final_url);
        if !same_page(&entry.url, &final_url) && !self.frontier.mark_visited(&final_url) {
            tracing::debug!("{} redirected to already visited {}", entry.url, final_url);
            return page
                .with_error(format!("Redirected to already visited {}", final_url))
                .into();
        }

        let extracted = extract(&final_url, body, self.crawler.body_preview_chars);

        let source = FrontierEntry {
            url: final_url.clone(),
            discovered_from: entry.discovered_from.clone(),
            depth: entry.depth,
        };
        for link in &extracted.links {
            if self.scope.allows(link) {
                self.frontier.enqueue(source.child(link.clone()));
            }
        }

        page.title = Some(extracted.title.clone());

        let record = PageRecord {
            url: final_url.to_string(),
            title: extracted.title,
            body_text: extracted.body_text,
            content_hash: hash,
            fetched_at: Utc::now(),
            links: extracted.links.iter().map(Url::to_string).collect(),
            depth: entry.depth,
        };

        PageEvent {
            outcome: page,
            record: Some(record),
        }
    }
}

/// True if two URLs share a visited-set key
fn same_page(a: &Url, b: &Url) -> bool {
    match (normalize_url(a.as_str()), normalize_url(b.as_str())) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Pulls entries until the frontier is drained
async fn fetch_worker(id: u32, context: Arc<CrawlContext>, events: mpsc::Sender<PageEvent>) {
    while let Some(entry) = context.frontier.next().await {
        tracing::debug!("Worker {} fetching {} (depth {})", id, entry.url, entry.depth);

        let event = context.process(&entry).await;
        let delivered = events.send(event).await.is_ok();

        // Only after the page's links are queued
        context.frontier.finish();

        if !delivered {
            break;
        }
    }
}

/// Main crawler coordinator structure
///
/// A coordinator runs once; build a new one for every crawl.
pub struct Coordinator<S: RecordSink, L: Ledger> {
    context: Arc<CrawlContext>,
    seeds: Vec<Url>,
    sink: S,
    ledger: L,
    config_hash: String,
}

impl<S: RecordSink, L: Ledger> Coordinator<S, L> {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `config_hash` - Recorded with the run in the ledger
    /// * `content` - Where fetched bytes are kept
    /// * `sink` - Receives one record per extracted page
    /// * `ledger` - Receives one outcome per visited URL
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(SitedexError)` - No seeds, a bad seed URL or an HTTP client failure
    pub fn new(
        config: &Config,
        config_hash: &str,
        content: ContentStore,
        sink: S,
        ledger: L,
    ) -> Result<Self> {
        if config.seeds.is_empty() {
            return Err(SitedexError::NoSeeds);
        }

        let seeds = config
            .seeds
            .iter()
            .map(|seed| Url::parse(seed.trim()).map(|url| strip_fragment(&url)))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let crawler = config.crawler.clone();
        let frontier =
            Frontier::new(crawler.max_depth).with_page_budget(crawler.max_pages as usize);

        let context = CrawlContext {
            client: build_http_client(&config.user_agent, &crawler)?,
            frontier,
            throttle: HostThrottle::new(&crawler),
            robots: crawler.respect_robots_txt.then(RobotsCache::new),
            content,
            scope: HostScope::new(&crawler.allowed_hosts, &seeds),
            robots_agent: config.user_agent.crawler_name.clone(),
            crawler,
        };

        Ok(Self {
            context: Arc::new(context),
            seeds,
            sink,
            ledger,
            config_hash: config_hash.to_string(),
        })
    }

    /// Runs the crawl until the frontier drains, the page budget is spent or
    /// storage keeps failing
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - The crawl finished
    /// * `Err(SitedexError::StorageEscalation)` - Too many consecutive storage
    ///   failures; in-flight pages were still drained and recorded
    pub async fn run(&mut self) -> Result<CrawlReport> {
        let run_id = self.ledger.create_run(&self.config_hash)?;
        tracing::info!(
            "Starting crawl run {} from {} seed(s), allowed hosts: {}",
            run_id,
            self.seeds.len(),
            self.context.scope.patterns().join(", ")
        );

        for seed in &self.seeds {
            if !self.context.frontier.enqueue(FrontierEntry::seed(seed.clone())) {
                tracing::debug!("Ignoring duplicate seed {}", seed);
            }
        }

        let (events, mut inbox) = mpsc::channel(EVENT_BUFFER);
        let mut workers = JoinSet::new();
        for id in 0..self.context.crawler.max_concurrent_fetches.max(1) {
            workers.spawn(fetch_worker(id, Arc::clone(&self.context), events.clone()));
        }
        drop(events);

        let start_time = Instant::now();
        let failure_limit = self.context.crawler.max_storage_failures.max(1);
        let mut report = CrawlReport {
            run_id,
            ..CrawlReport::default()
        };
        let mut consecutive_failures = 0;
        let mut escalated = false;

        while let Some(event) = inbox.recv().await {
            if self.write_event(run_id, event, &mut report) {
                consecutive_failures = 0;
            } else {
                consecutive_failures += 1;
                if consecutive_failures >= failure_limit && !escalated {
                    tracing::error!(
                        "{} consecutive storage failures, stopping crawl",
                        consecutive_failures
                    );
                    escalated = true;
                    self.context.frontier.close();
                }
            }

            if report.pages_visited % PROGRESS_INTERVAL == 0 {
                let rate = report.pages_visited as f64 / start_time.elapsed().as_secs_f64();
                tracing::info!(
                    "Progress: {} pages visited, {} in frontier, {:.2} pages/sec",
                    report.pages_visited,
                    self.context.frontier.len(),
                    rate
                );
            }
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Fetch worker stopped abnormally: {}", e);
            }
        }

        let flushed = self.sink.flush();
        if let Err(e) = &flushed {
            tracing::error!("Failed to flush page records: {}", e);
        }

        report.frontier = self.context.frontier.stats();
        let status = if escalated || flushed.is_err() {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        };
        self.ledger.finish_run(
            run_id,
            status,
            (report.pages_visited - report.pages_failed) as u64,
            report.pages_failed as u64,
        )?;
        flushed?;

        if escalated {
            return Err(SitedexError::StorageEscalation {
                failures: consecutive_failures,
            });
        }

        tracing::info!(
            "Crawl completed: {} pages visited on {} host(s), {} records, {} failed, {} skipped past max depth in {:?}",
            report.pages_visited,
            self.context.throttle.host_count(),
            report.records_written,
            report.pages_failed,
            report.frontier.skipped_depth,
            start_time.elapsed()
        );

        Ok(report)
    }

    /// Writes one event; returns false if storage failed for it
    fn write_event(&mut self, run_id: i64, event: PageEvent, report: &mut CrawlReport) -> bool {
        let PageEvent {
            mut outcome,
            record,
        } = event;

        if let Some(record) = &record {
            match self.sink.write_record(record) {
                Ok(()) => report.records_written += 1,
                Err(e) => {
                    tracing::error!("Failed to write record for {}: {}", record.url, e);
                    outcome.state = PageState::StorageFailed;
                    outcome.error_message = Some(format!("Record write failed: {}", e));
                }
            }
        }

        report.pages_visited += 1;
        if outcome.state.is_error() {
            report.pages_failed += 1;
        }

        let ledger_ok = match self.ledger.record_page(run_id, &outcome) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to record outcome of {}: {}", outcome.url, e);
                false
            }
        };

        ledger_ok && outcome.state != PageState::StorageFailed
    }

    /// The record sink
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// The crawl ledger
    pub fn ledger(&self) -> &L {
        &self.ledger
    }
}

/// Runs a crawl against the locations named in the configuration
///
/// Opens the content store, the ledger and the record file, then drives a
/// `Coordinator` to completion. The record file is rewritten from scratch.
///
/// # Example
///
/// ```no_run
/// use sitedex::config::load_config_with_hash;
/// use sitedex::crawler::run_crawl;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("config.toml"))?;
/// let report = run_crawl(&config, &hash).await?;
/// println!("{} records", report.records_written);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(config: &Config, config_hash: &str) -> Result<CrawlReport> {
    let content = ContentStore::open(config.output.content_dir.clone())?;
    let ledger = open_ledger(&config.output.database_path)?;
    let records = RecordWriter::create(&config.output.records_path)?;

    Coordinator::new(config, config_hash, content, records, ledger)?
        .run()
        .await
}
