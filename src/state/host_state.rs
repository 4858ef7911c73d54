use std::time::{Duration, Instant};

/// Tracks the politeness state of a host during crawling
///
/// Requests are admitted by reserving a start slot: each reservation pushes the
/// host's next free slot forward by the effective delay, so concurrent workers
/// aimed at the same host are spaced out instead of firing together.
#[derive(Debug, Clone, Default)]
pub struct HostState {
    /// Number of requests admitted for this host in the current crawl
    pub request_count: u32,

    /// Earliest instant the next request to this host may start
    pub next_slot: Option<Instant>,

    /// Crawl-delay advertised by the host's robots.txt, if any
    pub crawl_delay: Option<Duration>,
}

impl HostState {
    /// Creates a new HostState with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks if this host has reached the request limit
    pub fn has_exceeded_limit(&self, max_requests: u32) -> bool {
        self.request_count >= max_requests
    }

    /// The delay applied between requests: the larger of the configured
    /// politeness delay and the robots.txt crawl-delay
    pub fn effective_delay(&self, configured: Duration) -> Duration {
        match self.crawl_delay {
            Some(robots_delay) => configured.max(robots_delay),
            None => configured,
        }
    }

    /// Reserves the next request slot for this host
    ///
    /// # Arguments
    ///
    /// * `now` - The current time instant
    /// * `delay` - The configured politeness delay
    ///
    /// # Returns
    ///
    /// How long the caller must wait before issuing its request
    pub fn reserve(&mut self, now: Instant, delay: Duration) -> Duration {
        let start = match self.next_slot {
            Some(slot) if slot > now => slot,
            _ => now,
        };

        self.next_slot = Some(start + self.effective_delay(delay));
        self.request_count += 1;

        start - now
    }
}
