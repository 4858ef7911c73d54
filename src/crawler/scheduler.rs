//! Per-host politeness gate
//!
//! This module handles:
//! - Per-host minimum delay between requests
//! - Per-host request caps
//! - Integrating robots.txt crawl delays
//!
//! Different hosts never wait on each other: a worker only sleeps for the
//! host it is about to contact, and it sleeps without holding the lock.

use crate::config::CrawlerConfig;
use crate::state::HostState;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Outcome of asking the gate for a request slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The request may be sent now
    Granted,

    /// The host's request cap is used up
    LimitReached,
}

/// Per-host rate limiting shared by all fetch workers
#[derive(Debug)]
pub struct HostThrottle {
    /// Per-host state tracking
    hosts: Mutex<HashMap<String, HostState>>,

    /// Configured minimum gap between requests to one host
    delay: Duration,

    /// Maximum requests per host
    max_host_requests: u32,
}

impl HostThrottle {
    /// Creates a new throttle from the crawler configuration
    pub fn new(config: &CrawlerConfig) -> Self {
        Self {
            hosts: Mutex::new(HashMap::new()),
            delay: config.politeness_delay(),
            max_host_requests: config.max_host_requests,
        }
    }

    fn with_hosts<T>(&self, f: impl FnOnce(&mut HashMap<String, HostState>) -> T) -> T {
        let mut hosts = self.hosts.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut hosts)
    }

    /// Waits until a request to `host` is allowed
    ///
    /// The slot is reserved before sleeping, so concurrent callers aimed at
    /// the same host are queued one delay apart.
    pub async fn acquire(&self, host: &str) -> Admission {
        let wait = self.with_hosts(|hosts| {
            let state = hosts.entry(host.to_string()).or_default();
            if state.has_exceeded_limit(self.max_host_requests) {
                return None;
            }
            Some(state.reserve(Instant::now(), self.delay))
        });

        match wait {
            None => {
                tracing::debug!("Request cap reached for {}", host);
                Admission::LimitReached
            }
            Some(wait) => {
                if !wait.is_zero() {
                    tracing::trace!("Waiting {:?} before contacting {}", wait, host);
                    tokio::time::sleep(wait).await;
                }
                Admission::Granted
            }
        }
    }

    /// Records a robots.txt crawl-delay for `host`
    pub fn set_crawl_delay(&self, host: &str, crawl_delay: Option<Duration>) {
        self.with_hosts(|hosts| {
            hosts.entry(host.to_string()).or_default().crawl_delay = crawl_delay;
        });
    }

    /// Number of hosts contacted so far
    pub fn host_count(&self) -> usize {
        self.with_hosts(|hosts| hosts.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn request_count(throttle: &HostThrottle, host: &str) -> u32 {
        throttle.with_hosts(|hosts| hosts.get(host).map_or(0, |s| s.request_count))
    }

    fn throttle(delay_ms: u64, max_host_requests: u32) -> HostThrottle {
        HostThrottle::new(&CrawlerConfig {
            politeness_delay_ms: delay_ms,
            max_host_requests,
            ..CrawlerConfig::default()
        })
    }

    #[tokio::test]
    async fn test_first_request_is_immediate() {
        let throttle = throttle(10_000, 10);
        let start = Instant::now();

        assert_eq!(throttle.acquire("example.com").await, Admission::Granted);
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(request_count(&throttle, "example.com"), 1);
    }

    #[tokio::test]
    async fn test_same_host_requests_are_spaced() {
        let throttle = throttle(150, 10);
        let start = Instant::now();

        throttle.acquire("example.com").await;
        throttle.acquire("example.com").await;
        throttle.acquire("example.com").await;

        assert!(start.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_different_hosts_do_not_wait() {
        let throttle = throttle(10_000, 10);
        let start = Instant::now();

        throttle.acquire("a.example").await;
        throttle.acquire("b.example").await;
        throttle.acquire("c.example").await;

        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(throttle.host_count(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_schedule() {
        let throttle = Arc::new(throttle(100, 10));
        let start = Instant::now();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let throttle = Arc::clone(&throttle);
                tokio::spawn(async move { throttle.acquire("example.com").await })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap(), Admission::Granted);
        }

        // Slots at 0, 100, 200 and 300ms
        assert!(start.elapsed() >= Duration::from_millis(300));
        assert_eq!(request_count(&throttle, "example.com"), 4);
    }

    #[tokio::test]
    async fn test_request_cap() {
        let throttle = throttle(0, 2);

        assert_eq!(throttle.acquire("example.com").await, Admission::Granted);
        assert_eq!(throttle.acquire("example.com").await, Admission::Granted);
        assert_eq!(throttle.acquire("example.com").await, Admission::LimitReached);
        assert_eq!(throttle.acquire("other.com").await, Admission::Granted);
    }

    #[tokio::test]
    async fn test_crawl_delay_extends_spacing() {
        let throttle = throttle(0, 10);
        throttle.set_crawl_delay("example.com", Some(Duration::from_millis(200)));
        let start = Instant::now();

        throttle.acquire("example.com").await;
        throttle.acquire("example.com").await;

        assert!(start.elapsed() >= Duration::from_millis(200));
    }
}
