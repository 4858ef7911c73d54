//! Per-origin robots.txt cache
//!
//! Each origin's rules are fetched once and reused until they are a day old.

use crate::robots::{fetch_robots, ParsedRobots};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;
use url::Url;

/// Cached robots.txt data for an origin
#[derive(Debug, Clone)]
pub struct CachedRobots {
    /// The parsed robots.txt content
    pub content: Arc<ParsedRobots>,

    /// When the robots.txt was fetched
    pub fetched_at: DateTime<Utc>,
}

impl CachedRobots {
    pub fn new(content: ParsedRobots) -> Self {
        Self {
            content: Arc::new(content),
            fetched_at: Utc::now(),
        }
    }

    /// Checks if the cached robots.txt is older than 24 hours
    pub fn is_stale(&self) -> bool {
        Utc::now() - self.fetched_at > Duration::hours(24)
    }
}

/// One origin's slot; callers for the same origin queue on its lock
type OriginSlot = Arc<Mutex<Option<CachedRobots>>>;

/// Robots rules for every origin seen during a crawl
///
/// robots.txt governs a single scheme, host and port, so that triple is the
/// cache key. The map lock is only held to find an origin's slot. The fetch
/// happens under the slot's own lock, so concurrent workers on a new origin
/// trigger a single request and other origins are never held up.
#[derive(Debug, Default)]
pub struct RobotsCache {
    origins: StdMutex<HashMap<String, OriginSlot>>,
}

impl RobotsCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, origin: String) -> OriginSlot {
        let mut origins = self
            .origins
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(origins.entry(origin).or_default())
    }

    /// Returns the rules governing `url`, fetching them on first use
    pub async fn rules_for(&self, client: &reqwest::Client, url: &Url) -> Arc<ParsedRobots> {
        let origin = url.origin();
        if !origin.is_tuple() {
            return Arc::new(ParsedRobots::allow_all());
        }

        let slot = self.slot(origin.ascii_serialization());
        let mut cached = slot.lock().await;
        if let Some(fresh) = cached.as_ref().filter(|c| !c.is_stale()) {
            return Arc::clone(&fresh.content);
        }

        let entry = CachedRobots::new(fetch_robots(client, url).await);
        let content = Arc::clone(&entry.content);
        *cached = Some(entry);
        content
    }
}
