//! Breadth-first URL frontier with its visited set
//!
//! The queue, the visited set and the in-flight counter sit behind a single
//! mutex, so the visited check and the insert happen as one step: two workers
//! discovering the same link can never both enqueue it.

use crate::url::normalize_url;
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::Notify;
use url::Url;

/// A URL waiting to be fetched
#[derive(Debug, Clone, PartialEq)]
pub struct FrontierEntry {
    /// The URL to fetch (fragment already removed)
    pub url: Url,

    /// The page the link was found on; None for seeds
    pub discovered_from: Option<String>,

    /// Link distance from the nearest seed (seeds are 0)
    pub depth: u32,
}

impl FrontierEntry {
    pub fn seed(url: Url) -> Self {
        Self {
            url,
            discovered_from: None,
            depth: 0,
        }
    }

    /// An entry for a link found on this entry's page
    pub fn child(&self, url: Url) -> Self {
        Self {
            url,
            discovered_from: Some(self.url.to_string()),
            depth: self.depth + 1,
        }
    }
}

/// Counters describing what the frontier accepted and refused
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrontierStats {
    pub enqueued: usize,
    pub dequeued: usize,
    pub duplicates: usize,
    pub skipped_depth: usize,
    pub rejected: usize,
}

#[derive(Debug, Default)]
struct Inner {
    queue: VecDeque<FrontierEntry>,
    visited: HashSet<String>,
    in_flight: usize,
    closed: bool,
    stats: FrontierStats,
}

/// Shared work queue for the fetch workers
#[derive(Debug)]
pub struct Frontier {
    inner: Mutex<Inner>,
    max_depth: u32,
    max_pages: Option<usize>,
    changed: Notify,
}

impl Frontier {
    /// Creates a frontier that drops entries deeper than `max_depth`
    pub fn new(max_depth: u32) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_depth,
            max_pages: None,
            changed: Notify::new(),
        }
    }

    /// Closes the frontier after `max_pages` entries have been dequeued
    pub fn with_page_budget(mut self, max_pages: usize) -> Self {
        self.max_pages = Some(max_pages);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Adds an entry unless its URL was seen before or it is too deep
    ///
    /// # Returns
    ///
    /// * `true` - The entry was queued and its URL marked visited
    /// * `false` - No-op: duplicate, beyond `max_depth`, unparsable, or the
    ///   frontier is closed
    pub fn enqueue(&self, entry: FrontierEntry) -> bool {
        let mut inner = self.lock();

        if inner.closed {
            return false;
        }

        if entry.depth > self.max_depth {
            inner.stats.skipped_depth += 1;
            tracing::trace!("Skipping {} at depth {}", entry.url, entry.depth);
            return false;
        }

        let key = match normalize_url(entry.url.as_str()) {
            Ok(key) => key.to_string(),
            Err(e) => {
                inner.stats.rejected += 1;
                tracing::debug!("Rejecting {}: {}", entry.url, e);
                return false;
            }
        };

        if !inner.visited.insert(key) {
            inner.stats.duplicates += 1;
            return false;
        }

        inner.queue.push_back(entry);
        inner.stats.enqueued += 1;
        drop(inner);

        self.changed.notify_waiters();
        true
    }

    /// Marks a URL visited without queueing it
    ///
    /// Used for the final URL of a redirect, which was fetched under another
    /// name. Returns false if the URL was already visited.
    pub fn mark_visited(&self, url: &Url) -> bool {
        match normalize_url(url.as_str()) {
            Ok(key) => self.lock().visited.insert(key.to_string()),
            Err(_) => false,
        }
    }

    /// Removes and returns the oldest entry, if any
    ///
    /// A returned entry counts as in flight until `finish` is called for it.
    pub fn dequeue(&self) -> Option<FrontierEntry> {
        let mut inner = self.lock();

        if inner.closed {
            return None;
        }

        let entry = inner.queue.pop_front()?;
        inner.in_flight += 1;
        inner.stats.dequeued += 1;

        if self.max_pages == Some(inner.stats.dequeued) {
            tracing::info!("Page budget of {} reached, draining", inner.stats.dequeued);
            Self::close_locked(&mut inner);
            drop(inner);
            self.changed.notify_waiters();
        }

        Some(entry)
    }

    /// Marks one dequeued entry as done
    pub fn finish(&self) {
        let mut inner = self.lock();
        inner.in_flight = inner.in_flight.saturating_sub(1);
        drop(inner);

        self.changed.notify_waiters();
    }

    /// Waits for the next entry
    ///
    /// Returns None once the frontier is closed, or once it is empty with
    /// nothing in flight that could still discover new links.
    pub async fn next(&self) -> Option<FrontierEntry> {
        loop {
            // Registered before checking so a concurrent notify is not lost
            let changed = self.changed.notified();

            if let Some(entry) = self.dequeue() {
                return Some(entry);
            }
            if self.is_drained() {
                return None;
            }

            changed.await;
        }
    }

    /// Stops handing out entries; queued entries are discarded
    pub fn close(&self) {
        Self::close_locked(&mut self.lock());
        self.changed.notify_waiters();
    }

    fn close_locked(inner: &mut Inner) {
        inner.closed = true;
        inner.queue.clear();
    }

    /// True when no more entries will ever be handed out
    pub fn is_drained(&self) -> bool {
        let inner = self.lock();
        inner.closed || (inner.queue.is_empty() && inner.in_flight == 0)
    }

    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> FrontierStats {
        self.lock().stats
    }
}
