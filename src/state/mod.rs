//! State module for tracking crawl progress
//!
//! This module provides state management for pages and hosts during the crawl process.
//!
//! # Components
//!
//! - `PageState`: The outcome recorded for every URL taken from the frontier
//! - `HostState`: Per-host politeness bookkeeping (request count, next free slot, crawl delay)

mod host_state;
mod page_state;

// Re-export main types
pub use host_state::HostState;
pub use page_state::PageState;
