//! Statistics generation from the crawl ledger
//!
//! This module provides functionality for extracting and displaying
//! the statistics of the most recent crawl run.

use crate::state::PageState;
use crate::storage::{Ledger, LedgerPage, RunRecord, StorageResult};
use std::collections::HashMap;

/// How many failed URLs the report lists per state
const FAILURE_SAMPLE: usize = 10;

/// Crawl statistics summary
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    /// The run these statistics describe
    pub run: RunRecord,

    /// Number of URLs the run took from the frontier
    pub total_pages: u64,

    /// Count of pages by state
    pub pages_by_state: HashMap<PageState, u64>,

    /// Count of pages by depth
    pub depth_breakdown: HashMap<u32, usize>,

    /// A sample of failed URLs, grouped by error state
    pub failures: Vec<(PageState, Vec<LedgerPage>)>,
}

impl CrawlStatistics {
    /// Sum of all error-state counts
    pub fn total_errors(&self) -> u64 {
        self.pages_by_state
            .iter()
            .filter(|(state, _)| state.is_error())
            .map(|(_, count)| count)
            .sum()
    }

    /// Returns the success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.total_pages == 0 {
            return 0.0;
        }
        let processed = self
            .pages_by_state
            .get(&PageState::Processed)
            .copied()
            .unwrap_or(0);
        (processed as f64 / self.total_pages as f64) * 100.0
    }
}

/// Loads statistics for the latest run in the ledger
///
/// # Returns
///
/// * `Ok(Some(CrawlStatistics))` - Statistics of the latest run
/// * `Ok(None)` - The ledger has no runs yet
/// * `Err(StorageError)` - Failed to query the ledger
pub fn load_statistics(ledger: &dyn Ledger) -> StorageResult<Option<CrawlStatistics>> {
    let Some(run) = ledger.get_latest_run()? else {
        return Ok(None);
    };

    let total_pages = ledger.count_pages(run.id)?;
    let pages_by_state = ledger.get_state_summary(run.id)?;
    let depth_breakdown = ledger.get_depth_breakdown(run.id)?;

    let mut failures = Vec::new();
    for state in PageState::all_states() {
        if !state.is_error() || !pages_by_state.contains_key(&state) {
            continue;
        }
        let mut pages = ledger.get_pages_by_state(run.id, state)?;
        pages.truncate(FAILURE_SAMPLE);
        failures.push((state, pages));
    }

    Ok(Some(CrawlStatistics {
        run,
        total_pages,
        pages_by_state,
        depth_breakdown,
        failures,
    }))
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Run #{}:", stats.run.id);
    println!("  Status: {}", stats.run.status.to_db_string());
    println!("  Started: {}", stats.run.started_at);
    println!(
        "  Finished: {}",
        stats.run.finished_at.as_deref().unwrap_or("-")
    );
    println!("  Config hash: {}", stats.run.config_hash);
    println!();

    println!("Overview:");
    println!("  URLs taken from the frontier: {}", stats.total_pages);
    println!("  Errors: {}", stats.total_errors());
    println!();

    println!("Pages by State:");
    let mut state_counts: Vec<_> = stats.pages_by_state.iter().collect();
    state_counts.sort_by(|a, b| b.1.cmp(a.1));

    for (state, count) in state_counts {
        let percentage = if stats.total_pages > 0 {
            (*count as f64 / stats.total_pages as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", state, count, percentage);
    }
    println!();

    println!("Pages by Depth:");
    let mut depths: Vec<_> = stats.depth_breakdown.iter().collect();
    depths.sort();
    for (depth, count) in depths {
        println!("  {}: {}", depth, count);
    }
    println!();

    for (state, pages) in &stats.failures {
        println!("{}:", state);
        for page in pages {
            match &page.outcome.error_message {
                Some(message) => println!("  - {} ({})", page.outcome.url, message),
                None => println!("  - {}", page.outcome.url),
            }
        }
        println!();
    }

    println!(
        "Success Rate: {:.1}% ({} / {} pages successfully processed)",
        stats.success_rate(),
        stats
            .pages_by_state
            .get(&PageState::Processed)
            .copied()
            .unwrap_or(0),
        stats.total_pages
    );
}
