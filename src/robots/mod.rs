//! Robots.txt handling module
//!
//! Exclusion rules are optional: they are consulted only when
//! `respect-robots-txt` is enabled. A host whose robots.txt cannot be fetched
//! is treated as allowing everything.

mod cache;
mod parser;

pub use cache::{CachedRobots, RobotsCache};
pub use parser::ParsedRobots;

use url::Url;

/// Returns the robots.txt location for the origin of `url`
pub fn robots_url(url: &Url) -> Option<Url> {
    url.host_str()?;
    let mut robots = url.clone();
    robots.set_path("/robots.txt");
    robots.set_query(None);
    robots.set_fragment(None);
    Some(robots)
}

/// Fetches robots.txt for the origin of `url`
///
/// # Arguments
///
/// * `client` - The HTTP client (carries the crawler's User-Agent)
/// * `url` - Any URL on the origin whose rules are wanted
///
/// # Returns
///
/// The parsed rules. Missing files, error statuses and network failures all
/// yield `ParsedRobots::allow_all()`.
pub async fn fetch_robots(client: &reqwest::Client, url: &Url) -> ParsedRobots {
    let Some(location) = robots_url(url) else {
        return ParsedRobots::allow_all();
    };

    let response = match client.get(location.clone()).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!("robots.txt unavailable at {}: {}", location, e);
            return ParsedRobots::allow_all();
        }
    };

    if !response.status().is_success() {
        tracing::debug!(
            "robots.txt at {} returned {}, allowing all",
            location,
            response.status()
        );
        return ParsedRobots::allow_all();
    }

    match response.text().await {
        Ok(body) => ParsedRobots::from_content(&body),
        Err(e) => {
            tracing::debug!("Failed to read robots.txt at {}: {}", location, e);
            ParsedRobots::allow_all()
        }
    }
}
