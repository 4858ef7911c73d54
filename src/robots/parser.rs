//! Robots.txt parser implementation
//!
//! Matching is delegated to the robotstxt crate; the Crawl-delay extension,
//! which that crate does not expose, is parsed here.

use robotstxt::DefaultMatcher;
use std::time::Duration;

/// Parsed robots.txt data
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    /// Raw robots.txt content (empty string means allow all)
    content: String,
}

impl ParsedRobots {
    /// Creates a new ParsedRobots from raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
        }
    }

    /// Creates a permissive ParsedRobots that allows everything
    ///
    /// This is used when robots.txt cannot be fetched.
    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
        }
    }

    /// Checks if a URL is allowed for the given user agent
    ///
    /// # Arguments
    ///
    /// * `url` - The absolute URL (or path) to check
    /// * `user_agent` - The crawler's product token, e.g. `sitedex`
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.content.is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url)
    }

    /// Gets the crawl delay for a specific user agent
    ///
    /// A group naming the agent wins over the `*` group.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<Duration> {
        let agent = user_agent.to_lowercase();
        let mut group: Vec<String> = Vec::new();
        let mut in_rules = false;
        let mut for_wildcard = None;
        let mut for_agent = None;

        for line in self.content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();

            match key.trim().to_lowercase().as_str() {
                "user-agent" => {
                    // A user-agent line after rules starts a new group
                    if in_rules {
                        group.clear();
                        in_rules = false;
                    }
                    group.push(value.to_lowercase());
                }
                "crawl-delay" => {
                    in_rules = true;
                    let Ok(seconds) = value.parse::<f64>() else {
                        continue;
                    };
                    if !seconds.is_finite() || seconds < 0.0 {
                        continue;
                    }
                    let delay = Duration::from_secs_f64(seconds);
                    if group.iter().any(|ua| ua != "*" && agent.contains(ua.as_str())) {
                        for_agent = Some(delay);
                    } else if group.iter().any(|ua| ua == "*") {
                        for_wildcard = Some(delay);
                    }
                }
                _ => in_rules = true,
            }
        }

        for_agent.or(for_wildcard)
    }
}
