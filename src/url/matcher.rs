use crate::url::extract_host;
use url::Url;

/// Checks if a host matches a pattern
///
/// Patterns are either an exact host (`example.com`) or a wildcard
/// (`*.example.com`) which matches the bare host and every subdomain.
///
/// ```
/// use sitedex::url::matches_wildcard;
///
/// assert!(matches_wildcard("*.example.com", "example.com"));
/// assert!(matches_wildcard("*.example.com", "api.v2.example.com"));
/// assert!(!matches_wildcard("*.example.com", "myexample.com"));
/// assert!(!matches_wildcard("example.com", "blog.example.com"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(base) => {
            candidate == base
                || (candidate.len() > base.len()
                    && candidate.ends_with(base)
                    && candidate.as_bytes()[candidate.len() - base.len() - 1] == b'.')
        }
        None => candidate == pattern,
    }
}

/// The set of hosts a crawl is allowed to enter
#[derive(Debug, Clone)]
pub struct HostScope {
    patterns: Vec<String>,
}

impl HostScope {
    /// Builds the scope from configured patterns, falling back to the exact
    /// hosts of the seed URLs when no pattern is configured
    pub fn new(allowed_hosts: &[String], seeds: &[Url]) -> Self {
        let mut patterns: Vec<String> = if allowed_hosts.is_empty() {
            seeds.iter().filter_map(extract_host).collect()
        } else {
            allowed_hosts.iter().map(|p| p.to_lowercase()).collect()
        };
        patterns.sort();
        patterns.dedup();

        Self { patterns }
    }

    /// Returns true if the URL's host is inside the scope
    pub fn allows(&self, url: &Url) -> bool {
        match extract_host(url) {
            Some(host) => self.patterns.iter().any(|p| matches_wildcard(p, &host)),
            None => false,
        }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_exact_match() {
        assert!(matches_wildcard("example.com", "example.com"));
        assert!(!matches_wildcard("example.com", "other.com"));
        assert!(!matches_wildcard("blog.example.com", "example.com"));
    }

    #[test]
    fn test_wildcard_matches_bare_and_nested() {
        assert!(matches_wildcard("*.example.com", "example.com"));
        assert!(matches_wildcard("*.example.com", "blog.example.com"));
        assert!(matches_wildcard("*.example.com", "deep.nested.sub.example.com"));
    }

    #[test]
    fn test_wildcard_no_partial_label_match() {
        assert!(!matches_wildcard("*.example.com", "myexample.com"));
        assert!(!matches_wildcard("*.example.com", "example.com.org"));
        assert!(!matches_wildcard("*.example.com", ""));
    }

    #[test]
    fn test_scope_defaults_to_seed_hosts() {
        let seeds = vec![url("https://camcookie876.github.io/index.html")];
        let scope = HostScope::new(&[], &seeds);

        assert!(scope.allows(&url("https://camcookie876.github.io/about.html")));
        assert!(!scope.allows(&url("https://github.io/")));
        assert!(!scope.allows(&url("https://other.example/")));
    }

    #[test]
    fn test_scope_uses_configured_patterns() {
        let seeds = vec![url("https://example.com/")];
        let scope = HostScope::new(&["*.Example.com".to_string()], &seeds);

        assert_eq!(scope.patterns(), &["*.example.com".to_string()]);
        assert!(scope.allows(&url("https://docs.example.com/guide")));
        assert!(!scope.allows(&url("https://example.org/")));
    }
}
