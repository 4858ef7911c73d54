//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the crawler's User-Agent and timeouts
//! - GET requests returning raw bytes
//! - Redirect handling (bounded, final URL recorded)
//! - Error classification into page states
//!
//! A fetch issues exactly one request and never retries; retry policy belongs
//! to the coordinator.

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::state::PageState;
use reqwest::{header::CONTENT_TYPE, redirect::Policy, Client};
use std::time::Duration;
use url::Url;

/// Upper bound on the connect phase of a request
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// The server answered 2xx and the body was read
    Success {
        /// Final URL after redirects
        final_url: Url,
        /// HTTP status code
        status_code: u16,
        /// Content-Type header value (empty if absent)
        content_type: String,
        /// Raw response body
        body: Vec<u8>,
    },

    /// The server answered with a non-2xx status
    HttpError {
        /// The HTTP status code
        status_code: u16,
        /// The page state this error maps to
        state: PageState,
    },

    /// No usable response (timeout, connection refused, redirect limit, etc.)
    NetworkError {
        /// Error description
        error: String,
        /// The page state this error maps to
        state: PageState,
    },
}

impl FetchResult {
    /// The page state a failed fetch maps to, or None on success
    pub fn failure_state(&self) -> Option<PageState> {
        match self {
            Self::Success { .. } => None,
            Self::HttpError { state, .. } | Self::NetworkError { state, .. } => Some(*state),
        }
    }
}

/// Returns true if a Content-Type header denotes an HTML document
///
/// A missing Content-Type is treated as HTML.
pub fn is_html(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    mime.is_empty() || mime == "text/html" || mime == "application/xhtml+xml"
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - Identification sent with every request
/// * `crawler` - Request timeout and redirect limit
///
/// # Example
///
/// ```no_run
/// use sitedex::config::{CrawlerConfig, UserAgentConfig};
/// use sitedex::crawler::build_http_client;
///
/// let user_agent = UserAgentConfig {
///     crawler_name: "sitedex".to_string(),
///     crawler_version: "0.1.0".to_string(),
///     contact_url: "https://example.com/bot".to_string(),
///     contact_email: "bot@example.com".to_string(),
/// };
///
/// let client = build_http_client(&user_agent, &CrawlerConfig::default()).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    crawler: &CrawlerConfig,
) -> Result<Client, reqwest::Error> {
    let timeout = crawler.request_timeout();
    let redirects = match crawler.max_redirects {
        0 => Policy::none(),
        hops => Policy::limited(hops as usize),
    };

    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(CONNECT_TIMEOUT))
        .redirect(redirects)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL with a single GET request
///
/// # Error Classification
///
/// | Condition | State |
/// |-----------|-------|
/// | HTTP 429 | RateLimited |
/// | other HTTP 4xx | DeadLink |
/// | HTTP 5xx | ServerError |
/// | Timeout, connection refused, DNS/TLS failure | Unreachable |
/// | Redirect limit exceeded, unreadable body | Failed |
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `url` - The URL to fetch
///
/// # Returns
///
/// A FetchResult indicating success or the type of failure
pub async fn fetch_url(client: &Client, url: &Url) -> FetchResult {
    let response = match client.get(url.clone()).send().await {
        Ok(response) => response,
        Err(e) => return classify_error(e),
    };

    let status = response.status();
    if !status.is_success() {
        return FetchResult::HttpError {
            status_code: status.as_u16(),
            state: PageState::from_status(status.as_u16()),
        };
    }

    let final_url = response.url().clone();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    match response.bytes().await {
        Ok(body) => FetchResult::Success {
            final_url,
            status_code: status.as_u16(),
            content_type,
            body: body.to_vec(),
        },
        Err(e) => classify_error(e),
    }
}

fn classify_error(e: reqwest::Error) -> FetchResult {
    if e.is_timeout() {
        FetchResult::NetworkError {
            error: "Request timeout".to_string(),
            state: PageState::Unreachable,
        }
    } else if e.is_connect() {
        FetchResult::NetworkError {
            error: format!("Connection failed: {}", e),
            state: PageState::Unreachable,
        }
    } else if e.is_redirect() {
        FetchResult::NetworkError {
            error: format!("Redirect limit exceeded: {}", e),
            state: PageState::Failed,
        }
    } else {
        FetchResult::NetworkError {
            error: e.to_string(),
            state: PageState::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn user_agent() -> UserAgentConfig {
        UserAgentConfig {
            crawler_name: "TestCrawler".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "admin@example.com".to_string(),
        }
    }

    fn client_with(crawler: CrawlerConfig) -> Client {
        build_http_client(&user_agent(), &crawler).unwrap()
    }

    fn url(server: &MockServer, p: &str) -> Url {
        Url::parse(&format!("{}{}", server.uri(), p)).unwrap()
    }

    #[test]
    fn test_is_html() {
        assert!(is_html("text/html"));
        assert!(is_html("text/html; charset=utf-8"));
        assert!(is_html("TEXT/HTML"));
        assert!(is_html("application/xhtml+xml"));
        assert!(is_html(""));
        assert!(!is_html("application/pdf"));
        assert!(!is_html("text/plain"));
    }

    #[tokio::test]
    async fn test_success_sends_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .and(header(
                "user-agent",
                "TestCrawler/1.0 (+https://example.com/about; admin@example.com)",
            ))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<title>Hi</title>")
                    .insert_header("content-type", "text/html; charset=utf-8"),
            )
            .expect(1)
            .mount(&server)
            .await;

        match fetch_url(&client_with(CrawlerConfig::default()), &url(&server, "/page")).await {
            FetchResult::Success {
                final_url,
                status_code,
                content_type,
                body,
            } => {
                assert_eq!(final_url, url(&server, "/page"));
                assert_eq!(status_code, 200);
                assert_eq!(content_type, "text/html; charset=utf-8");
                assert_eq!(body, b"<title>Hi</title>");
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_status_classification() {
        let server = MockServer::start().await;
        for (p, code) in [("/gone", 404), ("/slow-down", 429), ("/broken", 503)] {
            Mock::given(method("GET"))
                .and(path(p))
                .respond_with(ResponseTemplate::new(code))
                .mount(&server)
                .await;
        }
        let client = client_with(CrawlerConfig::default());

        let gone = fetch_url(&client, &url(&server, "/gone")).await;
        assert_eq!(gone.failure_state(), Some(PageState::DeadLink));

        let limited = fetch_url(&client, &url(&server, "/slow-down")).await;
        assert_eq!(limited.failure_state(), Some(PageState::RateLimited));

        let broken = fetch_url(&client, &url(&server, "/broken")).await;
        assert_eq!(broken.failure_state(), Some(PageState::ServerError));
    }

    #[tokio::test]
    async fn test_one_redirect_hop_records_final_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(
                ResponseTemplate::new(301).insert_header("location", "/new"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200).set_body_string("moved"))
            .mount(&server)
            .await;

        match fetch_url(&client_with(CrawlerConfig::default()), &url(&server, "/old")).await {
            FetchResult::Success { final_url, .. } => {
                assert_eq!(final_url, url(&server, "/new"));
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_second_redirect_hop_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/b"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/b"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/c"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/c"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let result = fetch_url(&client_with(CrawlerConfig::default()), &url(&server, "/a")).await;
        assert_eq!(result.failure_state(), Some(PageState::Failed));
    }

    #[tokio::test]
    async fn test_timeout_is_unreachable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let client = client_with(CrawlerConfig {
            request_timeout_ms: 100,
            ..CrawlerConfig::default()
        });

        match fetch_url(&client, &url(&server, "/slow")).await {
            FetchResult::NetworkError { state, .. } => assert_eq!(state, PageState::Unreachable),
            other => panic!("expected timeout, got {:?}", other),
        }
    }
}
