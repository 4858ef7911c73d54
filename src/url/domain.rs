use url::Url;

/// Extracts the host from a URL, lowercased
///
/// The host (without port) is the unit of politeness: requests to the same
/// host share one delay budget and one request cap.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sitedex::url::extract_host;
///
/// let url = Url::parse("https://EXAMPLE.COM:8443/path").unwrap();
/// assert_eq!(extract_host(&url), Some("example.com".to_string()));
/// ```
pub fn extract_host(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}
