//! HTML extraction for page records
//!
//! This module turns fetched bytes into:
//! - The page title (first `<title>`, trimmed)
//! - A plain-text preview of the body, cut at a fixed number of characters
//! - The anchors to follow, resolved to absolute URLs
//!
//! Extraction never fails: html5ever recovers some structure from any input,
//! and whatever it recovers is what the page record gets.

use crate::url::strip_fragment;
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::HashSet;
use url::Url;

/// Title used when a non-empty document has no usable `<title>`
pub const NO_TITLE: &str = "No title";

/// Elements whose text never reaches the body preview
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Extracted information from an HTML page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractResult {
    pub title: String,

    /// Whitespace-collapsed body text, at most the requested number of characters
    pub body_text: String,

    /// Resolved link targets in document order, fragment-free and deduplicated
    pub links: Vec<Url>,
}

/// Extracts the title, body preview and links of a fetched page
///
/// # Link Extraction Rules
///
/// **Include:** `<a href="...">` anywhere in the document, `rel="nofollow"` included
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` and `data:` targets
/// - fragment-only links (same-page anchors)
/// - anything that is not HTTP(S) after resolution
///
/// # Arguments
///
/// * `url` - The page's own URL, used to resolve relative links
/// * `raw` - The fetched bytes (decoded as UTF-8, lossily)
/// * `preview_chars` - Cutoff for the body preview
///
/// # Example
///
/// ```
/// use sitedex::crawler::extract;
/// use url::Url;
///
/// let html = br#"<html><head><title>Test</title></head><body><p>Hi</p><a href="/page">Link</a></body></html>"#;
/// let page = extract(&Url::parse("https://example.com/").unwrap(), html, 2000);
/// assert_eq!(page.title, "Test");
/// assert_eq!(page.links[0].as_str(), "https://example.com/page");
/// ```
pub fn extract(url: &Url, raw: &[u8], preview_chars: usize) -> ExtractResult {
    let html = String::from_utf8_lossy(raw);
    if html.trim().is_empty() {
        return ExtractResult::default();
    }

    let document = Html::parse_document(&html);

    ExtractResult {
        title: extract_title(&document).unwrap_or_else(|| NO_TITLE.to_string()),
        body_text: extract_body_text(&document, preview_chars),
        links: extract_links(&document, url),
    }
}

fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| collapse_whitespace(element.text(), usize::MAX))
        .filter(|s| !s.is_empty())
}

fn extract_body_text(document: &Html, limit: usize) -> String {
    let Ok(body_selector) = Selector::parse("body") else {
        return String::new();
    };
    let Some(body) = document.select(&body_selector).next() else {
        return String::new();
    };

    let texts = body.descendants().filter_map(|node| {
        let Node::Text(text) = node.value() else {
            return None;
        };
        let hidden = node
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|el| HIDDEN_ELEMENTS.contains(&el.value().name()));
        (!hidden).then_some(&**text)
    });

    collapse_whitespace(texts, limit)
}

/// Joins the words of `parts` with single spaces, stopping at `limit` characters
fn collapse_whitespace<'a>(parts: impl Iterator<Item = &'a str>, limit: usize) -> String {
    let mut out = String::new();
    let mut chars = 0;

    for word in parts.flat_map(str::split_whitespace) {
        if !out.is_empty() {
            // No room for anything after the separator
            if chars + 1 >= limit {
                break;
            }
            out.push(' ');
            chars += 1;
        }
        for c in word.chars() {
            if chars >= limit {
                break;
            }
            out.push(c);
            chars += 1;
        }
        if chars >= limit {
            break;
        }
    }

    out
}

fn extract_links(document: &Html, base_url: &Url) -> Vec<Url> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    let Ok(anchor_selector) = Selector::parse("a[href]") else {
        return links;
    };

    for element in document.select(&anchor_selector) {
        if element.value().attr("download").is_some() {
            continue;
        }

        let Some(href) = element.value().attr("href") else {
            continue;
        };

        if let Some(absolute_url) = resolve_link(href, base_url) {
            if seen.insert(absolute_url.as_str().to_string()) {
                links.push(absolute_url);
            }
        }
    }

    links
}

/// Resolves a link href to an absolute, fragment-free URL
///
/// Returns None if the link should be excluded.
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    match absolute_url.scheme() {
        "http" | "https" => Some(strip_fragment(&absolute_url)),
        _ => None,
    }
}
