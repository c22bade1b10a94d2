//! HTML parser for extracting links
//!
//! This module turns a fetched page into the set of absolute, well-formed
//! hyperlink targets it points at, plus its title for logging.

use crate::url::is_crawlable;
use scraper::{Html, Selector};
use std::collections::BTreeSet;
use url::Url;

/// Extracted information from an HTML page
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// Every `<a href>` target, absolute and fragment-free
    pub links: BTreeSet<String>,
}

/// Parses HTML content and extracts links and title
///
/// # Link Extraction Rules
///
/// **Include:** `<a href="...">` targets, resolved against `base_url`
///
/// **Exclude:**
/// - Empty hrefs and same-page anchors (`#...`)
/// - `javascript:` and `mailto:` targets
/// - Anything that does not resolve to an http(s) URL with a host
///
/// Fragments are stripped from every kept link. The HTML parser recovers from
/// malformed markup, so broken pages yield whatever links could be read.
///
/// # Example
///
/// ```
/// use tether_crawl::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page#x">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url).unwrap();
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert!(parsed.links.contains("https://example.com/page"));
/// ```
pub fn parse_html(html: &str, base_url: &Url) -> Result<ParsedPage, String> {
    let document = Html::parse_document(html);

    let title = extract_title(&document);
    let links = collect_links(&document, base_url)?;

    Ok(ParsedPage { title, links })
}

/// Extracts the set of hyperlink targets from an HTML document
pub fn extract_links(html: &str, base_url: &Url) -> Result<BTreeSet<String>, String> {
    parse_html(html, base_url).map(|parsed| parsed.links)
}

fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn collect_links(document: &Html, base_url: &Url) -> Result<BTreeSet<String>, String> {
    let selector = Selector::parse("a[href]").map_err(|e| format!("Invalid selector: {}", e))?;

    Ok(document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| resolve_link(href, base_url))
        .collect())
}

/// Resolves an href to an absolute, fragment-free URL, or `None` if it is excluded
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if lowered.starts_with("javascript:") || lowered.starts_with("mailto:") {
        return None;
    }

    let mut absolute_url = base_url.join(href).ok()?;
    if !is_crawlable(&absolute_url) {
        return None;
    }

    absolute_url.set_fragment(None);
    Some(absolute_url.to_string())
}
