use url::Url;

/// Extracts the lowercase host from a parsed URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use tether_crawl::url::extract_host;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_host(&url), Some("example.com".to_string()));
/// ```
pub fn extract_host(url: &Url) -> Option<String> {
    url.host_str()
        .filter(|h| !h.is_empty())
        .map(|h| h.to_lowercase())
}

/// Parses a URL string and returns its lowercase host, if any
pub fn host_of(url_str: &str) -> Option<String> {
    Url::parse(url_str).ok().as_ref().and_then(extract_host)
}

/// Builds the default allowed-host set for a seed host
///
/// A crawl seeded at `example.com` also follows `www.example.com`, and one seeded
/// at `www.example.com` also follows the bare `example.com`.
pub fn default_allowed_hosts(host: &str) -> Vec<String> {
    let host = host.to_lowercase();
    let sibling = match host.strip_prefix("www.") {
        Some(bare) => bare.to_string(),
        None => format!("www.{}", host),
    };
    vec![host, sibling]
}

/// Checks if a host matches an allowed-host pattern
///
/// Two kinds of pattern are supported:
/// 1. Exact: `example.com` matches only `example.com`
/// 2. Wildcard: `*.example.com` matches `example.com` and any subdomain of it
///
/// Matching is case-sensitive; hosts are lowercased on extraction.
pub fn host_matches(pattern: &str, candidate: &str) -> bool {
    if let Some(base) = pattern.strip_prefix("*.") {
        candidate == base || candidate.ends_with(&format!(".{}", base))
    } else {
        candidate == pattern
    }
}
