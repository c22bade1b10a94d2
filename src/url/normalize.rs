use url::Url;

/// Returns true iff the string parses as an `http`/`https` URL with a non-empty host
///
/// # Examples
///
/// ```
/// use tether_crawl::url::validate;
///
/// assert!(validate("https://example.com/page"));
/// assert!(!validate("ftp://example.com/file"));
/// assert!(!validate("not a url"));
/// ```
pub fn validate(url_str: &str) -> bool {
    match Url::parse(url_str) {
        Ok(url) => is_crawlable(&url),
        Err(_) => false,
    }
}

pub(crate) fn is_crawlable(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https") && url.host_str().is_some_and(|h| !h.is_empty())
}

/// Normalizes a URL according to Tether-Crawl's frontier rules
///
/// # Normalization Steps
///
/// 1. Parse the URL; malformed input is returned unchanged
/// 2. Remove the fragment (everything after `#`)
/// 3. If a query string is present and the path lacks a trailing slash,
///    append `/` to the path so the URL reads `/path/?query`
///
/// The third step matches how the crawler evaluates query URLs against robots.txt,
/// so a URL is always stored in the same form it is checked in.
///
/// # Examples
///
/// ```
/// use tether_crawl::url::normalize;
///
/// assert_eq!(normalize("https://example.com/a#top"), "https://example.com/a");
/// assert_eq!(normalize("https://example.com/search?q=1"), "https://example.com/search/?q=1");
/// assert_eq!(normalize("::garbage::"), "::garbage::");
/// ```
pub fn normalize(url_str: &str) -> String {
    let mut url = match Url::parse(url_str) {
        Ok(url) => url,
        Err(_) => return url_str.to_string(),
    };

    url.set_fragment(None);

    if url.query().is_some() && !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    url.to_string()
}

/// Removes only the fragment, leaving path and query untouched
///
/// Malformed input is returned unchanged.
pub fn strip_fragment(url_str: &str) -> String {
    match Url::parse(url_str) {
        Ok(mut url) => {
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => url_str.to_string(),
    }
}
