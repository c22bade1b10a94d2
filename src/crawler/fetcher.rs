//! HTTP fetcher implementation
//!
//! This module handles every page request the crawler makes:
//! - Building the shared HTTP client with a descriptive user agent
//! - GET requests bounded by a per-request timeout
//! - Content-Type screening (only HTML is parsed for links)
//! - Error classification

use crate::config::UserAgentConfig;
use reqwest::{header::CONTENT_TYPE, redirect::Policy, Client};
use std::time::Duration;

/// Maximum redirect hops followed for one request
pub const MAX_REDIRECTS: usize = 10;

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// An HTML page was fetched
    Html {
        /// Final URL after redirects, used to resolve relative links
        final_url: String,
        status_code: u16,
        body: String,
    },

    /// The resource was fetched but is not HTML
    NotHtml {
        status_code: u16,
        content_type: String,
    },

    /// The server answered with a non-success status
    HttpError { status_code: u16 },

    /// Connection refused, timeout, broken body, too many redirects, ...
    NetworkError { error: String },
}

impl FetchResult {
    /// Describes a failed fetch, or `None` for a successful one
    pub fn error_message(&self) -> Option<String> {
        match self {
            Self::Html { .. } | Self::NotHtml { .. } => None,
            Self::HttpError { status_code } => Some(format!("HTTP {}", status_code)),
            Self::NetworkError { error } => Some(error.clone()),
        }
    }
}

/// Formats the user agent string: `CrawlerName/Version (+ContactURL; ContactEmail)`
pub fn user_agent_string(config: &UserAgentConfig) -> String {
    format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    )
}

/// Builds an HTTP client with proper configuration
///
/// Timeouts are applied per request, so the same client serves page fetches
/// and the robots.txt fetch with their own bounds.
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent_string(config))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL and classifies the response
///
/// | Condition | Result |
/// |-----------|--------|
/// | 2xx with HTML (or missing) Content-Type | `Html` |
/// | 2xx with any other Content-Type | `NotHtml` |
/// | Non-2xx status | `HttpError` |
/// | Timeout, connection failure, body read failure | `NetworkError` |
///
/// Never retries; the caller decides what a failure means.
pub async fn fetch_page(client: &Client, url: &str, timeout: Duration) -> FetchResult {
    let response = match client.get(url).timeout(timeout).send().await {
        Ok(response) => response,
        Err(e) => {
            return FetchResult::NetworkError {
                error: describe_error(&e),
            }
        }
    };

    let status = response.status();
    if !status.is_success() {
        return FetchResult::HttpError {
            status_code: status.as_u16(),
        };
    }

    let final_url = response.url().to_string();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    if !is_html(&content_type) {
        return FetchResult::NotHtml {
            status_code: status.as_u16(),
            content_type,
        };
    }

    match response.text().await {
        Ok(body) => FetchResult::Html {
            final_url,
            status_code: status.as_u16(),
            body,
        },
        Err(e) => FetchResult::NetworkError {
            error: describe_error(&e),
        },
    }
}

/// Returns true for HTML content types; an absent header is treated as HTML
fn is_html(content_type: &str) -> bool {
    let content_type = content_type.to_ascii_lowercase();
    content_type.is_empty()
        || content_type.contains("text/html")
        || content_type.contains("application/xhtml+xml")
}

fn describe_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "Request timeout".to_string()
    } else if e.is_connect() {
        format!("Connection failed: {}", e)
    } else if e.is_redirect() {
        format!("Redirect error: {}", e)
    } else {
        e.to_string()
    }
}
