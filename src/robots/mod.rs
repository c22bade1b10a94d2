//! Robots.txt handling module
//!
//! This module fetches a project's robots.txt and turns it into a `RobotsPolicy`.
//! Robots unavailability never blocks a crawl: any failure yields the permissive
//! fallback, which is logged.

mod parser;

pub use parser::{PolicySource, RobotsPolicy, USER_AGENT};

use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Builds the robots.txt URL for the site a URL belongs to
pub fn robots_url(base_url: &str) -> Option<Url> {
    Url::parse(base_url).ok()?.join("/robots.txt").ok()
}

/// Fetches and parses robots.txt for the site of `base_url`
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `base_url` - Any URL on the site, usually the seed
/// * `timeout` - Upper bound on the whole request
///
/// # Returns
///
/// The parsed policy, or `RobotsPolicy::permissive()` on a network error,
/// timeout, non-success status, or unreadable body.
pub async fn load_for(client: &Client, base_url: &str, timeout: Duration) -> RobotsPolicy {
    let Some(url) = robots_url(base_url) else {
        tracing::warn!("Cannot derive robots.txt URL from {}, allowing all", base_url);
        return RobotsPolicy::permissive();
    };

    let response = match client.get(url.as_str()).timeout(timeout).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("Error loading {}: {}; allowing all", url, e);
            return RobotsPolicy::permissive();
        }
    };

    let status = response.status();
    if !status.is_success() {
        tracing::warn!("{} returned HTTP {}; allowing all", url, status.as_u16());
        return RobotsPolicy::permissive();
    }

    match response.text().await {
        Ok(body) => {
            tracing::debug!("Loaded {} ({} bytes)", url, body.len());
            RobotsPolicy::from_content(&body)
        }
        Err(e) => {
            tracing::warn!("Error reading {}: {}; allowing all", url, e);
            RobotsPolicy::permissive()
        }
    }
}
