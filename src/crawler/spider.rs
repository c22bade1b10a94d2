//! Single-page crawl step
//!
//! A `Spider` visits one URL of its project: it fetches the page, extracts its
//! links, adds the in-scope, robots-allowed, never-seen ones to the frontier,
//! and finally marks the URL visited. Fetch and parse failures are soft: the
//! page still counts as visited. Only frontier store failures propagate.

use crate::crawler::fetcher::{fetch_page, FetchResult};
use crate::crawler::parser::parse_html;
use crate::project::CrawlProject;
use crate::robots::RobotsPolicy;
use crate::storage::{FrontierStore, Partition, StoreResult};
use crate::url::{host_of, strip_fragment, validate};
use reqwest::Client;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// What happened to the URL handed to `Spider::visit`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitStatus {
    /// The page was fetched (or the fetch failed softly) and is now visited
    Visited,

    /// The URL was already visited; nothing was fetched
    AlreadyVisited,

    /// robots.txt forbids the URL; nothing was fetched or recorded
    Disallowed,
}

/// Result of one visit
#[derive(Debug, Clone)]
pub struct VisitOutcome {
    pub url: String,
    pub status: VisitStatus,

    /// Links newly added to the project's pending partition
    pub accepted: BTreeSet<String>,

    /// Fetch or parse failure, if any
    pub error: Option<String>,

    /// Page title, when the page was HTML and had one
    pub title: Option<String>,
}

impl VisitOutcome {
    fn empty(url: &str, status: VisitStatus) -> Self {
        Self {
            url: url.to_string(),
            status,
            accepted: BTreeSet::new(),
            error: None,
            title: None,
        }
    }
}

/// Per-project page processor, shared by all workers of a crawl
pub struct Spider {
    project: Arc<CrawlProject>,
    store: Arc<dyn FrontierStore>,
    robots: Arc<RobotsPolicy>,
    client: Client,
    fetch_timeout: Duration,
}

impl Spider {
    pub fn new(
        project: Arc<CrawlProject>,
        store: Arc<dyn FrontierStore>,
        robots: Arc<RobotsPolicy>,
        client: Client,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            project,
            store,
            robots,
            client,
            fetch_timeout,
        }
    }

    pub fn project(&self) -> &CrawlProject {
        &self.project
    }

    /// Crawls one page
    ///
    /// # Arguments
    ///
    /// * `url` - A URL from the project's frontier
    ///
    /// # Returns
    ///
    /// * `Ok(VisitOutcome)` - The page was handled; see `status` and `error`
    /// * `Err(StoreError)` - The frontier store failed; the URL was not marked visited
    pub async fn visit(&self, url: &str) -> StoreResult<VisitOutcome> {
        let name = self.project.name();

        if self.store.contains(name, Partition::Visited, url)? {
            tracing::debug!("[{}] Already visited {}", name, url);
            return Ok(VisitOutcome::empty(url, VisitStatus::AlreadyVisited));
        }

        if !self.robots.can_fetch(url) {
            tracing::debug!("[{}] robots.txt disallows {}", name, url);
            return Ok(VisitOutcome::empty(url, VisitStatus::Disallowed));
        }

        let mut outcome = VisitOutcome::empty(url, VisitStatus::Visited);

        let result = fetch_page(&self.client, url, self.fetch_timeout).await;
        match result {
            FetchResult::Html {
                final_url,
                status_code,
                body,
            } => match Url::parse(&final_url)
                .map_err(|e| e.to_string())
                .and_then(|base| parse_html(&body, &base))
            {
                Ok(parsed) => {
                    tracing::debug!("[{}] Fetched {} (HTTP {})", name, final_url, status_code);
                    outcome.title = parsed.title;
                    outcome.accepted = self.admit_links(&parsed.links)?;
                }
                Err(e) => outcome.error = Some(format!("Parse error: {}", e)),
            },
            FetchResult::NotHtml {
                status_code,
                content_type,
            } => {
                tracing::debug!(
                    "[{}] Skipping links of {} (HTTP {}, {})",
                    name,
                    url,
                    status_code,
                    content_type
                );
            }
            failed => outcome.error = failed.error_message(),
        }

        self.store.mark_visited(name, url)?;
        Ok(outcome)
    }

    /// Adds links to the frontier, returning the ones that were newly queued
    ///
    /// A link is admitted when, without its fragment, it is a valid http(s) URL on
    /// an allowed host, unknown to the store, and allowed by robots.txt. Links are
    /// stored and later fetched exactly as the page wrote them.
    pub fn admit_links(&self, links: &BTreeSet<String>) -> StoreResult<BTreeSet<String>> {
        let name = self.project.name();
        let mut accepted = BTreeSet::new();

        for link in links {
            let link = strip_fragment(link);
            if accepted.contains(&link) || !validate(&link) {
                continue;
            }

            let in_scope = host_of(&link)
                .map(|host| self.project.allows_host(&host))
                .unwrap_or(false);
            if !in_scope {
                continue;
            }

            if self.store.is_known(name, &link)? {
                continue;
            }

            if !self.robots.can_fetch(&link) {
                tracing::debug!("[{}] robots.txt disallows {}", name, link);
                continue;
            }

            if self.store.enqueue(name, &link)? {
                accepted.insert(link);
            }
        }

        Ok(accepted)
    }
}
