use crate::project::ProjectRequest;
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Tether-Crawl
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub storage: StorageConfig,
    #[serde(default, rename = "project")]
    pub projects: Vec<ProjectEntry>,
}

impl Config {
    /// Builds the start requests for every configured project
    pub fn project_requests(&self) -> Vec<ProjectRequest> {
        self.projects
            .iter()
            .map(|entry| entry.to_request(&self.crawler))
            .collect()
    }
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Default number of workers per project
    #[serde(rename = "thread-count")]
    pub thread_count: usize,

    /// Default maximum number of visited URLs per project
    #[serde(rename = "crawl-limit")]
    pub crawl_limit: usize,

    /// Timeout for a single page fetch (seconds)
    #[serde(rename = "fetch-timeout-secs", default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Timeout for the robots.txt fetch (seconds)
    #[serde(rename = "robots-timeout-secs", default = "default_robots_timeout")]
    pub robots_timeout_secs: u64,

    /// How long a worker waits on an empty queue before re-checking (milliseconds)
    #[serde(rename = "dequeue-wait-ms", default = "default_dequeue_wait")]
    pub dequeue_wait_ms: u64,
}

impl CrawlerConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn robots_timeout(&self) -> Duration {
        Duration::from_secs(self.robots_timeout_secs)
    }

    pub fn dequeue_wait(&self) -> Duration {
        Duration::from_millis(self.dequeue_wait_ms)
    }
}

fn default_fetch_timeout() -> u64 {
    10
}

fn default_robots_timeout() -> u64 {
    10
}

fn default_dequeue_wait() -> u64 {
    1000
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Frontier persistence configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Which backend holds the pending/visited sets
    #[serde(default)]
    pub backend: StorageBackend,

    /// Data directory (file backend) or database file (sqlite backend)
    pub path: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// One `pending.txt`/`visited.txt` pair per project directory
    #[default]
    File,
    /// A single SQLite database holding every project
    Sqlite,
}

/// A project to crawl
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectEntry {
    /// Seed URL
    pub seed: String,

    /// Hosts in scope (exact or `*.` wildcard); derived from the seed when absent
    #[serde(rename = "allowed-hosts")]
    pub allowed_hosts: Option<Vec<String>>,

    #[serde(rename = "thread-count")]
    pub thread_count: Option<usize>,

    #[serde(rename = "crawl-limit")]
    pub crawl_limit: Option<usize>,
}

impl ProjectEntry {
    /// Resolves per-project overrides against the crawler defaults
    pub fn to_request(&self, defaults: &CrawlerConfig) -> ProjectRequest {
        ProjectRequest {
            seed: self.seed.clone(),
            allowed_hosts: self.allowed_hosts.clone(),
            thread_count: self.thread_count.unwrap_or(defaults.thread_count),
            crawl_limit: self.crawl_limit.unwrap_or(defaults.crawl_limit),
        }
    }
}
