//! Crawl project identity
//!
//! A `CrawlProject` names one crawl: its seed, the hosts it may follow links into,
//! and the limits of a run. It is validated once and immutable afterwards.

use crate::url::{default_allowed_hosts, host_matches, host_of, strip_fragment, validate};
use crate::{ConfigError, ConfigResult};
use std::collections::BTreeSet;

/// Upper bound on workers per project
pub const MAX_THREADS: usize = 100;

/// Parameters for starting a crawl, as received from a caller or a config file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRequest {
    /// The URL the crawl starts from
    pub seed: String,

    /// Hosts the crawl may follow; derived from the seed when `None`
    pub allowed_hosts: Option<Vec<String>>,

    /// Number of concurrent workers
    pub thread_count: usize,

    /// Maximum number of URLs marked visited before the crawl stops itself
    pub crawl_limit: usize,
}

impl ProjectRequest {
    /// Creates a request with the default allowed hosts for the seed
    pub fn new(seed: impl Into<String>, thread_count: usize, crawl_limit: usize) -> Self {
        Self {
            seed: seed.into(),
            allowed_hosts: None,
            thread_count,
            crawl_limit,
        }
    }

    /// Restricts the crawl to an explicit host list
    pub fn with_allowed_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_hosts = Some(hosts.into_iter().map(Into::into).collect());
        self
    }
}

/// One validated crawl project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlProject {
    name: String,
    seed_url: String,
    allowed_hosts: BTreeSet<String>,
    thread_count: usize,
    crawl_limit: usize,
}

impl CrawlProject {
    /// Validates a request and builds the project
    ///
    /// # Errors
    ///
    /// * `ConfigError::InvalidUrl` - the seed is not an http(s) URL with a host
    /// * `ConfigError::Validation` - thread count outside `1..=MAX_THREADS` or zero crawl limit
    /// * `ConfigError::InvalidPattern` - an empty allowed host
    pub fn new(request: &ProjectRequest) -> ConfigResult<Self> {
        if !validate(&request.seed) {
            return Err(ConfigError::InvalidUrl(format!(
                "Seed URL '{}' must be an http(s) URL with a host",
                request.seed
            )));
        }

        if request.thread_count == 0 || request.thread_count > MAX_THREADS {
            return Err(ConfigError::Validation(format!(
                "thread_count must be between 1 and {}, got {}",
                MAX_THREADS, request.thread_count
            )));
        }

        if request.crawl_limit == 0 {
            return Err(ConfigError::Validation(
                "crawl_limit must be >= 1".to_string(),
            ));
        }

        let seed_url = strip_fragment(&request.seed);
        let name = host_of(&seed_url)
            .ok_or_else(|| ConfigError::InvalidUrl(format!("No host in '{}'", request.seed)))?;

        let hosts = match &request.allowed_hosts {
            Some(hosts) => hosts.clone(),
            None => default_allowed_hosts(&name),
        };

        let mut allowed_hosts = BTreeSet::new();
        for host in hosts {
            let host = host.trim().to_lowercase();
            if host.is_empty() || host == "*." {
                return Err(ConfigError::InvalidPattern(
                    "Allowed host cannot be empty".to_string(),
                ));
            }
            allowed_hosts.insert(host);
        }

        Ok(Self {
            name,
            seed_url,
            allowed_hosts,
            thread_count: request.thread_count,
            crawl_limit: request.crawl_limit,
        })
    }

    /// Project name, derived from the seed host
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn seed_url(&self) -> &str {
        &self.seed_url
    }

    pub fn allowed_hosts(&self) -> &BTreeSet<String> {
        &self.allowed_hosts
    }

    pub fn thread_count(&self) -> usize {
        self.thread_count
    }

    pub fn crawl_limit(&self) -> usize {
        self.crawl_limit
    }

    /// Returns true if `host` is in the project's scope
    pub fn allows_host(&self, host: &str) -> bool {
        self.allowed_hosts
            .iter()
            .any(|pattern| host_matches(pattern, host))
    }
}
