//! Tether-Crawl: a domain-scoped, resumable web crawler
//!
//! This crate crawls a site from a seed URL, following only links into a configured
//! set of hostnames, respecting robots.txt, stopping at a crawl limit, and persisting
//! its frontier (pending URLs) and visited set so a stopped crawl can be resumed.

pub mod config;
pub mod crawler;
pub mod project;
pub mod robots;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Tether-Crawl operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Frontier store error: {0}")]
    Store(#[from] storage::StoreError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid host pattern: {0}")]
    InvalidPattern(String),
}

/// Result type alias for Tether-Crawl operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlManager, CrawlService, CrawlState, CrawlStatus, Spider, StartOutcome};
pub use project::{CrawlProject, ProjectRequest};
pub use robots::RobotsPolicy;
pub use storage::{FrontierStore, Partition, StoreError};
pub use url::{normalize, validate};
