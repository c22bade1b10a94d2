//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with per-request timeouts
//! - HTML parsing and link extraction
//! - The per-page spider step
//! - The worker pool and lifecycle of each project's crawl
//! - The service that keeps one manager per project

mod fetcher;
mod manager;
mod parser;
mod queue;
mod service;
mod spider;

pub use fetcher::{build_http_client, fetch_page, user_agent_string, FetchResult};
pub use manager::{CrawlManager, CrawlState, CrawlStatus, StartOutcome, StopReason};
pub use parser::{extract_links, parse_html, ParsedPage};
pub use queue::WorkQueue;
pub use service::CrawlService;
pub use spider::{Spider, VisitOutcome, VisitStatus};
