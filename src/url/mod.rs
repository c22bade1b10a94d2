//! URL handling module for Tether-Crawl
//!
//! Pure helpers used by every stage of the crawl: validation and normalization
//! of URL strings, host extraction, and the allowed-host matching that scopes
//! a crawl to its project.

mod domain;
mod normalize;

pub use domain::{default_allowed_hosts, extract_host, host_matches, host_of};
pub use normalize::{normalize, strip_fragment, validate};

pub(crate) use normalize::is_crawlable;
