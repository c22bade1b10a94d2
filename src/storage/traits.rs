//! Frontier store trait and error types
//!
//! This module defines the interface every persistence backend implements and
//! the errors those backends report.

use std::collections::BTreeSet;
use thiserror::Error;

/// Errors that can occur during frontier store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Store lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("Corrupt store data: {0}")]
    Corrupt(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// The two disjoint URL sets kept per project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    /// Discovered but not yet visited
    Pending,
    /// Fetch/extract pipeline completed
    Visited,
}

impl Partition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Visited => "visited",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "visited" => Some(Self::Visited),
            _ => None,
        }
    }
}

/// Sizes of both partitions of one project
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrontierCounts {
    pub pending: usize,
    pub visited: usize,
}

/// A persistent, deduplicating set store with a `pending` and a `visited` partition
/// per project
///
/// Every method takes `&self` and must be safe to call from many workers at once.
/// A URL is never in both partitions, and each mutation is atomic from the
/// caller's point of view: no observer sees a URL in neither or both partitions
/// while it moves from `pending` to `visited`.
pub trait FrontierStore: Send + Sync {
    /// Adds `seed_url` to `pending` if it is in neither partition
    ///
    /// Returns true if the seed was added. Idempotent.
    fn seed_if_empty(&self, project: &str, seed_url: &str) -> StoreResult<bool>;

    /// Snapshot of the `pending` partition
    fn pending(&self, project: &str) -> StoreResult<BTreeSet<String>>;

    /// Snapshot of the `visited` partition
    fn visited(&self, project: &str) -> StoreResult<BTreeSet<String>>;

    /// Which partition holds `url`, if any
    fn partition_of(&self, project: &str, url: &str) -> StoreResult<Option<Partition>>;

    /// Moves `url` to `visited`, removing it from `pending`
    ///
    /// Returns false (and changes nothing) if it was already visited.
    fn mark_visited(&self, project: &str, url: &str) -> StoreResult<bool>;

    /// Adds `url` to `pending` iff it is in neither partition
    ///
    /// Returns true if the URL was added.
    fn enqueue(&self, project: &str, url: &str) -> StoreResult<bool>;

    /// Re-inserts URLs into `pending`, skipping any already pending or visited
    ///
    /// Returns how many URLs were added.
    fn requeue(&self, project: &str, urls: &[String]) -> StoreResult<usize>;

    /// Sizes of both partitions
    fn counts(&self, project: &str) -> StoreResult<FrontierCounts>;

    /// Removes every URL of a project from both partitions
    fn clear(&self, project: &str) -> StoreResult<()>;

    /// Checks membership of one partition
    fn contains(&self, project: &str, partition: Partition, url: &str) -> StoreResult<bool> {
        Ok(self.partition_of(project, url)? == Some(partition))
    }

    /// Returns true if `url` is pending or visited
    fn is_known(&self, project: &str, url: &str) -> StoreResult<bool> {
        Ok(self.partition_of(project, url)?.is_some())
    }
}
