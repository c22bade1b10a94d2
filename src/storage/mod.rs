//! Storage module for persisting the crawl frontier
//!
//! This module holds the Frontier Store abstraction and its backends:
//! - `FileFrontierStore`: one `pending.txt`/`visited.txt` pair per project
//! - `SqliteFrontierStore`: one SQLite table shared by all projects
//!
//! The crawler only ever talks to `dyn FrontierStore`; `open_store` picks the
//! backend named in the configuration.

mod file;
mod schema;
mod sqlite;
mod traits;

pub use file::FileFrontierStore;
pub use sqlite::SqliteFrontierStore;
pub use traits::{FrontierCounts, FrontierStore, Partition, StoreError, StoreResult};

use crate::config::{StorageBackend, StorageConfig};
use std::path::Path;
use std::sync::Arc;

/// Opens the configured frontier store
///
/// # Arguments
///
/// * `config` - The storage section of the configuration
///
/// # Returns
///
/// * `Ok(Arc<dyn FrontierStore>)` - A store ready to be shared between workers
/// * `Err(StoreError)` - The directory or database could not be opened
pub fn open_store(config: &StorageConfig) -> StoreResult<Arc<dyn FrontierStore>> {
    let path = Path::new(&config.path);
    let store: Arc<dyn FrontierStore> = match config.backend {
        StorageBackend::File => Arc::new(FileFrontierStore::new(path)?),
        StorageBackend::Sqlite => Arc::new(SqliteFrontierStore::new(path)?),
    };
    tracing::debug!(
        "Opened {:?} frontier store at {}",
        config.backend,
        path.display()
    );
    Ok(store)
}
