//! Flat-file frontier store
//!
//! Each project owns a directory under the store root holding `pending.txt` and
//! `visited.txt`: newline-delimited, sorted, deduplicated URL lists. A file is
//! rewritten in full (through a temporary file and a rename) after every change,
//! under the single store lock. Enqueues are not fsynced on their own: the next
//! move to `visited` syncs the pending file first, so a page's links are durable
//! before the page itself is recorded as visited.

use crate::storage::traits::{FrontierCounts, FrontierStore, Partition, StoreError, StoreResult};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct ProjectSets {
    pending: BTreeSet<String>,
    visited: BTreeSet<String>,
    /// `pending.txt` holds enqueues that were written but not synced
    pending_unsynced: bool,
}

impl ProjectSets {
    fn partition_of(&self, url: &str) -> Option<Partition> {
        if self.visited.contains(url) {
            Some(Partition::Visited)
        } else if self.pending.contains(url) {
            Some(Partition::Pending)
        } else {
            None
        }
    }
}

/// File-backed storage
pub struct FileFrontierStore {
    root: PathBuf,
    projects: Mutex<HashMap<String, ProjectSets>>,
}

impl FileFrontierStore {
    /// Creates a store rooted at `root`, creating the directory if needed
    pub fn new(root: &Path) -> StoreResult<Self> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            projects: Mutex::new(HashMap::new()),
        })
    }

    /// Directory holding one project's files
    pub fn project_dir(&self, project: &str) -> PathBuf {
        let safe: String = project
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.root.join(safe)
    }

    fn file_path(&self, project: &str, partition: Partition) -> PathBuf {
        self.project_dir(project)
            .join(format!("{}.txt", partition.as_str()))
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, HashMap<String, ProjectSets>>> {
        self.projects
            .lock()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    /// Runs `f` against a project's sets, loading them from disk on first use
    fn with_project<R>(
        &self,
        project: &str,
        f: impl FnOnce(&Self, &mut ProjectSets) -> StoreResult<R>,
    ) -> StoreResult<R> {
        let mut projects = self.lock()?;
        if !projects.contains_key(project) {
            let sets = self.load(project)?;
            projects.insert(project.to_string(), sets);
        }
        let sets = projects
            .get_mut(project)
            .ok_or_else(|| StoreError::Corrupt(format!("project '{}' not loaded", project)))?;
        f(self, sets)
    }

    fn load(&self, project: &str) -> StoreResult<ProjectSets> {
        let mut sets = ProjectSets {
            pending: read_set(&self.file_path(project, Partition::Pending))?,
            visited: read_set(&self.file_path(project, Partition::Visited))?,
            pending_unsynced: false,
        };

        // An interrupted move can leave a URL in both files; visited wins.
        let overlap: Vec<String> = sets
            .pending
            .intersection(&sets.visited)
            .cloned()
            .collect();
        if !overlap.is_empty() {
            tracing::warn!(
                "[{}] {} URLs found in both pending and visited, keeping them visited",
                project,
                overlap.len()
            );
            for url in &overlap {
                sets.pending.remove(url);
            }
            self.flush(project, Partition::Pending, &sets.pending, true)?;
        }

        Ok(sets)
    }

    fn flush(
        &self,
        project: &str,
        partition: Partition,
        urls: &BTreeSet<String>,
        durable: bool,
    ) -> StoreResult<()> {
        let path = self.file_path(project, partition);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let tmp = path.with_extension("txt.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            for url in urls {
                writeln!(file, "{}", url)?;
            }
            if durable {
                file.sync_all()?;
            }
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

fn read_set(path: &Path) -> StoreResult<BTreeSet<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeSet::new()),
        Err(e) => Err(e.into()),
    }
}

impl FrontierStore for FileFrontierStore {
    fn seed_if_empty(&self, project: &str, seed_url: &str) -> StoreResult<bool> {
        self.enqueue(project, seed_url)
    }

    fn pending(&self, project: &str) -> StoreResult<BTreeSet<String>> {
        self.with_project(project, |_, sets| Ok(sets.pending.clone()))
    }

    fn visited(&self, project: &str) -> StoreResult<BTreeSet<String>> {
        self.with_project(project, |_, sets| Ok(sets.visited.clone()))
    }

    fn partition_of(&self, project: &str, url: &str) -> StoreResult<Option<Partition>> {
        self.with_project(project, |_, sets| Ok(sets.partition_of(url)))
    }

    fn mark_visited(&self, project: &str, url: &str) -> StoreResult<bool> {
        self.with_project(project, |store, sets| {
            if sets.visited.contains(url) {
                return Ok(false);
            }

            if sets.pending_unsynced {
                store.flush(project, Partition::Pending, &sets.pending, true)?;
                sets.pending_unsynced = false;
            }

            sets.visited.insert(url.to_string());
            let was_pending = sets.pending.remove(url);

            // Visited is written first so a crash in between leaves the URL visited.
            store.flush(project, Partition::Visited, &sets.visited, true)?;
            if was_pending {
                store.flush(project, Partition::Pending, &sets.pending, true)?;
            }
            Ok(true)
        })
    }

    fn enqueue(&self, project: &str, url: &str) -> StoreResult<bool> {
        self.with_project(project, |store, sets| {
            if sets.partition_of(url).is_some() {
                return Ok(false);
            }
            sets.pending.insert(url.to_string());
            store.flush(project, Partition::Pending, &sets.pending, false)?;
            sets.pending_unsynced = true;
            Ok(true)
        })
    }

    fn requeue(&self, project: &str, urls: &[String]) -> StoreResult<usize> {
        self.with_project(project, |store, sets| {
            let mut added = 0;
            for url in urls {
                if sets.partition_of(url).is_none() {
                    sets.pending.insert(url.clone());
                    added += 1;
                }
            }
            if added > 0 {
                store.flush(project, Partition::Pending, &sets.pending, true)?;
                sets.pending_unsynced = false;
            }
            Ok(added)
        })
    }

    fn counts(&self, project: &str) -> StoreResult<FrontierCounts> {
        self.with_project(project, |_, sets| {
            Ok(FrontierCounts {
                pending: sets.pending.len(),
                visited: sets.visited.len(),
            })
        })
    }

    fn clear(&self, project: &str) -> StoreResult<()> {
        self.with_project(project, |store, sets| {
            sets.pending.clear();
            sets.visited.clear();
            sets.pending_unsynced = false;
            store.flush(project, Partition::Pending, &sets.pending, true)?;
            store.flush(project, Partition::Visited, &sets.visited, true)
        })
    }
}
