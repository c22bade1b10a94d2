//! SQLite frontier store
//!
//! This module provides a SQLite-based implementation of the FrontierStore trait.
//! All projects share one database; the connection sits behind a mutex so the
//! store can be shared between workers.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{FrontierCounts, FrontierStore, Partition, StoreError, StoreResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite storage backend
pub struct SqliteFrontierStore {
    conn: Mutex<Connection>,
}

impl SqliteFrontierStore {
    /// Opens (or creates) the database at `path`
    pub fn new(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn insert_pending(conn: &Connection, project: &str, url: &str) -> StoreResult<bool> {
        let now = Utc::now().to_rfc3339();
        let changed = conn.execute(
            "INSERT OR IGNORE INTO frontier (project, url, state, updated_at) VALUES (?1, ?2, ?3, ?4)",
            params![project, url, Partition::Pending.as_str(), now],
        )?;
        Ok(changed > 0)
    }

    fn members(&self, project: &str, partition: Partition) -> StoreResult<BTreeSet<String>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT url FROM frontier WHERE project = ?1 AND state = ?2")?;

        let urls = stmt
            .query_map(params![project, partition.as_str()], |row| {
                row.get::<_, String>(0)
            })?
            .collect::<Result<BTreeSet<_>, _>>()?;

        Ok(urls)
    }
}

impl FrontierStore for SqliteFrontierStore {
    fn seed_if_empty(&self, project: &str, seed_url: &str) -> StoreResult<bool> {
        let conn = self.lock()?;
        Self::insert_pending(&conn, project, seed_url)
    }

    fn pending(&self, project: &str) -> StoreResult<BTreeSet<String>> {
        self.members(project, Partition::Pending)
    }

    fn visited(&self, project: &str) -> StoreResult<BTreeSet<String>> {
        self.members(project, Partition::Visited)
    }

    fn partition_of(&self, project: &str, url: &str) -> StoreResult<Option<Partition>> {
        let conn = self.lock()?;
        let state: Option<String> = conn
            .query_row(
                "SELECT state FROM frontier WHERE project = ?1 AND url = ?2",
                params![project, url],
                |row| row.get(0),
            )
            .optional()?;

        match state {
            None => Ok(None),
            Some(s) => Partition::parse(&s)
                .map(Some)
                .ok_or_else(|| StoreError::Corrupt(format!("unknown partition '{}'", s))),
        }
    }

    fn mark_visited(&self, project: &str, url: &str) -> StoreResult<bool> {
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339();
        // A single upsert, so the row flips from pending to visited in one statement
        let changed = conn.execute(
            "INSERT INTO frontier (project, url, state, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(project, url) DO UPDATE SET state = excluded.state, updated_at = excluded.updated_at
             WHERE frontier.state = ?5",
            params![
                project,
                url,
                Partition::Visited.as_str(),
                now,
                Partition::Pending.as_str()
            ],
        )?;
        Ok(changed > 0)
    }

    fn enqueue(&self, project: &str, url: &str) -> StoreResult<bool> {
        let conn = self.lock()?;
        Self::insert_pending(&conn, project, url)
    }

    fn requeue(&self, project: &str, urls: &[String]) -> StoreResult<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut added = 0;
        for url in urls {
            if Self::insert_pending(&tx, project, url)? {
                added += 1;
            }
        }
        tx.commit()?;
        Ok(added)
    }

    fn counts(&self, project: &str) -> StoreResult<FrontierCounts> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT state, COUNT(*) FROM frontier WHERE project = ?1 GROUP BY state")?;

        let mut counts = FrontierCounts::default();
        let rows = stmt.query_map(params![project], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (state, count) = row?;
            match Partition::parse(&state) {
                Some(Partition::Pending) => counts.pending = count as usize,
                Some(Partition::Visited) => counts.visited = count as usize,
                None => {
                    return Err(StoreError::Corrupt(format!(
                        "unknown partition '{}'",
                        state
                    )))
                }
            }
        }

        Ok(counts)
    }

    fn clear(&self, project: &str) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM frontier WHERE project = ?1", params![project])?;
        Ok(())
    }
}
