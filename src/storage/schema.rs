//! SQLite schema for the frontier store

/// SQL schema for the database
///
/// One row per `(project, url)`: the primary key is what keeps a URL out of
/// both partitions at once.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS frontier (
    project TEXT NOT NULL,
    url TEXT NOT NULL,
    state TEXT NOT NULL CHECK (state IN ('pending', 'visited')),
    updated_at TEXT NOT NULL,
    PRIMARY KEY (project, url)
);

CREATE INDEX IF NOT EXISTS idx_frontier_partition ON frontier(project, state);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
