//! Snapshot schema definitions
//!
//! The schema version is kept in SQLite's `user_version` header field. A
//! database written under any other version is dropped and recreated, which
//! the crawler sees as a cold start.

/// Current snapshot schema version
pub const SCHEMA_VERSION: i64 = 1;

/// SQL schema for the snapshot database
pub const SCHEMA_SQL: &str = r#"
-- Pending URLs in frontier order
CREATE TABLE IF NOT EXISTS frontier (
    position INTEGER PRIMARY KEY,
    url TEXT NOT NULL,
    depth INTEGER NOT NULL
);

-- Visited URLs in visitation order
CREATE TABLE IF NOT EXISTS visited (
    sequence INTEGER PRIMARY KEY,
    url TEXT NOT NULL UNIQUE
);

-- Single-row snapshot header
CREATE TABLE IF NOT EXISTS snapshot_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    saved_at TEXT NOT NULL,
    config_hash TEXT,
    seed_url TEXT
);
"#;

const DROP_SQL: &str = r#"
DROP TABLE IF EXISTS frontier;
DROP TABLE IF EXISTS visited;
DROP TABLE IF EXISTS snapshot_meta;
"#;

/// Reads the schema version recorded in the database header
pub fn get_schema_version(conn: &rusqlite::Connection) -> Result<i64, rusqlite::Error> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
}

/// Initializes the database schema
///
/// A database stamped with a different schema version (or never stamped)
/// loses its snapshot tables before the current schema is created.
///
/// # Returns
///
/// * `Ok(true)` - An incompatible snapshot was discarded
/// * `Ok(false)` - The schema was already current, or the database was new
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<bool, rusqlite::Error> {
    let version = get_schema_version(conn)?;
    let mut discarded = false;

    if version != SCHEMA_VERSION {
        let has_tables: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
             AND name IN ('frontier', 'visited', 'snapshot_meta')",
            [],
            |row| row.get(0),
        )?;
        discarded = has_tables > 0;
        conn.execute_batch(DROP_SQL)?;
    }

    conn.execute_batch(SCHEMA_SQL)?;
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;

    Ok(discarded)
}
