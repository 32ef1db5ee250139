//! SQLite snapshot store
//!
//! Frontier and visited set live in two tables of one database file. Every
//! save rewrites both inside a single transaction, so a crash can never leave
//! one table ahead of the other.

use crate::state::{CrawlState, Frontier, FrontierEntry, VisitedSet};
use crate::storage::schema::{get_schema_version, initialize_schema, SCHEMA_VERSION};
use crate::storage::traits::{StateStore, StorageError, StorageResult};
use crate::storage::Snapshot;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OpenFlags, OptionalExtension};
use std::path::{Path, PathBuf};

/// SQLite snapshot backend
pub struct SqliteStateStore {
    conn: Connection,
    path: Option<PathBuf>,
    config_hash: Option<String>,
    seed_url: Option<String>,
}

impl SqliteStateStore {
    /// Opens or creates the snapshot database at `path`
    ///
    /// Parent directories are created as needed. A file SQLite reports as
    /// not a database, or as corrupt, is moved aside to `<path>.corrupt` and
    /// a fresh database is created in its place. Any other failure (locked,
    /// read-only, permissions) is returned and the file is left alone.
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStateStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - The database could not be opened as-is
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = match Self::open_connection(path) {
            Ok(conn) => conn,
            Err(e) if path.exists() && is_corruption(&e) => {
                let aside = corrupt_path(path);
                tracing::warn!(
                    "Snapshot {} is unreadable ({}), moving it to {} and starting cold",
                    path.display(),
                    e,
                    aside.display()
                );
                std::fs::rename(path, &aside)?;
                Self::open_connection(path)?
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
            config_hash: None,
            seed_url: None,
        })
    }

    /// Opens an existing snapshot database without writing to it
    ///
    /// The schema is neither created nor migrated and nothing is moved aside,
    /// so inspecting a snapshot can never alter it. A database written under
    /// another schema version fails on `load` with `SchemaMismatch`.
    pub fn open_read_only(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
            config_hash: None,
            seed_url: None,
        })
    }

    /// Creates a store backed by an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn,
            path: None,
            config_hash: None,
            seed_url: None,
        })
    }

    /// Records the config hash and seed URL in every subsequent snapshot
    pub fn with_metadata(mut self, config_hash: Option<String>, seed_url: Option<String>) -> Self {
        self.config_hash = config_hash;
        self.seed_url = seed_url;
        self
    }

    /// Path of the database file, if file-backed
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn open_connection(path: &Path) -> StorageResult<Connection> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
        ",
        )?;

        if initialize_schema(&conn)? {
            tracing::warn!(
                "Snapshot {} used an incompatible schema and was discarded",
                path.display()
            );
        }

        Ok(conn)
    }
}

/// True only for errors that mean the file itself is damaged
fn is_corruption(error: &StorageError) -> bool {
    matches!(
        error,
        StorageError::Sqlite(rusqlite::Error::SqliteFailure(failure, _))
            if matches!(failure.code, ErrorCode::NotADatabase | ErrorCode::DatabaseCorrupt)
    )
}

fn corrupt_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".corrupt");
    PathBuf::from(name)
}

impl StateStore for SqliteStateStore {
    fn save(&mut self, state: &CrawlState) -> StorageResult<()> {
        let tx = self.conn.transaction()?;

        tx.execute("DELETE FROM frontier", [])?;
        tx.execute("DELETE FROM visited", [])?;

        {
            let mut insert_entry =
                tx.prepare("INSERT INTO frontier (position, url, depth) VALUES (?1, ?2, ?3)")?;
            for (position, entry) in state.frontier.iter().enumerate() {
                insert_entry.execute(params![position as i64, entry.address(), entry.depth()])?;
            }

            let mut insert_visited =
                tx.prepare("INSERT INTO visited (sequence, url) VALUES (?1, ?2)")?;
            for (sequence, url) in state.visited.iter().enumerate() {
                insert_visited.execute(params![sequence as i64, url])?;
            }
        }

        tx.execute(
            "INSERT OR REPLACE INTO snapshot_meta (id, saved_at, config_hash, seed_url)
             VALUES (1, ?1, ?2, ?3)",
            params![Utc::now().to_rfc3339(), self.config_hash, self.seed_url],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn load(&self) -> StorageResult<Option<Snapshot>> {
        let version = get_schema_version(&self.conn)?;
        if version != SCHEMA_VERSION {
            return Err(StorageError::SchemaMismatch {
                found: version,
                expected: SCHEMA_VERSION,
            });
        }

        let meta = self
            .conn
            .query_row(
                "SELECT saved_at, config_hash, seed_url FROM snapshot_meta WHERE id = 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((saved_at, config_hash, seed_url)) = meta else {
            return Ok(None);
        };

        let saved_at = saved_at.parse::<DateTime<Utc>>().map_err(|e| {
            StorageError::Corrupt(format!("invalid saved_at '{}': {}", saved_at, e))
        })?;

        let mut stmt = self
            .conn
            .prepare("SELECT url, depth FROM frontier ORDER BY position ASC")?;
        let entries = stmt
            .query_map([], |row| {
                Ok(FrontierEntry::new(
                    row.get::<_, String>(0)?,
                    row.get::<_, u32>(1)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = self
            .conn
            .prepare("SELECT url FROM visited ORDER BY sequence ASC")?;
        let visited = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<VisitedSet, _>>()?;

        Ok(Some(Snapshot {
            state: CrawlState::from_parts(Frontier::from_entries(entries), visited),
            saved_at,
            config_hash,
            seed_url,
        }))
    }

    fn clear(&mut self) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM frontier", [])?;
        tx.execute("DELETE FROM visited", [])?;
        tx.execute("DELETE FROM snapshot_meta", [])?;
        tx.commit()?;
        Ok(())
    }
}
