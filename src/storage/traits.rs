//! Storage traits and error types
//!
//! This module defines the trait interface for snapshot backends and
//! associated error types.

use crate::state::CrawlState;
use crate::storage::Snapshot;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot schema version {found} does not match expected version {expected}")]
    SchemaMismatch { found: i64, expected: i64 },

    #[error("Corrupt snapshot: {0}")]
    Corrupt(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for crawl snapshot backends
///
/// A store is a pure serialization boundary: it writes and reads whole
/// `CrawlState` values and holds no crawl logic of its own.
pub trait StateStore: Send {
    /// Persists the full frontier and visited set
    ///
    /// Either the whole snapshot is replaced or, on error, the previous
    /// snapshot is left untouched.
    fn save(&mut self, state: &CrawlState) -> StorageResult<()>;

    /// Reads the last saved snapshot
    ///
    /// # Returns
    ///
    /// * `Ok(Some(Snapshot))` - A snapshot was found and decoded
    /// * `Ok(None)` - Nothing has been saved yet
    /// * `Err(StorageError)` - The snapshot exists but could not be decoded
    fn load(&self) -> StorageResult<Option<Snapshot>>;

    /// Removes any saved snapshot
    fn clear(&mut self) -> StorageResult<()>;
}
