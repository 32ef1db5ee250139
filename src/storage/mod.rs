//! Storage module for persisting crawl snapshots
//!
//! This module handles durable snapshot/restore of the crawl state, including:
//! - SQLite database initialization and schema versioning
//! - Atomic replacement of the frontier and visited set
//! - Cold-start fallback when no usable snapshot exists

mod schema;
mod sqlite;
mod traits;

pub use schema::SCHEMA_VERSION;
pub use sqlite::SqliteStateStore;
pub use traits::{StateStore, StorageError, StorageResult};

use crate::state::CrawlState;
use chrono::{DateTime, Utc};
use std::path::Path;

/// A crawl state read back from durable storage
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub state: CrawlState,
    pub saved_at: DateTime<Utc>,
    pub config_hash: Option<String>,
    pub seed_url: Option<String>,
}

/// Opens or creates the snapshot store at `path`
pub fn open_state_store(path: &Path) -> StorageResult<SqliteStateStore> {
    SqliteStateStore::open(path)
}

/// Opens an existing snapshot for inspection only
///
/// Never creates, migrates or moves the file.
pub fn open_snapshot_read_only(path: &Path) -> StorageResult<SqliteStateStore> {
    SqliteStateStore::open_read_only(path)
}

/// Reads the last snapshot, treating any failure as a cold start
///
/// A missing snapshot and an undecodable one look the same to the caller:
/// both yield `None`. Decode failures are logged, never returned.
pub fn restore_state(store: &dyn StateStore) -> Option<Snapshot> {
    match store.load() {
        Ok(Some(snapshot)) => {
            tracing::info!(
                "Restored snapshot from {}: {} visited, {} pending",
                snapshot.saved_at.to_rfc3339(),
                snapshot.state.visited.len(),
                snapshot.state.frontier.len()
            );
            Some(snapshot)
        }
        Ok(None) => {
            tracing::info!("No crawl snapshot found, starting cold");
            None
        }
        Err(e) => {
            tracing::warn!("Could not read crawl snapshot, starting cold: {}", e);
            None
        }
    }
}
