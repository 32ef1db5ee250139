//! Statistics derived from a crawl snapshot
//!
//! This module provides functionality for summarising a saved snapshot
//! and displaying it on the console.

use crate::storage::Snapshot;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Crawl statistics summary
#[derive(Debug, Clone)]
pub struct SnapshotStatistics {
    /// Number of URLs visited so far
    pub visited: usize,

    /// Number of URLs waiting in the frontier
    pub pending: usize,

    /// Pending URLs grouped by depth
    pub pending_by_depth: BTreeMap<u32, usize>,

    /// Pending URLs deeper than the depth limit (will be skipped)
    pub pending_over_depth: usize,

    /// When the snapshot was written
    pub saved_at: DateTime<Utc>,

    /// Seed URL recorded with the snapshot
    pub seed_url: Option<String>,
}

impl SnapshotStatistics {
    /// Builds statistics for a snapshot under the given depth limit
    pub fn from_snapshot(snapshot: &Snapshot, max_depth: u32) -> Self {
        let mut pending_by_depth: BTreeMap<u32, usize> = BTreeMap::new();
        for entry in snapshot.state.frontier.iter() {
            *pending_by_depth.entry(entry.depth()).or_insert(0) += 1;
        }

        let pending_over_depth: usize = match max_depth.checked_add(1) {
            Some(first_skipped) => pending_by_depth
                .range(first_skipped..)
                .map(|(_, count)| count)
                .sum(),
            None => 0,
        };

        Self {
            visited: snapshot.state.visited.len(),
            pending: snapshot.state.frontier.len(),
            pending_by_depth,
            pending_over_depth,
            saved_at: snapshot.saved_at,
            seed_url: snapshot.seed_url.clone(),
        }
    }

    /// Pending URLs that will actually be fetched
    pub fn pending_within_depth(&self) -> usize {
        self.pending - self.pending_over_depth
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &SnapshotStatistics) {
    println!("=== Crawl Snapshot ===\n");

    println!("Overview:");
    println!("  Saved at: {}", stats.saved_at.to_rfc3339());
    if let Some(seed) = &stats.seed_url {
        println!("  Seed URL: {}", seed);
    }
    println!("  Visited URLs: {}", stats.visited);
    println!("  Pending URLs: {}", stats.pending);
    println!(
        "  Pending within depth limit: {}",
        stats.pending_within_depth()
    );
    println!();

    if !stats.pending_by_depth.is_empty() {
        println!("Pending by Depth:");
        for (depth, count) in &stats.pending_by_depth {
            println!("  depth {}: {}", depth, count);
        }
        println!();
    }

    if stats.pending == 0 {
        println!("Frontier is empty: the crawl has completed");
    }
}
