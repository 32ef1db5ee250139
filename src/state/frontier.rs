//! FIFO crawl frontier
//!
//! The frontier holds `(url, depth)` pairs waiting to be visited. Breadth-first
//! order comes from plain FIFO insertion: every link found on a depth-`d` page
//! is appended behind everything already queued, so all depth-`d` entries are
//! dequeued before any depth-`d+1` entry they lead to.

use crate::state::VisitedSet;
use std::collections::{HashSet, VecDeque};

/// A URL waiting in the frontier together with its link distance from the seed
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FrontierEntry {
    address: String,
    depth: u32,
}

impl FrontierEntry {
    pub fn new(address: impl Into<String>, depth: u32) -> Self {
        Self {
            address: address.into(),
            depth,
        }
    }

    /// The URL to visit
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Link distance from the seed (the seed itself is 0)
    pub fn depth(&self) -> u32 {
        self.depth
    }
}

/// Ordered queue of URLs awaiting a visit
///
/// No URL is ever pending twice. `pending` mirrors the addresses in `queue`
/// so membership checks do not scan the whole queue.
#[derive(Debug, Clone, Default)]
pub struct Frontier {
    queue: VecDeque<FrontierEntry>,
    pending: HashSet<String>,
}

impl Frontier {
    /// Creates an empty frontier
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a frontier from entries in head-to-tail order
    ///
    /// If an address appears more than once only its first entry is kept.
    pub fn from_entries(entries: impl IntoIterator<Item = FrontierEntry>) -> Self {
        let mut frontier = Self::new();
        for entry in entries {
            frontier.push_back(entry);
        }
        frontier
    }

    /// Appends a URL to the tail of the frontier
    ///
    /// Nothing happens if the URL is already pending or has already been
    /// visited. Returns true if the entry was appended.
    pub fn enqueue(&mut self, address: &str, depth: u32, visited: &VisitedSet) -> bool {
        if visited.contains(address) {
            return false;
        }
        self.push_back(FrontierEntry::new(address, depth))
    }

    /// Pops the head entry, or `None` once the frontier is drained
    pub fn dequeue(&mut self) -> Option<FrontierEntry> {
        let entry = self.queue.pop_front()?;
        self.pending.remove(&entry.address);
        Some(entry)
    }

    /// Returns true if the URL is waiting in the frontier
    pub fn contains(&self, address: &str) -> bool {
        self.pending.contains(address)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Iterates over pending entries from head to tail
    pub fn iter(&self) -> impl Iterator<Item = &FrontierEntry> {
        self.queue.iter()
    }

    fn push_back(&mut self, entry: FrontierEntry) -> bool {
        if !self.pending.insert(entry.address.clone()) {
            return false;
        }
        self.queue.push_back(entry);
        true
    }
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.queue == other.queue
    }
}

impl Eq for Frontier {}
