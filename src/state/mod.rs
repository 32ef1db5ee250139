//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `Frontier`: FIFO queue of `(url, depth)` pairs awaiting a visit
//! - `VisitedSet`: URLs the crawler has already committed to fetching
//! - `CrawlState`: the two together, as owned by the engine and snapshotted
//! - `EngineState`: lifecycle of the traversal engine

mod engine_state;
mod frontier;
mod visited;

// Re-export main types
pub use engine_state::EngineState;
pub use frontier::{Frontier, FrontierEntry};
pub use visited::VisitedSet;

/// The in-memory crawl state: what is left to visit and what has been visited
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlState {
    pub frontier: Frontier,
    pub visited: VisitedSet,
}

impl CrawlState {
    /// Creates an empty state (a cold start)
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(frontier: Frontier, visited: VisitedSet) -> Self {
        Self { frontier, visited }
    }

    /// Queues a URL unless it is already pending or visited
    pub fn enqueue(&mut self, address: &str, depth: u32) -> bool {
        self.frontier.enqueue(address, depth, &self.visited)
    }

    /// Returns true when there is nothing left to visit and nothing visited
    pub fn is_empty(&self) -> bool {
        self.frontier.is_empty() && self.visited.is_empty()
    }
}
