//! Output module for recording crawled URLs and reporting on crawl state
//!
//! This module handles:
//! - Appending visited URLs to the plain-text output file
//! - Rebuilding that file from a saved visited set
//! - Summarising a saved snapshot for the console

pub mod stats;
mod text;
mod traits;

pub use stats::{print_statistics, SnapshotStatistics};
pub use text::{rebuild_sink, TextFileSink};
pub use traits::{CrawlSink, OutputError, OutputResult};
