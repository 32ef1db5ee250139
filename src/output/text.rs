//! Plain-text list of crawled URLs
//!
//! One URL per line, UTF-8, newline-terminated, append-only. The file is the
//! crawler's external product; other tools tail or read it.

use crate::output::traits::{CrawlSink, OutputError, OutputResult};
use crate::state::VisitedSet;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Appends crawled URLs to a text file
pub struct TextFileSink {
    path: PathBuf,
    file: File,
}

impl TextFileSink {
    /// Opens the file for appending, creating it and its parent directories
    pub fn open(path: &Path) -> OutputResult<Self> {
        create_parent_dirs(path)?;
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Empties the file, then opens it for appending
    pub fn truncate(path: &Path) -> OutputResult<Self> {
        create_parent_dirs(path)?;
        File::create(path)?;
        Self::open(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CrawlSink for TextFileSink {
    fn record(&mut self, url: &str) -> OutputResult<()> {
        check_single_line(url)?;
        // One write per line so a crash never leaves half a URL behind
        self.file.write_all(format!("{}\n", url).as_bytes())?;
        self.file.flush()?;
        Ok(())
    }
}

/// Rewrites the crawled-URL file from a visited set
///
/// URLs are written in visitation order. Used to recover the file when it
/// was deleted or truncated while the snapshot survived.
///
/// # Returns
///
/// The number of URLs written
pub fn rebuild_sink(visited: &VisitedSet, path: &Path) -> OutputResult<usize> {
    create_parent_dirs(path)?;
    let mut writer = BufWriter::new(File::create(path)?);
    let mut written = 0;

    for url in visited.iter() {
        check_single_line(url)?;
        writeln!(writer, "{}", url)?;
        written += 1;
    }

    writer.flush()?;
    Ok(written)
}

fn check_single_line(url: &str) -> OutputResult<()> {
    if url.contains(['\n', '\r']) {
        return Err(OutputError::Write(format!(
            "URL contains a line break: {:?}",
            url
        )));
    }
    Ok(())
}

fn create_parent_dirs(path: &Path) -> OutputResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
