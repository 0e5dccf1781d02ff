//! Append-only history ledger stored as JSON lines.
//!
//! Appends and compactions share one mutex so a compaction never drops a
//! record appended while it was rewriting the file.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use sw_core::{Error, HistoryRecord, Result};

use crate::atomic::write_atomic;

/// Default number of records returned by [`Ledger::tail`].
pub const DEFAULT_TAIL: usize = 50;

#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    lock: Mutex<()>,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a single line, creating the file and its
    /// directory if needed.
    pub fn append(&self, record: &HistoryRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)
            .map_err(|e| Error::persistence("ledger", e.to_string()))?;
        line.push('\n');

        let _guard = self.lock.lock();
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| self.io_error(e))?;
        Ok(())
    }

    /// The most recent `n` records, newest first. Unparsable lines are
    /// skipped; lines are parsed from the end and only until `n` records
    /// are found.
    pub fn tail(&self, n: usize) -> Result<Vec<HistoryRecord>> {
        let contents = {
            let _guard = self.lock.lock();
            self.read_bytes()?
        };
        Ok(lines(&contents).rev().filter_map(parse_line).take(n).collect())
    }

    /// Rewrite the ledger keeping only records for which `keep` returns
    /// true. Returns the number of lines removed, unparsable lines included.
    pub fn compact(&self, keep: impl Fn(&HistoryRecord) -> bool) -> Result<usize> {
        let _guard = self.lock.lock();
        let contents = self.read_bytes()?;
        let total = lines(&contents).count();
        let kept: Vec<HistoryRecord> = lines(&contents)
            .filter_map(parse_line)
            .filter(|r| keep(r))
            .collect();

        let mut out = String::new();
        for record in &kept {
            let line = serde_json::to_string(record)
                .map_err(|e| Error::persistence("ledger", e.to_string()))?;
            out.push_str(&line);
            out.push('\n');
        }
        write_atomic(&self.path, out.as_bytes()).map_err(|e| self.io_error(e))?;

        let removed = total.saturating_sub(kept.len());
        tracing::info!(kept = kept.len(), removed, "Compacted history ledger");
        Ok(removed)
    }

    /// Keep only records whose external id is currently attached to a live
    /// worker.
    pub fn clear_inactive(&self, active_ids: &HashSet<String>) -> Result<usize> {
        self.compact(|r| active_ids.contains(&r.external_id))
    }

    /// Raw ledger contents; a missing file reads as empty.
    fn read_bytes(&self) -> Result<Vec<u8>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn io_error(&self, e: std::io::Error) -> Error {
        Error::persistence("ledger", format!("{}: {e}", self.path.display()))
    }
}

/// Non-blank lines of the ledger file.
fn lines(contents: &[u8]) -> impl DoubleEndedIterator<Item = &[u8]> {
    contents
        .split(|&b| b == b'\n')
        .filter(|line| !line.trim_ascii().is_empty())
}

fn parse_line(line: &[u8]) -> Option<HistoryRecord> {
    match serde_json::from_slice::<HistoryRecord>(line) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::debug!(error = %e, "Skipping unparsable ledger line");
            None
        }
    }
}
