//! Persistent operation history.
//!
//! Every placement batch and migration can be appended to a history file as
//! one JSON object per line, each holding the operation kind, an RFC 3339
//! timestamp and the report as produced by its `to_json`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Which operation produced a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Place,
    Migrate,
}

/// One recorded operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub kind: OperationKind,
    /// ISO 8601 timestamp of when the operation finished.
    pub timestamp: String,
    pub report: Value,
}

impl HistoryEntry {
    /// Creates an entry stamped with the current time.
    pub fn new(kind: OperationKind, report: Value) -> Self {
        Self {
            kind,
            timestamp: chrono::Utc::now().to_rfc3339(),
            report,
        }
    }
}

/// Errors reading or writing the history file.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("history file IO error: {0}")]
    Io(#[from] io::Error),
    /// A line is not a valid history entry.
    #[error("invalid history entry on line {line}: {reason}")]
    Corrupt { line: usize, reason: String },
}

/// An append-only JSON-lines history file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationLog {
    path: PathBuf,
}

impl OperationLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends an entry, creating the file and its parent directories.
    pub fn record(&self, entry: &HistoryEntry) -> Result<(), HistoryError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let line = serde_json::to_string(entry).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("JSON serialization failed: {}", e),
            )
        })?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)?;

        debug!(path = %self.path.display(), kind = ?entry.kind, "recorded history entry");
        Ok(())
    }

    /// Reads every entry, oldest first. A missing file has no entries.
    pub fn entries(&self) -> Result<Vec<HistoryEntry>, HistoryError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                serde_json::from_str(line).map_err(|e| HistoryError::Corrupt {
                    line: i + 1,
                    reason: e.to_string(),
                })
            })
            .collect()
    }

    /// Returns at most `limit` of the most recent entries, oldest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<HistoryEntry>, HistoryError> {
        let mut entries = self.entries()?;
        let skip = entries.len().saturating_sub(limit);
        Ok(entries.split_off(skip))
    }
}
