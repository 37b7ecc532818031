//! Flat name index of the taxonomy tree.
//!
//! The index is rebuilt from scratch after every structural change. Search is
//! a plain case-insensitive substring match on entry names.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// One file or directory below the root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct IndexEntry {
    /// The entry's base name, lowercased.
    pub name_lowercase: String,
    pub absolute_path: PathBuf,
}

impl IndexEntry {
    /// Returns the original (not lowercased) base name.
    pub fn name(&self) -> String {
        self.absolute_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Returns the containing directory relative to `root`, or `"Root"` when
    /// the entry sits directly under it.
    pub fn location(&self, root: &Path) -> String {
        let parent = self.absolute_path.parent().unwrap_or(root);
        match parent.strip_prefix(root) {
            Ok(relative) if relative.as_os_str().is_empty() => "Root".to_string(),
            Ok(relative) => relative.display().to_string(),
            Err(_) => parent.display().to_string(),
        }
    }
}

/// A subtree the walk could not read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub path: Option<PathBuf>,
    pub reason: String,
}

/// Errors that prevent an index rebuild.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndexError {
    #[error("cannot index {}: not a directory", .0.display())]
    RootUnavailable(PathBuf),
}

/// Every entry found by the last rebuild.
#[derive(Debug, Clone, Default)]
pub struct FileIndex {
    root: PathBuf,
    entries: Vec<IndexEntry>,
    skipped: Vec<SkippedEntry>,
}

impl FileIndex {
    /// Builds an index directly from entries, e.g. for callers that keep their
    /// own listing.
    pub fn from_entries(root: impl Into<PathBuf>, entries: Vec<IndexEntry>) -> Self {
        Self {
            root: root.into(),
            entries,
            skipped: Vec::new(),
        }
    }

    /// Returns the directory this index was built from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns all entries in walk order.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Returns the subtrees that could not be read.
    pub fn skipped(&self) -> &[SkippedEntry] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns every entry whose name contains `term`, ignoring case.
    ///
    /// Returns `None` when the trimmed term is empty: search is inactive and
    /// the caller should show the whole tree instead.
    ///
    /// # Examples
    ///
    /// ```
    /// use paratidy::index::{FileIndex, IndexEntry};
    /// use std::path::PathBuf;
    ///
    /// let index = FileIndex::from_entries("/para", vec![IndexEntry {
    ///     name_lowercase: "invoice_march.pdf".to_string(),
    ///     absolute_path: PathBuf::from("/para/1_Projects/invoice_march.pdf"),
    /// }]);
    ///
    /// assert_eq!(index.search("MARCH").map(|hits| hits.len()), Some(1));
    /// assert!(index.search("  ").is_none());
    /// ```
    pub fn search(&self, term: &str) -> Option<Vec<&IndexEntry>> {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return None;
        }
        Some(
            self.entries
                .iter()
                .filter(|entry| entry.name_lowercase.contains(&term))
                .collect(),
        )
    }
}

/// Walks `root` and indexes every file and directory below it.
///
/// Symbolic links are indexed but not followed, so link cycles cannot make the
/// walk loop. Unreadable subtrees are skipped and listed in
/// [`FileIndex::skipped`].
///
/// # Errors
///
/// Returns [`IndexError::RootUnavailable`] if `root` is not a directory.
pub fn rebuild_index(root: &Path) -> Result<FileIndex, IndexError> {
    if !root.is_dir() {
        return Err(IndexError::RootUnavailable(root.to_path_buf()));
    }

    info!(root = %root.display(), "rebuilding file index");
    let mut index = FileIndex {
        root: root.to_path_buf(),
        entries: Vec::new(),
        skipped: Vec::new(),
    };

    for entry in WalkDir::new(root).min_depth(1).follow_links(false) {
        match entry {
            Ok(entry) => index.entries.push(IndexEntry {
                name_lowercase: entry.file_name().to_string_lossy().to_lowercase(),
                absolute_path: entry.into_path(),
            }),
            Err(e) => {
                warn!(path = ?e.path(), error = %e, "skipping unreadable entry");
                index.skipped.push(SkippedEntry {
                    path: e.path().map(Path::to_path_buf),
                    reason: e.to_string(),
                });
            }
        }
    }

    info!(
        entries = index.entries.len(),
        skipped = index.skipped.len(),
        "indexing complete"
    );
    Ok(index)
}
