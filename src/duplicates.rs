//! Content-hash duplicate detection.
//!
//! Files are compared by size first and hashed with BLAKE3 only when another
//! file of the same size exists. Empty files are never reported as
//! duplicates.

use crate::index::IndexError;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Computes the BLAKE3 hash of a file's contents as a hex string.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0u8; 65536];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize().to_hex().to_string())
}

/// Non-empty regular files below `root`, grouped by size.
fn files_by_size(root: &Path) -> HashMap<u64, Vec<PathBuf>> {
    let mut by_size: HashMap<u64, Vec<PathBuf>> = HashMap::new();
    for entry in WalkDir::new(root).min_depth(1).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(path = ?e.path(), error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        match entry.metadata() {
            Ok(meta) if meta.len() > 0 => by_size.entry(meta.len()).or_default().push(entry.into_path()),
            Ok(_) => {}
            Err(e) => warn!(path = %entry.path().display(), error = %e, "could not read file size"),
        }
    }
    by_size
}

/// The files of one directory tree, looked up by content.
///
/// Hashes are computed on demand and cached, so a batch only hashes the
/// destination files whose size matches an incoming file.
#[derive(Debug, Default)]
pub struct ContentIndex {
    by_size: HashMap<u64, Vec<PathBuf>>,
    hashes: HashMap<PathBuf, String>,
}

impl ContentIndex {
    /// Records the size of every file below `root`.
    pub fn scan(root: &Path) -> Self {
        let by_size = files_by_size(root);
        debug!(root = %root.display(), sizes = by_size.len(), "content index ready");
        Self {
            by_size,
            hashes: HashMap::new(),
        }
    }

    /// Returns a file in the index with the same contents as `file`.
    ///
    /// `file` itself never counts as its own duplicate.
    pub fn find(&mut self, file: &Path) -> io::Result<Option<PathBuf>> {
        let size = fs::metadata(file)?.len();
        if size == 0 {
            return Ok(None);
        }
        let Some(candidates) = self.by_size.get(&size) else {
            return Ok(None);
        };

        let hash = hash_file(file)?;
        for candidate in candidates {
            if candidate == file {
                continue;
            }
            let candidate_hash = match self.hashes.get(candidate) {
                Some(known) => known.clone(),
                None => match hash_file(candidate) {
                    Ok(computed) => {
                        self.hashes.insert(candidate.clone(), computed.clone());
                        computed
                    }
                    Err(e) => {
                        warn!(path = %candidate.display(), error = %e, "could not hash file");
                        continue;
                    }
                },
            };
            if candidate_hash == hash {
                return Ok(Some(candidate.clone()));
            }
        }
        Ok(None)
    }
}

/// Files below the root that share the same contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    pub hash: String,
    pub size: u64,
    /// Sorted paths; always at least two.
    pub paths: Vec<PathBuf>,
}

/// Scans the whole tree below `root` for files with identical contents.
///
/// Groups are ordered by their first path. Files that cannot be read are
/// logged and left out.
///
/// # Errors
///
/// Returns [`IndexError::RootUnavailable`] if `root` is not a directory.
pub fn find_duplicates(root: &Path) -> Result<Vec<DuplicateGroup>, IndexError> {
    if !root.is_dir() {
        return Err(IndexError::RootUnavailable(root.to_path_buf()));
    }

    info!(root = %root.display(), "scanning for duplicates");
    let mut groups = Vec::new();
    for (size, paths) in files_by_size(root) {
        if paths.len() < 2 {
            continue;
        }
        let mut by_hash: HashMap<String, Vec<PathBuf>> = HashMap::new();
        for path in paths {
            match hash_file(&path) {
                Ok(hash) => by_hash.entry(hash).or_default().push(path),
                Err(e) => warn!(path = %path.display(), error = %e, "could not hash file"),
            }
        }
        for (hash, mut paths) in by_hash {
            if paths.len() < 2 {
                continue;
            }
            paths.sort();
            groups.push(DuplicateGroup { hash, size, paths });
        }
    }

    groups.sort_by(|a, b| a.paths.cmp(&b.paths));
    info!(groups = groups.len(), "duplicate scan complete");
    Ok(groups)
}
