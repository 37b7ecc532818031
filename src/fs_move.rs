//! Moving files and directories, across filesystems if needed.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Moves `src` to `dest`.
///
/// Tries a rename first. When the two paths live on different filesystems the
/// entry is copied (recursively for directories) and the source removed.
/// The caller decides what to do about an existing `dest`.
pub fn move_path(src: &Path, dest: &Path) -> io::Result<()> {
    match fs::rename(src, dest) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            warn!(src = %src.display(), dest = %dest.display(), "rename crosses devices, copying instead");
            if fs::symlink_metadata(src)?.is_dir() {
                copy_dir(src, dest)?;
                fs::remove_dir_all(src)
            } else {
                fs::copy(src, dest)?;
                fs::remove_file(src)
            }
        }
        Err(e) => Err(e),
    }
}

/// Returns `<stem>_conflict_<n><ext>` next to `candidate` for the smallest
/// `n` that does not exist yet, or `candidate` itself if it is free.
pub fn conflict_free_path(candidate: &Path) -> PathBuf {
    unique_path(candidate, "conflict", exists)
}

/// Returns `candidate` if `taken` rejects it, otherwise the first
/// `<stem>_<label>_<n><ext>` that `taken` rejects.
pub fn unique_path<F>(candidate: &Path, label: &str, taken: F) -> PathBuf
where
    F: Fn(&Path) -> bool,
{
    if !taken(candidate) {
        return candidate.to_path_buf();
    }

    let stem = candidate
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = candidate
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut counter = 1;
    loop {
        let next = candidate.with_file_name(format!("{}_{}_{}{}", stem, label, counter, ext));
        if !taken(&next) {
            return next;
        }
        counter += 1;
    }
}

/// Like `Path::exists`, but also true for dangling symlinks.
pub fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

fn copy_dir(src: &Path, dest: &Path) -> io::Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    debug!(src = %src.display(), dest = %dest.display(), "copied directory tree");
    Ok(())
}
