//! The taxonomy root: one base directory holding the four category folders.

use crate::category::{Category, CategoryFolders, FolderNameError};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{info, warn};

/// Why the configured root cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RootError {
    /// No base directory is configured.
    #[error("no base directory is configured")]
    Unset,
    /// The configured base directory does not exist.
    #[error("base directory {} does not exist", .0.display())]
    NotFound(PathBuf),
    /// The configured base directory is a file or something else.
    #[error("base directory {} is not a directory", .0.display())]
    NotADirectory(PathBuf),
    /// The category folder names cannot be used.
    #[error("invalid category folders: {0}")]
    InvalidFolders(FolderNameError),
}

/// A validated taxonomy root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxonomyRoot {
    root: PathBuf,
    folders: CategoryFolders,
}

impl TaxonomyRoot {
    /// Opens an existing directory as the taxonomy root.
    ///
    /// The path is normalized first. An empty path counts as unset.
    ///
    /// # Errors
    ///
    /// Returns a [`RootError`] when the path is unset, missing, or not a
    /// directory, or when a folder name would leave the root.
    pub fn open(root: Option<&Path>, folders: CategoryFolders) -> Result<Self, RootError> {
        folders.validate().map_err(RootError::InvalidFolders)?;
        let root = match root {
            Some(path) if !path.as_os_str().is_empty() => normalize(path),
            _ => return Err(RootError::Unset),
        };

        match fs::metadata(&root) {
            Ok(meta) if meta.is_dir() => Ok(Self { root, folders }),
            Ok(_) => Err(RootError::NotADirectory(root)),
            Err(_) => Err(RootError::NotFound(root)),
        }
    }

    /// Returns the root directory.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Returns the category folder mapping.
    pub fn folders(&self) -> &CategoryFolders {
        &self.folders
    }

    /// Returns `root/<folder>` for a category.
    pub fn category_dir(&self, category: Category) -> PathBuf {
        self.root.join(self.folders.get(category))
    }

    /// Creates every missing category folder.
    ///
    /// Failures are logged and returned; they never stop the remaining
    /// folders from being created.
    pub fn ensure_category_folders(&self) -> Vec<(Category, io::Error)> {
        let mut failures = Vec::new();
        for category in Category::ALL {
            let dir = self.category_dir(category);
            if dir.is_dir() {
                continue;
            }
            match fs::create_dir_all(&dir) {
                Ok(()) => info!(category = %category, path = %dir.display(), "created category folder"),
                Err(e) => {
                    warn!(category = %category, path = %dir.display(), error = %e, "could not create category folder");
                    failures.push((category, e));
                }
            }
        }
        failures
    }

    /// Returns the category whose folder contains `path`, if any.
    ///
    /// The category folder itself counts as inside. Matching is done on whole
    /// path components, so `1_Projects_old` is not inside `1_Projects`.
    pub fn category_for_path(&self, path: &Path) -> Option<Category> {
        let path = normalize(path);
        Category::ALL
            .into_iter()
            .find(|&category| path.starts_with(self.category_dir(category)))
    }

    /// Returns true if `path` is the root or one of the category folders.
    pub fn is_protected(&self, path: &Path) -> bool {
        let path = normalize(path);
        path == self.root
            || Category::ALL
                .into_iter()
                .any(|category| path == self.category_dir(category))
    }
}

/// Makes a path absolute and resolves `.` and `..` lexically.
///
/// Symbolic links are not resolved and the path does not have to exist.
pub fn normalize(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
