/// Relocation of the category folders to a new taxonomy root.
///
/// When the configured root changes, the four category folders are moved from
/// the old root to the new one. Each folder is handled on its own; a failure
/// is recorded and the remaining folders are still moved.
use crate::category::{Category, CategoryFolders};
use crate::fs_move::{exists, move_path};
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// What happened to one category folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderOutcome {
    /// The folder now lives at this path under the new root.
    Moved(PathBuf),
    /// There was no folder to move under the old root.
    Skipped,
    /// The move failed for the given reason.
    Failed(String),
}

/// Per-category results of a migration, in taxonomy order.
#[derive(Debug, Clone)]
pub struct MigrationReport {
    /// ISO 8601 timestamp of when the migration ran.
    pub timestamp: String,
    pub old_root: PathBuf,
    pub new_root: PathBuf,
    pub folders: Vec<(Category, FolderOutcome)>,
}

impl MigrationReport {
    /// Returns the outcome for a category.
    pub fn outcome(&self, category: Category) -> Option<&FolderOutcome> {
        self.folders
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, outcome)| outcome)
    }

    /// Returns true if no folder failed.
    pub fn is_complete_success(&self) -> bool {
        !self
            .folders
            .iter()
            .any(|(_, outcome)| matches!(outcome, FolderOutcome::Failed(_)))
    }

    /// Renders the report as JSON.
    pub fn to_json(&self) -> Value {
        json!({
            "timestamp": self.timestamp,
            "old_root": self.old_root.to_string_lossy().to_string(),
            "new_root": self.new_root.to_string_lossy().to_string(),
            "folders": self.folders.iter().map(|(category, outcome)| {
                let (status, detail) = match outcome {
                    FolderOutcome::Moved(path) => ("moved", Some(path.to_string_lossy().to_string())),
                    FolderOutcome::Skipped => ("skipped", None),
                    FolderOutcome::Failed(reason) => ("failed", Some(reason.clone())),
                };
                json!({ "category": category.name(), "status": status, "detail": detail })
            }).collect::<Vec<_>>(),
        })
    }
}

/// Errors that stop a migration before any folder is moved.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// The new root could not be created.
    #[error("failed to create new base directory {}: {source}", .path.display())]
    CreateRoot {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Moves every existing category folder from `old_root` to `new_root`.
///
/// `new_root` is created (with parents) if needed. Category folders missing
/// from `old_root` are skipped without creating anything under `new_root`.
/// A folder whose destination already exists is not merged and fails.
///
/// # Errors
///
/// Returns [`MigrationError::CreateRoot`] if `new_root` cannot be created.
///
/// # Examples
///
/// ```no_run
/// use paratidy::category::CategoryFolders;
/// use paratidy::migrate::migrate;
/// use std::path::Path;
///
/// let report = migrate(Path::new("/old/para"), Path::new("/new/para"), &CategoryFolders::default()).unwrap();
/// assert!(report.is_complete_success());
/// ```
pub fn migrate(
    old_root: &Path,
    new_root: &Path,
    folders: &CategoryFolders,
) -> Result<MigrationReport, MigrationError> {
    fs::create_dir_all(new_root).map_err(|e| MigrationError::CreateRoot {
        path: new_root.to_path_buf(),
        source: e,
    })?;

    info!(
        from = %old_root.display(),
        to = %new_root.display(),
        "migrating PARA structure"
    );

    let outcomes = folders
        .iter()
        .map(|(category, folder)| {
            let outcome = migrate_folder(&old_root.join(folder), &new_root.join(folder));
            match &outcome {
                FolderOutcome::Moved(path) => {
                    info!(category = %category, to = %path.display(), "moved category folder")
                }
                FolderOutcome::Skipped => {
                    info!(category = %category, "category folder absent, skipping")
                }
                FolderOutcome::Failed(reason) => {
                    warn!(category = %category, error = %reason, "could not move category folder")
                }
            }
            (category, outcome)
        })
        .collect();

    Ok(MigrationReport {
        timestamp: chrono::Utc::now().to_rfc3339(),
        old_root: old_root.to_path_buf(),
        new_root: new_root.to_path_buf(),
        folders: outcomes,
    })
}

fn migrate_folder(old_path: &Path, new_path: &Path) -> FolderOutcome {
    if !exists(old_path) {
        return FolderOutcome::Skipped;
    }
    if exists(new_path) {
        return FolderOutcome::Failed(format!("{} already exists", new_path.display()));
    }
    match move_path(old_path, new_path) {
        Ok(()) => FolderOutcome::Moved(new_path.to_path_buf()),
        Err(e) => FolderOutcome::Failed(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_migrate_moves_all_existing_folders() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let old_root = temp_dir.path().join("old");
        let new_root = temp_dir.path().join("deeper/new");
        let folders = CategoryFolders::default();
        for (_, folder) in folders.iter() {
            fs::create_dir_all(old_root.join(folder)).unwrap();
        }
        fs::write(old_root.join("1_Projects/plan.md"), "plan").unwrap();

        let report = migrate(&old_root, &new_root, &folders).unwrap();

        assert!(report.is_complete_success());
        assert_eq!(report.folders.len(), 4);
        assert!(new_root.join("1_Projects/plan.md").is_file());
        assert!(!old_root.join("1_Projects").exists());
    }

    #[test]
    fn test_missing_folder_is_skipped() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let old_root = temp_dir.path().join("old");
        let new_root = temp_dir.path().join("new");
        fs::create_dir_all(old_root.join("1_Projects")).unwrap();

        let report = migrate(&old_root, &new_root, &CategoryFolders::default()).unwrap();

        assert!(report.is_complete_success());
        assert_eq!(report.outcome(Category::Areas), Some(&FolderOutcome::Skipped));
        assert!(!new_root.join("2_Areas").exists());
        assert!(new_root.join("1_Projects").is_dir());
    }

    #[test]
    fn test_existing_destination_fails_only_that_folder() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let old_root = temp_dir.path().join("old");
        let new_root = temp_dir.path().join("new");
        fs::create_dir_all(old_root.join("1_Projects")).unwrap();
        fs::create_dir_all(old_root.join("3_Resources")).unwrap();
        fs::create_dir_all(new_root.join("1_Projects")).unwrap();

        let report = migrate(&old_root, &new_root, &CategoryFolders::default()).unwrap();

        assert!(!report.is_complete_success());
        assert!(matches!(
            report.outcome(Category::Projects),
            Some(FolderOutcome::Failed(_))
        ));
        assert!(matches!(
            report.outcome(Category::Resources),
            Some(FolderOutcome::Moved(_))
        ));
        assert!(old_root.join("1_Projects").is_dir());
    }

    #[test]
    fn test_uncreatable_new_root() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let blocker = temp_dir.path().join("file");
        fs::write(&blocker, "x").unwrap();

        let result = migrate(
            temp_dir.path(),
            &blocker.join("new"),
            &CategoryFolders::default(),
        );
        assert!(matches!(result, Err(MigrationError::CreateRoot { .. })));
    }

    #[test]
    fn test_report_json() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let report = migrate(
            &temp_dir.path().join("old"),
            &temp_dir.path().join("new"),
            &CategoryFolders::default(),
        )
        .unwrap();

        let json = report.to_json();
        assert_eq!(json["folders"][0]["category"], "Projects");
        assert_eq!(json["folders"][0]["status"], "skipped");
    }
}
