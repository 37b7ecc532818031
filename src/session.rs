//! Application state shared by every front end.
//!
//! A [`Session`] holds the opened taxonomy root, the rule list, the placement
//! options and the current index. Anything that changes the tree goes
//! through `&mut Session` and is followed by a full reindex.

use crate::category::{Category, CategoryFolders};
use crate::config::ParaConfig;
use crate::duplicates::{self, DuplicateGroup};
use crate::history::{HistoryEntry, OperationKind, OperationLog};
use crate::index::{self, FileIndex, IndexEntry, IndexError};
use crate::migrate::{MigrationError, MigrationReport, migrate};
use crate::placement::{
    self, FileOutcome, PlacementError, PlacementOptions, PlacementReport, PlacementTarget,
};
use crate::rule::Rule;
use crate::taxonomy::{RootError, TaxonomyRoot, normalize};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The base directory is unset or unusable.
    #[error("not configured: {0}")]
    Unconfigured(RootError),
    #[error(transparent)]
    Placement(#[from] PlacementError),
    #[error(transparent)]
    Index(#[from] IndexError),
}

/// What a configuration reload did.
#[derive(Debug)]
pub struct ReloadOutcome {
    /// Set when the base directory changed and a migration was attempted.
    pub migration: Option<Result<MigrationReport, MigrationError>>,
    /// Why the new root cannot be used, if it cannot.
    pub warning: Option<RootError>,
}

#[derive(Debug)]
pub struct Session {
    configured_root: Option<PathBuf>,
    taxonomy: Result<TaxonomyRoot, RootError>,
    folders: CategoryFolders,
    rules: Vec<Rule>,
    options: PlacementOptions,
    history: Option<OperationLog>,
    index: FileIndex,
}

impl Session {
    /// Opens the configured root, creates missing category folders and builds
    /// the first index.
    ///
    /// This never fails. A session without a usable root still answers
    /// queries and reports the reason through [`Session::warning`].
    pub fn new(config: ParaConfig) -> Self {
        let mut session = Self {
            configured_root: None,
            taxonomy: Err(RootError::Unset),
            folders: CategoryFolders::default(),
            rules: Vec::new(),
            options: PlacementOptions::default(),
            history: None,
            index: FileIndex::default(),
        };
        session.apply(config);
        session
    }

    /// Replaces the configuration.
    ///
    /// When both the previous and the new base directory are set and differ,
    /// the category folders are first migrated using the folder names that
    /// were in effect before the reload.
    pub fn reload(&mut self, config: ParaConfig) -> ReloadOutcome {
        let new_root = configured_root(&config);
        let migration = match (&self.configured_root, &new_root) {
            (Some(old), Some(new)) if old != new => Some(migrate(old, new, &self.folders)),
            _ => None,
        };
        match &migration {
            Some(Ok(report)) => self.record(OperationKind::Migrate, report.to_json()),
            Some(Err(e)) => warn!(error = %e, "migration failed"),
            None => {}
        }

        self.apply(config);
        ReloadOutcome {
            migration,
            warning: self.warning().cloned(),
        }
    }

    fn apply(&mut self, config: ParaConfig) {
        self.configured_root = configured_root(&config);
        self.options = config.placement_options();
        self.history = config.history_file.map(OperationLog::new);
        self.taxonomy = TaxonomyRoot::open(self.configured_root.as_deref(), config.folders.clone());
        self.folders = config.folders;
        self.rules = config.rules;
        self.index = FileIndex::default();

        match &self.taxonomy {
            Ok(taxonomy) => {
                info!(root = %taxonomy.path().display(), rules = self.rules.len(), "session configured");
                taxonomy.ensure_category_folders();
            }
            Err(e) => {
                warn!(error = %e, "session has no usable base directory");
                return;
            }
        }
        if let Err(e) = self.rebuild_index() {
            warn!(error = %e, "initial index build failed");
        }
    }

    /// Returns the taxonomy root, if one is open.
    pub fn root(&self) -> Option<&TaxonomyRoot> {
        self.taxonomy.as_ref().ok()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn options(&self) -> &PlacementOptions {
        &self.options
    }

    /// Returns the index as of the last successful rebuild.
    pub fn index(&self) -> &FileIndex {
        &self.index
    }

    /// Returns why the session has no usable root.
    pub fn warning(&self) -> Option<&RootError> {
        self.taxonomy.as_ref().err()
    }

    /// Returns the history file, if one is configured.
    pub fn history(&self) -> Option<&OperationLog> {
        self.history.as_ref()
    }

    /// Appends a report to the history file. Write failures are logged only.
    fn record(&self, kind: OperationKind, report: serde_json::Value) {
        if let Some(log) = &self.history
            && let Err(e) = log.record(&HistoryEntry::new(kind, report))
        {
            warn!(path = %log.path().display(), error = %e, "could not write history");
        }
    }

    fn taxonomy(&self) -> Result<&TaxonomyRoot, SessionError> {
        self.taxonomy
            .as_ref()
            .map_err(|e| SessionError::Unconfigured(e.clone()))
    }

    /// Creates any missing category folders.
    pub fn ensure_category_folders(&self) -> Result<Vec<(Category, io::Error)>, SessionError> {
        Ok(self.taxonomy()?.ensure_category_folders())
    }

    /// Places `files` into a category folder, then reindexes.
    pub fn place(
        &mut self,
        files: &[PathBuf],
        category: Category,
    ) -> Result<PlacementReport, SessionError> {
        self.place_with_progress(files, &PlacementTarget::Category(category), |_| {})
    }

    /// Places `files` into a directory inside a category folder, then
    /// reindexes.
    pub fn place_into(
        &mut self,
        files: &[PathBuf],
        target_dir: &Path,
    ) -> Result<PlacementReport, SessionError> {
        self.place_with_progress(
            files,
            &PlacementTarget::Directory(target_dir.to_path_buf()),
            |_| {},
        )
    }

    /// Places `files` at `target`, reporting each item to `on_item`, then
    /// reindexes.
    ///
    /// A failed reindex is logged and leaves the previous index in place; the
    /// placement report is returned either way.
    pub fn place_with_progress<F>(
        &mut self,
        files: &[PathBuf],
        target: &PlacementTarget,
        on_item: F,
    ) -> Result<PlacementReport, SessionError>
    where
        F: FnMut(&FileOutcome),
    {
        let report = placement::place_with_progress(
            files,
            target,
            self.taxonomy()?,
            &self.rules,
            &self.options,
            on_item,
        )?;
        self.record(OperationKind::Place, report.to_json());

        if let Err(e) = self.rebuild_index() {
            warn!(error = %e, "reindex after placement failed");
        }
        Ok(report)
    }

    /// Computes where `files` would go without moving anything.
    pub fn plan(
        &self,
        files: &[PathBuf],
        target: &PlacementTarget,
    ) -> Result<PlacementReport, SessionError> {
        Ok(placement::plan(
            files,
            target,
            self.taxonomy()?,
            &self.rules,
            &self.options,
        )?)
    }

    /// Rebuilds the index from disk.
    ///
    /// The new index replaces the current one only once the walk is
    /// complete. On error the previous index is kept.
    pub fn rebuild_index(&mut self) -> Result<&FileIndex, SessionError> {
        let fresh = index::rebuild_index(self.taxonomy()?.path())?;
        self.index = fresh;
        Ok(&self.index)
    }

    /// Lists groups of files with identical contents below the root.
    pub fn find_duplicates(&self) -> Result<Vec<DuplicateGroup>, SessionError> {
        Ok(duplicates::find_duplicates(self.taxonomy()?.path())?)
    }

    /// Searches the current index. See [`FileIndex::search`].
    pub fn search(&self, term: &str) -> Option<Vec<&IndexEntry>> {
        self.index.search(term)
    }

    /// Returns the category whose folder contains `path`.
    pub fn category_for_path(&self, path: &Path) -> Option<Category> {
        self.root()?.category_for_path(path)
    }
}

fn configured_root(config: &ParaConfig) -> Option<PathBuf> {
    config
        .base_directory
        .as_deref()
        .filter(|path| !path.as_os_str().is_empty())
        .map(normalize)
}
