/// Rule-driven placement of files into the taxonomy.
///
/// This module moves a batch of dropped paths into one category folder (or a
/// directory inside one), applying the first matching rule to each file. A
/// failing file is recorded in the report and never stops the batch.
use crate::category::Category;
use crate::classifier::classify_position;
use crate::duplicates::ContentIndex;
use crate::fs_move::{exists, move_path, unique_path};
use crate::rule::{Action, Rule};
use crate::taxonomy::{TaxonomyRoot, normalize};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::{BTreeSet, HashSet};
use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// What to do when the computed destination already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Leave both files alone and report the item as failed.
    #[default]
    Fail,
    /// Move under the first free `<stem>_conflict_<n><ext>` name.
    Rename,
}

/// What to do with a file whose contents already exist in the destination.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Do not compare contents.
    #[default]
    Ignore,
    /// Leave the source where it is.
    Skip,
    /// Delete the source.
    Delete,
    /// Move it anyway; a name clash becomes `<stem>_duplicate_<n><ext>`.
    Keep,
}

/// How dropped directories are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FolderMode {
    /// Place every file inside the directory on its own, flat, then remove
    /// the emptied directory.
    #[default]
    Merge,
    /// Move the directory whole. Rules do not apply to it.
    MoveAsIs,
}

/// Knobs that change how a batch is placed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlacementOptions {
    pub on_conflict: ConflictPolicy,
    pub on_duplicate: DuplicatePolicy,
    pub folder_mode: FolderMode,
    /// Remove source directories left empty by the batch.
    pub cleanup_empty_sources: bool,
}

/// Where a batch should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlacementTarget {
    /// The top-level folder of a category.
    Category(Category),
    /// A directory somewhere inside a category folder. Its category's rules
    /// apply relative to this directory.
    Directory(PathBuf),
}

/// Errors that reject a whole batch before any file is touched.
#[derive(Debug, thiserror::Error)]
pub enum PlacementError {
    /// The taxonomy root is no longer a directory.
    #[error("base directory {} is not available", .0.display())]
    RootMissing(PathBuf),
    /// The destination category folder does not exist.
    #[error("category folder for {category} is missing: {}", .path.display())]
    CategoryFolderMissing { category: Category, path: PathBuf },
    /// The target directory is not inside any category folder.
    #[error("{} is not inside a category folder", .0.display())]
    OutsideTaxonomy(PathBuf),
    /// The target directory does not exist.
    #[error("target directory {} does not exist", .0.display())]
    TargetMissing(PathBuf),
}

/// Errors that fail a single file of a batch.
#[derive(Debug, thiserror::Error)]
pub enum PlaceError {
    /// The source vanished before it could be moved.
    #[error("source {} does not exist", .0.display())]
    SourceMissing(PathBuf),
    /// The source path has no final component (e.g. `/` or `..`).
    #[error("source {} has no file name", .0.display())]
    NoFileName(PathBuf),
    /// Part of a dropped directory could not be read.
    #[error("cannot read {}: {reason}", .path.display())]
    Unreadable { path: PathBuf, reason: String },
    /// A subfolder rule points outside the destination directory.
    #[error("subfolder '{0}' must be a relative path without '..'")]
    InvalidSubfolder(String),
    /// A prefix rule produces something other than a plain file name.
    #[error("prefix '{0}' does not produce a plain file name")]
    InvalidPrefix(String),
    /// The rule's subfolder could not be created.
    #[error("failed to create directory {}: {source}", .path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Something already exists at the destination.
    #[error("{} already exists", .0.display())]
    Collision(PathBuf),
    /// The move itself failed.
    #[error("failed to move to {}: {source}", .destination.display())]
    MoveFailed {
        destination: PathBuf,
        source: std::io::Error,
    },
    /// A duplicate source could not be deleted.
    #[error("failed to delete duplicate: {0}")]
    RemoveFailed(std::io::Error),
}

/// What happened to a source that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placed {
    /// Moved to this path (or would be, in a dry run).
    Moved(PathBuf),
    /// The same contents already exist at `existing`; the source stays.
    DuplicateSkipped { existing: PathBuf },
    /// The same contents already exist at `existing`; the source was deleted.
    DuplicateRemoved { existing: PathBuf },
}

/// The outcome for one source path.
#[derive(Debug)]
pub struct FileOutcome {
    /// The source path, as supplied or as found inside a dropped directory.
    pub source: PathBuf,
    /// Position of the rule that was applied, if any.
    pub rule: Option<usize>,
    pub result: Result<Placed, PlaceError>,
}

impl FileOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Returns where the source was moved to, if it was.
    pub fn destination(&self) -> Option<&Path> {
        match &self.result {
            Ok(Placed::Moved(destination)) => Some(destination),
            _ => None,
        }
    }

    fn to_json(&self) -> Value {
        let source = self.source.to_string_lossy().to_string();
        match &self.result {
            Ok(Placed::Moved(destination)) => json!({
                "source": source,
                "rule": self.rule,
                "destination": destination.to_string_lossy().to_string(),
            }),
            Ok(Placed::DuplicateSkipped { existing }) => json!({
                "source": source,
                "rule": self.rule,
                "duplicate_of": existing.to_string_lossy().to_string(),
                "source_removed": false,
            }),
            Ok(Placed::DuplicateRemoved { existing }) => json!({
                "source": source,
                "rule": self.rule,
                "duplicate_of": existing.to_string_lossy().to_string(),
                "source_removed": true,
            }),
            Err(e) => json!({
                "source": source,
                "rule": self.rule,
                "error": e.to_string(),
            }),
        }
    }
}

/// Per-file results of a placement batch, in input order.
#[derive(Debug)]
pub struct PlacementReport {
    /// ISO 8601 timestamp of when the batch started.
    pub timestamp: String,
    pub category: Category,
    /// The directory files were placed under before rules applied.
    pub destination_root: PathBuf,
    /// True when nothing was moved and the destinations are only planned.
    pub dry_run: bool,
    pub outcomes: Vec<FileOutcome>,
    /// Source directories removed after the batch.
    pub removed_dirs: Vec<PathBuf>,
}

impl PlacementReport {
    /// Returns `(source, destination)` for every moved file.
    pub fn moved(&self) -> impl Iterator<Item = (&Path, &Path)> {
        self.outcomes
            .iter()
            .filter_map(|outcome| Some((outcome.source.as_path(), outcome.destination()?)))
    }

    /// Returns `(source, existing copy)` for every duplicate that was not moved.
    pub fn duplicates(&self) -> impl Iterator<Item = (&Path, &Path)> {
        self.outcomes.iter().filter_map(|outcome| match &outcome.result {
            Ok(Placed::DuplicateSkipped { existing } | Placed::DuplicateRemoved { existing }) => {
                Some((outcome.source.as_path(), existing.as_path()))
            }
            _ => None,
        })
    }

    /// Returns `(source, error)` for every failed file.
    pub fn failed(&self) -> impl Iterator<Item = (&Path, &PlaceError)> {
        self.outcomes.iter().filter_map(|outcome| match &outcome.result {
            Ok(_) => None,
            Err(e) => Some((outcome.source.as_path(), e)),
        })
    }

    /// Returns true if no file failed.
    pub fn is_complete_success(&self) -> bool {
        self.outcomes.iter().all(FileOutcome::is_success)
    }

    /// Renders the report as JSON.
    pub fn to_json(&self) -> Value {
        json!({
            "timestamp": self.timestamp,
            "category": self.category.name(),
            "destination_root": self.destination_root.to_string_lossy().to_string(),
            "dry_run": self.dry_run,
            "outcomes": self.outcomes.iter().map(FileOutcome::to_json).collect::<Vec<_>>(),
            "removed_dirs": self.removed_dirs.iter()
                .map(|dir| dir.to_string_lossy().to_string())
                .collect::<Vec<_>>(),
        })
    }
}

/// Places `files` into a category folder, applying `rules`.
///
/// # Errors
///
/// Returns a [`PlacementError`] without touching any file when the root or the
/// category folder is missing. Per-file failures are recorded in the report.
///
/// # Examples
///
/// ```no_run
/// use paratidy::category::{Category, CategoryFolders};
/// use paratidy::placement::{PlacementOptions, place};
/// use paratidy::taxonomy::TaxonomyRoot;
/// use std::path::{Path, PathBuf};
///
/// let taxonomy = TaxonomyRoot::open(Some(Path::new("/para")), CategoryFolders::default()).unwrap();
/// let files = vec![PathBuf::from("/home/me/Downloads/photo.JPG")];
/// let report = place(&files, Category::Projects, &taxonomy, &[], &PlacementOptions::default()).unwrap();
/// for (source, destination) in report.moved() {
///     println!("{} -> {}", source.display(), destination.display());
/// }
/// ```
pub fn place(
    files: &[PathBuf],
    category: Category,
    taxonomy: &TaxonomyRoot,
    rules: &[Rule],
    options: &PlacementOptions,
) -> Result<PlacementReport, PlacementError> {
    place_with_progress(
        files,
        &PlacementTarget::Category(category),
        taxonomy,
        rules,
        options,
        |_| {},
    )
}

/// Places `files` at `target`, calling `on_item` after each file.
///
/// Items are processed in the order given and `on_item` sees them in that
/// order. With [`FolderMode::Merge`] the files of a dropped directory are
/// processed in place of the directory, sorted by name.
pub fn place_with_progress<F>(
    files: &[PathBuf],
    target: &PlacementTarget,
    taxonomy: &TaxonomyRoot,
    rules: &[Rule],
    options: &PlacementOptions,
    mut on_item: F,
) -> Result<PlacementReport, PlacementError>
where
    F: FnMut(&FileOutcome),
{
    let (category, destination_root) = resolve_target(target, taxonomy)?;
    let (sources, dropped_dirs) = expand_sources(files, options.folder_mode);
    let mut batch = Batch::new(category, &destination_root, rules, options);

    info!(
        category = %category,
        destination = %destination_root.display(),
        items = sources.len(),
        "placing batch"
    );

    let mut report = PlacementReport {
        timestamp: chrono::Utc::now().to_rfc3339(),
        category,
        destination_root: destination_root.clone(),
        dry_run: false,
        outcomes: Vec::with_capacity(sources.len()),
        removed_dirs: Vec::new(),
    };

    for source in sources {
        let outcome = batch.place_one(source);
        match &outcome.result {
            Ok(placed) => debug!(src = %outcome.source.display(), result = ?placed, "placed"),
            Err(e) => warn!(src = %outcome.source.display(), error = %e, "could not place file"),
        }
        on_item(&outcome);
        report.outcomes.push(outcome);
    }

    report.removed_dirs = remove_merged_dirs(&dropped_dirs, taxonomy);
    if options.cleanup_empty_sources {
        let removed = remove_empty_sources(&report, taxonomy);
        report.removed_dirs.extend(removed);
    }

    info!(
        placed = report.moved().count(),
        duplicates = report.duplicates().count(),
        failed = report.failed().count(),
        "batch complete"
    );
    Ok(report)
}

/// Computes where each file would go without touching the filesystem.
///
/// Collisions are checked against the current state of the destination and
/// against the destinations planned earlier in the same batch, so the plan
/// matches what [`place_with_progress`] would do.
pub fn plan(
    files: &[PathBuf],
    target: &PlacementTarget,
    taxonomy: &TaxonomyRoot,
    rules: &[Rule],
    options: &PlacementOptions,
) -> Result<PlacementReport, PlacementError> {
    let (category, destination_root) = resolve_target(target, taxonomy)?;
    let (sources, _) = expand_sources(files, options.folder_mode);
    let mut batch = Batch::new(category, &destination_root, rules, options);

    let mut outcomes = Vec::with_capacity(sources.len());
    for source in sources {
        let outcome = match source {
            Ok(file) => match batch.resolve(&file) {
                Ok(resolved) => {
                    if let Step::Move { destination, .. } = &resolved.step {
                        batch.planned.insert(destination.clone());
                    }
                    FileOutcome {
                        source: file,
                        rule: resolved.rule,
                        result: Ok(resolved.step.planned()),
                    }
                }
                Err((rule, e)) => FileOutcome {
                    source: file,
                    rule,
                    result: Err(e),
                },
            },
            Err(failure) => failure,
        };
        outcomes.push(outcome);
    }

    Ok(PlacementReport {
        timestamp: chrono::Utc::now().to_rfc3339(),
        category,
        destination_root,
        dry_run: true,
        outcomes,
        removed_dirs: Vec::new(),
    })
}

/// Checks the batch preconditions and returns the category and base directory.
fn resolve_target(
    target: &PlacementTarget,
    taxonomy: &TaxonomyRoot,
) -> Result<(Category, PathBuf), PlacementError> {
    if !taxonomy.path().is_dir() {
        return Err(PlacementError::RootMissing(taxonomy.path().to_path_buf()));
    }

    match target {
        PlacementTarget::Category(category) => {
            let dir = taxonomy.category_dir(*category);
            if !dir.is_dir() {
                return Err(PlacementError::CategoryFolderMissing {
                    category: *category,
                    path: dir,
                });
            }
            Ok((*category, dir))
        }
        PlacementTarget::Directory(dir) => {
            let dir = normalize(dir);
            let category = taxonomy
                .category_for_path(&dir)
                .ok_or_else(|| PlacementError::OutsideTaxonomy(dir.clone()))?;
            if !dir.is_dir() {
                return Err(PlacementError::TargetMissing(dir));
            }
            Ok((category, dir))
        }
    }
}

/// One item of a batch after dropped directories were expanded. Parts of a
/// directory that could not be read arrive as ready-made failures.
type Source = Result<PathBuf, FileOutcome>;

/// Replaces each dropped directory by the files below it when merging.
///
/// Also returns the expanded directories, so they can be removed once empty.
fn expand_sources(files: &[PathBuf], mode: FolderMode) -> (Vec<Source>, Vec<PathBuf>) {
    let mut sources = Vec::with_capacity(files.len());
    let mut dropped_dirs = Vec::new();

    for file in files {
        let is_dir = fs::symlink_metadata(file)
            .map(|meta| meta.is_dir())
            .unwrap_or(false);
        if mode == FolderMode::MoveAsIs || !is_dir {
            sources.push(Ok(file.clone()));
            continue;
        }

        let dir = normalize(file);
        for entry in WalkDir::new(&dir)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
        {
            match entry {
                Ok(entry) if entry.file_type().is_dir() => {}
                Ok(entry) => sources.push(Ok(entry.into_path())),
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.clone());
                    sources.push(Err(FileOutcome {
                        source: path.clone(),
                        rule: None,
                        result: Err(PlaceError::Unreadable {
                            path,
                            reason: e.to_string(),
                        }),
                    }));
                }
            }
        }
        debug!(dir = %dir.display(), "expanded dropped directory");
        dropped_dirs.push(dir);
    }

    (sources, dropped_dirs)
}

struct Batch<'a> {
    category: Category,
    destination_root: &'a Path,
    rules: &'a [Rule],
    on_conflict: ConflictPolicy,
    on_duplicate: DuplicatePolicy,
    /// Built on first use, only when duplicates are looked for.
    content: Option<ContentIndex>,
    /// Destinations already claimed by earlier items of this batch.
    planned: HashSet<PathBuf>,
}

/// What the batch will do with one resolved source.
enum Step {
    Move {
        directory: PathBuf,
        destination: PathBuf,
    },
    SkipDuplicate {
        existing: PathBuf,
    },
    RemoveDuplicate {
        existing: PathBuf,
    },
}

impl Step {
    fn planned(self) -> Placed {
        match self {
            Step::Move { destination, .. } => Placed::Moved(destination),
            Step::SkipDuplicate { existing } => Placed::DuplicateSkipped { existing },
            Step::RemoveDuplicate { existing } => Placed::DuplicateRemoved { existing },
        }
    }
}

struct Resolved {
    source: PathBuf,
    rule: Option<usize>,
    step: Step,
}

impl<'a> Batch<'a> {
    fn new(
        category: Category,
        destination_root: &'a Path,
        rules: &'a [Rule],
        options: &PlacementOptions,
    ) -> Self {
        Self {
            category,
            destination_root,
            rules,
            on_conflict: options.on_conflict,
            on_duplicate: options.on_duplicate,
            content: None,
            planned: HashSet::new(),
        }
    }

    fn is_taken(&self, path: &Path) -> bool {
        exists(path) || self.planned.contains(path)
    }

    /// Looks for a copy of `source` already in the destination tree.
    fn find_duplicate(&mut self, source: &Path) -> Option<PathBuf> {
        let root = self.destination_root;
        let content = self.content.get_or_insert_with(|| ContentIndex::scan(root));
        match content.find(source) {
            Ok(found) => found,
            Err(e) => {
                warn!(src = %source.display(), error = %e, "could not hash source, treating as new");
                None
            }
        }
    }

    /// Works out what to do with one source path.
    fn resolve(&mut self, file: &Path) -> Result<Resolved, (Option<usize>, PlaceError)> {
        let source = normalize(file);
        let metadata = fs::symlink_metadata(&source)
            .map_err(|_| (None, PlaceError::SourceMissing(source.clone())))?;
        let file_name = source
            .file_name()
            .map(|name| name.to_os_string())
            .ok_or_else(|| (None, PlaceError::NoFileName(source.clone())))?;

        let mut directory = self.destination_root.to_path_buf();
        let mut name = file_name.clone();
        let mut rule = None;

        // Rules only look at files; directories move as they are.
        if !metadata.is_dir() {
            let display_name = file_name.to_string_lossy();
            if let Some((position, matched)) =
                classify_position(self.rules, self.category, &display_name)
            {
                debug!(rule = position, file = %display_name, action = ?matched.action, "rule matched");
                rule = Some(position);
                match &matched.action {
                    Action::Subfolder(subfolder) => {
                        let subfolder = checked_subfolder(subfolder).map_err(|e| (rule, e))?;
                        directory.push(subfolder);
                    }
                    Action::Prefix(prefix) => {
                        let mut prefixed = OsString::from(prefix);
                        prefixed.push(&file_name);
                        if !is_plain_name(&prefixed) {
                            return Err((rule, PlaceError::InvalidPrefix(prefix.clone())));
                        }
                        name = prefixed;
                    }
                }
            }
        }

        let mut keep_duplicate = false;
        if metadata.is_file()
            && self.on_duplicate != DuplicatePolicy::Ignore
            && let Some(existing) = self.find_duplicate(&source)
        {
            info!(src = %source.display(), existing = %existing.display(), "duplicate content found");
            let step = match self.on_duplicate {
                DuplicatePolicy::Skip => Some(Step::SkipDuplicate { existing }),
                DuplicatePolicy::Delete => Some(Step::RemoveDuplicate { existing }),
                DuplicatePolicy::Keep | DuplicatePolicy::Ignore => None,
            };
            if let Some(step) = step {
                return Ok(Resolved { source, rule, step });
            }
            keep_duplicate = true;
        }

        let mut destination = directory.join(&name);
        if destination != source && self.is_taken(&destination) {
            let label = match (keep_duplicate, self.on_conflict) {
                (true, _) => "duplicate",
                (false, ConflictPolicy::Rename) => "conflict",
                (false, ConflictPolicy::Fail) => {
                    return Err((rule, PlaceError::Collision(destination)));
                }
            };
            let renamed = unique_path(&destination, label, |path| self.is_taken(path));
            warn!(
                wanted = %destination.display(),
                renamed = %renamed.display(),
                "name conflict, renaming"
            );
            destination = renamed;
        }

        Ok(Resolved {
            source,
            rule,
            step: Step::Move {
                directory,
                destination,
            },
        })
    }

    /// Resolves and carries out one item.
    fn place_one(&mut self, source: Source) -> FileOutcome {
        let file = match source {
            Ok(file) => file,
            Err(failure) => return failure,
        };
        let (rule, result) = match self.resolve(&file) {
            Ok(resolved) => (resolved.rule, Self::execute(resolved)),
            Err((rule, e)) => (rule, Err(e)),
        };
        if let Ok(Placed::Moved(destination)) = &result {
            self.planned.insert(destination.clone());
        }
        FileOutcome {
            source: file,
            rule,
            result,
        }
    }

    fn execute(resolved: Resolved) -> Result<Placed, PlaceError> {
        let (directory, destination) = match resolved.step {
            Step::Move {
                directory,
                destination,
            } => (directory, destination),
            Step::SkipDuplicate { existing } => return Ok(Placed::DuplicateSkipped { existing }),
            Step::RemoveDuplicate { existing } => {
                fs::remove_file(&resolved.source).map_err(PlaceError::RemoveFailed)?;
                return Ok(Placed::DuplicateRemoved { existing });
            }
        };

        if destination == resolved.source {
            return Ok(Placed::Moved(destination));
        }

        if !directory.is_dir() {
            fs::create_dir_all(&directory).map_err(|e| PlaceError::DirectoryCreationFailed {
                path: directory.clone(),
                source: e,
            })?;
        }

        move_path(&resolved.source, &destination).map_err(|e| PlaceError::MoveFailed {
            destination: destination.clone(),
            source: e,
        })?;

        Ok(Placed::Moved(destination))
    }
}

/// Accepts only plain relative subfolder paths such as `images` or `img/raw`.
fn checked_subfolder(subfolder: &str) -> Result<&Path, PlaceError> {
    let path = Path::new(subfolder);
    if path
        .components()
        .all(|component| matches!(component, Component::Normal(_)))
    {
        Ok(path)
    } else {
        Err(PlaceError::InvalidSubfolder(subfolder.to_string()))
    }
}

/// True if `name` is a single ordinary path component.
fn is_plain_name(name: &OsStr) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(single)), None) if single == name
    )
}

/// Removes the dropped directories emptied by a merge, deepest first.
fn remove_merged_dirs(dropped_dirs: &[PathBuf], taxonomy: &TaxonomyRoot) -> Vec<PathBuf> {
    let mut removed = Vec::new();
    for dropped in dropped_dirs {
        let dirs = WalkDir::new(dropped)
            .follow_links(false)
            .contents_first(true)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_dir());
        for entry in dirs {
            let dir = entry.path();
            if taxonomy.is_protected(dir) || !is_empty_dir(dir) {
                continue;
            }
            match fs::remove_dir(dir) {
                Ok(()) => {
                    debug!(path = %dir.display(), "removed merged directory");
                    removed.push(dir.to_path_buf());
                }
                Err(e) => warn!(path = %dir.display(), error = %e, "could not remove merged directory"),
            }
        }
    }
    removed
}

fn is_empty_dir(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}

/// Removes source directories emptied by the batch, deepest first.
fn remove_empty_sources(report: &PlacementReport, taxonomy: &TaxonomyRoot) -> Vec<PathBuf> {
    let parents: BTreeSet<PathBuf> = report
        .outcomes
        .iter()
        .filter(|outcome| {
            matches!(
                outcome.result,
                Ok(Placed::Moved(_)) | Ok(Placed::DuplicateRemoved { .. })
            )
        })
        .filter_map(|outcome| normalize(&outcome.source).parent().map(Path::to_path_buf))
        .collect();

    let mut parents: Vec<_> = parents.into_iter().collect();
    parents.sort_by_key(|dir| std::cmp::Reverse(dir.components().count()));

    let mut removed = Vec::new();
    for dir in parents {
        if taxonomy.is_protected(&dir) || !is_empty_dir(&dir) {
            continue;
        }
        match fs::remove_dir(&dir) {
            Ok(()) => {
                info!(path = %dir.display(), "removed empty source directory");
                removed.push(dir);
            }
            Err(e) => warn!(path = %dir.display(), error = %e, "could not remove source directory"),
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::CategoryFolders;
    use crate::rule::Condition;
    use tempfile::TempDir;

    struct Setup {
        _temp_dir: TempDir,
        taxonomy: TaxonomyRoot,
        inbox: PathBuf,
    }

    fn setup() -> Setup {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path().join("para");
        let inbox = temp_dir.path().join("inbox");
        fs::create_dir_all(&root).expect("Failed to create root");
        fs::create_dir_all(&inbox).expect("Failed to create inbox");
        let taxonomy = TaxonomyRoot::open(Some(&root), CategoryFolders::default())
            .expect("Failed to open taxonomy root");
        taxonomy.ensure_category_folders();
        Setup {
            _temp_dir: temp_dir,
            taxonomy,
            inbox,
        }
    }

    fn write(path: &Path, content: &str) -> PathBuf {
        fs::write(path, content).expect("Failed to write test file");
        path.to_path_buf()
    }

    #[test]
    fn test_place_without_rules_keeps_name() {
        let s = setup();
        let file = write(&s.inbox.join("notes.txt"), "notes");

        let report = place(
            &[file.clone()],
            Category::Areas,
            &s.taxonomy,
            &[],
            &PlacementOptions::default(),
        )
        .expect("Batch should run");

        let expected = s.taxonomy.category_dir(Category::Areas).join("notes.txt");
        assert!(report.is_complete_success());
        assert_eq!(report.outcomes[0].destination(), Some(expected.as_path()));
        assert_eq!(report.outcomes[0].rule, None);
        assert!(!file.exists());
        assert!(expected.is_file());
    }

    #[test]
    fn test_subfolder_rule_creates_nested_directories() {
        let s = setup();
        let file = write(&s.inbox.join("scan.png"), "png");
        let rules = vec![Rule::new(
            Category::Resources,
            Condition::Extension("png".to_string()),
            Action::Subfolder("images/scans".to_string()),
        )];

        let report = place(
            &[file],
            Category::Resources,
            &s.taxonomy,
            &rules,
            &PlacementOptions::default(),
        )
        .unwrap();

        let expected = s
            .taxonomy
            .category_dir(Category::Resources)
            .join("images/scans/scan.png");
        assert_eq!(report.outcomes[0].rule, Some(0));
        assert!(expected.is_file());
    }

    #[test]
    fn test_prefix_rule_renames_without_separator() {
        let s = setup();
        let file = write(&s.inbox.join("march.pdf"), "pdf");
        let rules = vec![Rule::new(
            Category::Archives,
            Condition::Keyword("MARCH".to_string()),
            Action::Prefix("2023_".to_string()),
        )];

        place(
            &[file],
            Category::Archives,
            &s.taxonomy,
            &rules,
            &PlacementOptions::default(),
        )
        .unwrap();

        assert!(
            s.taxonomy
                .category_dir(Category::Archives)
                .join("2023_march.pdf")
                .is_file()
        );
    }

    #[test]
    fn test_missing_category_folder_rejects_batch() {
        let s = setup();
        fs::remove_dir(s.taxonomy.category_dir(Category::Projects)).unwrap();
        let file = write(&s.inbox.join("a.txt"), "a");

        let result = place(
            &[file.clone()],
            Category::Projects,
            &s.taxonomy,
            &[],
            &PlacementOptions::default(),
        );

        assert!(matches!(
            result,
            Err(PlacementError::CategoryFolderMissing {
                category: Category::Projects,
                ..
            })
        ));
        assert!(file.exists());
    }

    #[test]
    fn test_missing_source_does_not_stop_batch() {
        let s = setup();
        let first = write(&s.inbox.join("one.txt"), "1");
        let missing = s.inbox.join("two.txt");
        let third = write(&s.inbox.join("three.txt"), "3");

        let report = place(
            &[first, missing, third],
            Category::Projects,
            &s.taxonomy,
            &[],
            &PlacementOptions::default(),
        )
        .unwrap();

        assert!(report.outcomes[0].is_success());
        assert!(matches!(
            report.outcomes[1].result,
            Err(PlaceError::SourceMissing(_))
        ));
        assert!(report.outcomes[2].is_success());
        assert!(!report.is_complete_success());
    }

    #[test]
    fn test_collision_fails_item_by_default() {
        let s = setup();
        let existing = s.taxonomy.category_dir(Category::Projects).join("a.txt");
        write(&existing, "old");
        let file = write(&s.inbox.join("a.txt"), "new");

        let report = place(
            &[file.clone()],
            Category::Projects,
            &s.taxonomy,
            &[],
            &PlacementOptions::default(),
        )
        .unwrap();

        assert!(matches!(
            report.outcomes[0].result,
            Err(PlaceError::Collision(_))
        ));
        assert!(file.exists());
        assert_eq!(fs::read_to_string(&existing).unwrap(), "old");
    }

    #[test]
    fn test_collision_rename_policy() {
        let s = setup();
        let existing = s.taxonomy.category_dir(Category::Projects).join("a.txt");
        write(&existing, "old");
        let file = write(&s.inbox.join("a.txt"), "new");

        let options = PlacementOptions {
            on_conflict: ConflictPolicy::Rename,
            ..Default::default()
        };
        let report = place(&[file], Category::Projects, &s.taxonomy, &[], &options).unwrap();

        let renamed = s
            .taxonomy
            .category_dir(Category::Projects)
            .join("a_conflict_1.txt");
        assert_eq!(report.outcomes[0].destination(), Some(renamed.as_path()));
        assert_eq!(fs::read_to_string(&renamed).unwrap(), "new");
        assert_eq!(fs::read_to_string(&existing).unwrap(), "old");
    }

    #[test]
    fn test_invalid_subfolder_fails_item() {
        let s = setup();
        let file = write(&s.inbox.join("evil.txt"), "x");
        let rules = vec![Rule::new(
            Category::Projects,
            Condition::Keyword(String::new()),
            Action::Subfolder("../escape".to_string()),
        )];

        let report = place(
            &[file.clone()],
            Category::Projects,
            &s.taxonomy,
            &rules,
            &PlacementOptions::default(),
        )
        .unwrap();

        assert!(matches!(
            report.outcomes[0].result,
            Err(PlaceError::InvalidSubfolder(_))
        ));
        assert_eq!(report.outcomes[0].rule, Some(0));
        assert!(file.exists());
    }

    #[test]
    fn test_prefix_with_path_separators_fails_item() {
        let s = setup();
        let file = write(&s.inbox.join("a.txt"), "x");
        for prefix in ["../../", "sub/", "/"] {
            let rules = vec![Rule::new(
                Category::Projects,
                Condition::Keyword(String::new()),
                Action::Prefix(prefix.to_string()),
            )];

            let report = place(
                &[file.clone()],
                Category::Projects,
                &s.taxonomy,
                &rules,
                &PlacementOptions::default(),
            )
            .unwrap();

            assert!(
                matches!(report.outcomes[0].result, Err(PlaceError::InvalidPrefix(_))),
                "prefix {:?} should be rejected",
                prefix
            );
            assert!(file.exists());
        }
    }

    #[test]
    fn test_directories_move_as_is_when_asked() {
        let s = setup();
        let folder = s.inbox.join("photos.png");
        fs::create_dir_all(&folder).unwrap();
        write(&folder.join("inside.png"), "x");
        let rules = vec![Rule::new(
            Category::Projects,
            Condition::Extension("png".to_string()),
            Action::Subfolder("images".to_string()),
        )];
        let options = PlacementOptions {
            folder_mode: FolderMode::MoveAsIs,
            ..Default::default()
        };

        let report = place(&[folder], Category::Projects, &s.taxonomy, &rules, &options).unwrap();

        let expected = s.taxonomy.category_dir(Category::Projects).join("photos.png");
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].rule, None);
        assert!(expected.join("inside.png").is_file());
    }

    #[test]
    fn test_dropped_directory_is_merged_file_by_file() {
        let s = setup();
        let trip = s.inbox.join("trip");
        fs::create_dir_all(trip.join("day2")).unwrap();
        write(&trip.join("photo.jpg"), "jpg");
        write(&trip.join("day2/notes.txt"), "notes");
        let rules = vec![Rule::new(
            Category::Projects,
            Condition::Extension("jpg".to_string()),
            Action::Subfolder("images".to_string()),
        )];

        let report = place(
            &[trip.clone()],
            Category::Projects,
            &s.taxonomy,
            &rules,
            &PlacementOptions::default(),
        )
        .unwrap();

        let projects = s.taxonomy.category_dir(Category::Projects);
        assert!(report.is_complete_success());
        assert_eq!(report.outcomes.len(), 2);
        assert!(projects.join("images/photo.jpg").is_file());
        assert!(projects.join("notes.txt").is_file());
        assert!(!projects.join("trip").exists());
        assert!(!trip.exists());
        assert!(report.removed_dirs.contains(&normalize(&trip)));
        assert!(s.inbox.exists());
    }

    #[test]
    fn test_merge_keeps_directory_with_leftovers() {
        let s = setup();
        let trip = s.inbox.join("trip");
        fs::create_dir_all(&trip).unwrap();
        write(&trip.join("a.txt"), "a");
        let existing = s.taxonomy.category_dir(Category::Projects).join("a.txt");
        write(&existing, "already here");

        let report = place(
            &[trip.clone()],
            Category::Projects,
            &s.taxonomy,
            &[],
            &PlacementOptions::default(),
        )
        .unwrap();

        assert!(matches!(
            report.outcomes[0].result,
            Err(PlaceError::Collision(_))
        ));
        assert!(trip.join("a.txt").is_file());
        assert!(report.removed_dirs.is_empty());
    }

    #[test]
    fn test_place_into_subdirectory_uses_its_category() {
        let s = setup();
        let target = s.taxonomy.category_dir(Category::Areas).join("health");
        fs::create_dir_all(&target).unwrap();
        let file = write(&s.inbox.join("bloodwork.pdf"), "x");
        let rules = vec![Rule::new(
            Category::Areas,
            Condition::Extension("pdf".to_string()),
            Action::Subfolder("docs".to_string()),
        )];

        let report = place_with_progress(
            &[file],
            &PlacementTarget::Directory(target.clone()),
            &s.taxonomy,
            &rules,
            &PlacementOptions::default(),
            |_| {},
        )
        .unwrap();

        assert_eq!(report.category, Category::Areas);
        assert!(target.join("docs/bloodwork.pdf").is_file());
    }

    #[test]
    fn test_target_outside_taxonomy_is_rejected() {
        let s = setup();
        let result = plan(
            &[],
            &PlacementTarget::Directory(s.inbox.clone()),
            &s.taxonomy,
            &[],
            &PlacementOptions::default(),
        );
        assert!(matches!(result, Err(PlacementError::OutsideTaxonomy(_))));
    }

    #[test]
    fn test_plan_touches_nothing() {
        let s = setup();
        let file = write(&s.inbox.join("photo.jpg"), "x");
        let rules = vec![Rule::new(
            Category::Projects,
            Condition::Extension("jpg".to_string()),
            Action::Subfolder("images".to_string()),
        )];

        let report = plan(
            &[file.clone()],
            &PlacementTarget::Category(Category::Projects),
            &s.taxonomy,
            &rules,
            &PlacementOptions::default(),
        )
        .unwrap();

        let planned = s
            .taxonomy
            .category_dir(Category::Projects)
            .join("images/photo.jpg");
        assert!(report.dry_run);
        assert_eq!(report.outcomes[0].destination(), Some(planned.as_path()));
        assert!(file.exists());
        assert!(!planned.parent().unwrap().exists());
    }

    #[test]
    fn test_cleanup_removes_emptied_source_dirs() {
        let s = setup();
        let nested = s.inbox.join("batch");
        fs::create_dir_all(&nested).unwrap();
        let file = write(&nested.join("a.txt"), "a");

        let options = PlacementOptions {
            cleanup_empty_sources: true,
            ..Default::default()
        };
        let report = place(&[file], Category::Projects, &s.taxonomy, &[], &options).unwrap();

        assert_eq!(report.removed_dirs, vec![normalize(&nested)]);
        assert!(!nested.exists());
        assert!(s.inbox.exists());
    }

    #[test]
    fn test_progress_callback_sees_every_item_in_order() {
        let s = setup();
        let a = write(&s.inbox.join("a.txt"), "a");
        let b = s.inbox.join("missing.txt");

        let mut seen = Vec::new();
        place_with_progress(
            &[a.clone(), b.clone()],
            &PlacementTarget::Category(Category::Projects),
            &s.taxonomy,
            &[],
            &PlacementOptions::default(),
            |outcome| seen.push(outcome.source.clone()),
        )
        .unwrap();

        assert_eq!(seen, vec![a, b]);
    }

    #[test]
    fn test_report_json() {
        let s = setup();
        let a = write(&s.inbox.join("a.txt"), "a");
        let report = place(
            &[a, s.inbox.join("gone.txt")],
            Category::Projects,
            &s.taxonomy,
            &[],
            &PlacementOptions::default(),
        )
        .unwrap();

        let json = report.to_json();
        assert_eq!(json["category"], "Projects");
        assert!(json["outcomes"][0]["destination"].is_string());
        assert!(json["outcomes"][1]["error"].is_string());
    }

    #[test]
    fn test_plan_renames_same_names_within_batch() {
        let s = setup();
        fs::create_dir_all(s.inbox.join("a")).unwrap();
        fs::create_dir_all(s.inbox.join("b")).unwrap();
        let first = write(&s.inbox.join("a/report.pdf"), "1");
        let second = write(&s.inbox.join("b/report.pdf"), "2");
        let target = PlacementTarget::Category(Category::Projects);
        let options = PlacementOptions {
            on_conflict: ConflictPolicy::Rename,
            ..Default::default()
        };

        let planned = plan(
            &[first.clone(), second.clone()],
            &target,
            &s.taxonomy,
            &[],
            &options,
        )
        .unwrap();
        let placed = place_with_progress(
            &[first, second],
            &target,
            &s.taxonomy,
            &[],
            &options,
            |_| {},
        )
        .unwrap();

        let projects = s.taxonomy.category_dir(Category::Projects);
        assert_eq!(
            planned.outcomes[1].destination(),
            Some(projects.join("report_conflict_1.pdf").as_path())
        );
        let planned: Vec<_> = planned.moved().map(|(_, d)| d.to_path_buf()).collect();
        let placed: Vec<_> = placed.moved().map(|(_, d)| d.to_path_buf()).collect();
        assert_eq!(planned, placed);
    }

    #[test]
    fn test_plan_reports_collision_within_batch() {
        let s = setup();
        fs::create_dir_all(s.inbox.join("a")).unwrap();
        let first = write(&s.inbox.join("a/report.pdf"), "1");
        let second = write(&s.inbox.join("report.pdf"), "2");

        let report = plan(
            &[first, second],
            &PlacementTarget::Category(Category::Projects),
            &s.taxonomy,
            &[],
            &PlacementOptions::default(),
        )
        .unwrap();

        assert!(report.outcomes[0].is_success());
        assert!(matches!(
            report.outcomes[1].result,
            Err(PlaceError::Collision(_))
        ));
    }

    fn duplicate_setup(policy: DuplicatePolicy) -> (Setup, PathBuf, PathBuf, PlacementReport) {
        let s = setup();
        let existing = s.taxonomy.category_dir(Category::Resources).join("books/manual.pdf");
        fs::create_dir_all(existing.parent().unwrap()).unwrap();
        write(&existing, "same bytes");
        let incoming = write(&s.inbox.join("manual (1).pdf"), "same bytes");
        let options = PlacementOptions {
            on_duplicate: policy,
            ..Default::default()
        };
        let report = place(
            &[incoming.clone()],
            Category::Resources,
            &s.taxonomy,
            &[],
            &options,
        )
        .unwrap();
        (s, existing, incoming, report)
    }

    #[test]
    fn test_duplicate_is_skipped() {
        let (_s, existing, incoming, report) = duplicate_setup(DuplicatePolicy::Skip);

        assert_eq!(
            report.outcomes[0].result.as_ref().unwrap(),
            &Placed::DuplicateSkipped {
                existing: existing.clone()
            }
        );
        assert!(report.is_complete_success());
        assert_eq!(report.moved().count(), 0);
        assert_eq!(report.duplicates().count(), 1);
        assert!(incoming.exists());
        assert_eq!(report.to_json()["outcomes"][0]["source_removed"], false);
    }

    #[test]
    fn test_duplicate_is_deleted() {
        let (_s, existing, incoming, report) = duplicate_setup(DuplicatePolicy::Delete);

        assert!(matches!(
            report.outcomes[0].result,
            Ok(Placed::DuplicateRemoved { .. })
        ));
        assert!(!incoming.exists());
        assert!(existing.is_file());
    }

    #[test]
    fn test_duplicate_is_kept_under_new_name() {
        let s = setup();
        let existing = s.taxonomy.category_dir(Category::Resources).join("manual.pdf");
        write(&existing, "same bytes");
        let incoming = write(&s.inbox.join("manual.pdf"), "same bytes");
        let options = PlacementOptions {
            on_duplicate: DuplicatePolicy::Keep,
            ..Default::default()
        };

        let report = place(&[incoming], Category::Resources, &s.taxonomy, &[], &options).unwrap();

        let kept = s
            .taxonomy
            .category_dir(Category::Resources)
            .join("manual_duplicate_1.pdf");
        assert_eq!(report.outcomes[0].destination(), Some(kept.as_path()));
        assert!(kept.is_file());
    }

    #[test]
    fn test_duplicates_are_ignored_by_default() {
        let (s, _existing, incoming, report) = duplicate_setup(DuplicatePolicy::Ignore);

        assert!(!incoming.exists());
        assert_eq!(
            report.outcomes[0].destination(),
            Some(
                s.taxonomy
                    .category_dir(Category::Resources)
                    .join("manual (1).pdf")
                    .as_path()
            )
        );
    }
}
