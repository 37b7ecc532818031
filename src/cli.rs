//! Command-line interface module for paratidy.
//!
//! This module handles all CLI-related functionality including:
//! - Argument parsing
//! - Session setup from configuration
//! - Rendering reports as text or JSON

use crate::category::Category;
use crate::config::ParaConfig;
use crate::history::{HistoryEntry, OperationKind, OperationLog};
use crate::migrate::migrate;
use crate::output::OutputFormatter;
use crate::placement::{DuplicatePolicy, FolderMode, PlacementTarget};
use crate::session::Session;
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};

/// paratidy - sort files into a PARA folder structure
#[derive(Parser, Debug)]
#[command(name = "paratidy")]
#[command(version)]
#[command(about = "Sort files into Projects, Areas, Resources and Archives", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file (TOML format)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Print reports as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the base directory and the four category folders
    Init,

    /// Move files into a category, applying the configured rules
    Place {
        /// Projects, Areas, Resources or Archives
        category: Category,

        /// Files or directories to place
        #[arg(required = true, value_name = "PATH")]
        paths: Vec<PathBuf>,

        /// A directory inside the category folder to place into
        #[arg(long, value_name = "DIR")]
        into: Option<PathBuf>,

        /// Show where every path would go without moving anything
        #[arg(long)]
        dry_run: bool,

        /// Move dropped directories whole instead of merging their files
        #[arg(long)]
        move_as_is: bool,

        /// What to do with files already present in the category
        #[arg(long, value_enum, value_name = "POLICY")]
        on_duplicate: Option<DuplicatePolicy>,
    },

    /// Rebuild the index and print its size
    Index,

    /// Find entries whose name contains TERM
    Search {
        #[arg(value_name = "TERM", default_value = "")]
        term: String,
    },

    /// Print the category a path belongs to
    Which { path: PathBuf },

    /// Move the category folders from one base directory to another
    Migrate { old_root: PathBuf, new_root: PathBuf },

    /// List the configured rules in evaluation order
    Rules,

    /// List files with identical contents anywhere under the base directory
    Duplicates,

    /// Show recorded placements and migrations
    History {
        /// Show only the most recent N operations
        #[arg(short = 'n', long, value_name = "N")]
        limit: Option<usize>,
    },
}

/// Runs one parsed command.
///
/// Returns an error only when the whole command failed. Item failures inside
/// a placement batch are printed with the report.
///
/// # Examples
///
/// ```no_run
/// use clap::Parser;
/// use paratidy::cli::{Cli, run_cli};
///
/// let cli = Cli::parse_from(["paratidy", "search", "invoice"]);
/// if let Err(e) = run_cli(cli) {
///     eprintln!("Error: {}", e);
/// }
/// ```
pub fn run_cli(cli: Cli) -> Result<(), String> {
    let mut config = ParaConfig::load(cli.config.as_deref())
        .map_err(|e| format!("Error loading configuration: {}", e))?;
    if config.history_file.is_none() {
        config.history_file = default_history_file();
    }
    let json = cli.json;

    match cli.command {
        Command::Init => init(config, json),
        Command::Place {
            category,
            paths,
            into,
            dry_run,
            move_as_is,
            on_duplicate,
        } => {
            if move_as_is {
                config.folder_mode = FolderMode::MoveAsIs;
            }
            if let Some(policy) = on_duplicate {
                config.on_duplicate = policy;
            }
            place(config, category, &paths, into.as_deref(), dry_run, json)
        }
        Command::Index => index(config, json),
        Command::Search { term } => search(config, &term, json),
        Command::Which { path } => which(config, &path, json),
        Command::Migrate { old_root, new_root } => run_migrate(&config, &old_root, &new_root, json),
        Command::Rules => rules(&config, json),
        Command::Duplicates => duplicates(config, json),
        Command::History { limit } => history(&config, limit, json),
    }
}

/// `~/.config/paratidy/history.jsonl`, next to the default config file.
fn default_history_file() -> Option<PathBuf> {
    let home = std::env::var("HOME").ok()?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("paratidy")
            .join("history.jsonl"),
    )
}

/// Opens a session and refuses to go on without a usable root.
fn configured_session(config: ParaConfig) -> Result<Session, String> {
    let session = Session::new(config);
    match session.warning() {
        Some(reason) => Err(format!("{} (set base_directory in the configuration)", reason)),
        None => Ok(session),
    }
}

fn print_json(value: &Value) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Error rendering JSON: {}", e))?;
    println!("{}", text);
    Ok(())
}

fn init(config: ParaConfig, json: bool) -> Result<(), String> {
    let root = config
        .base_directory
        .clone()
        .ok_or_else(|| "No base_directory configured".to_string())?;
    fs::create_dir_all(&root)
        .map_err(|e| format!("Error creating {}: {}", root.display(), e))?;

    let session = configured_session(config)?;
    let failures = session.ensure_category_folders().map_err(|e| e.to_string())?;
    let Some(taxonomy) = session.root() else {
        return Err("No base directory available".to_string());
    };

    if json {
        return print_json(&json!({
            "root": taxonomy.path().to_string_lossy().to_string(),
            "folders": taxonomy.folders().iter().map(|(category, folder)| json!({
                "category": category.name(),
                "path": taxonomy.path().join(folder).to_string_lossy().to_string(),
            })).collect::<Vec<_>>(),
            "failures": failures.iter().map(|(category, e)| json!({
                "category": category.name(),
                "error": e.to_string(),
            })).collect::<Vec<_>>(),
        }));
    }

    OutputFormatter::info(&format!("Base directory: {}", taxonomy.path().display()));
    for category in Category::ALL {
        match failures.iter().find(|(failed, _)| *failed == category) {
            Some((_, e)) => OutputFormatter::error(&format!("{}: {}", category, e)),
            None => OutputFormatter::success(&format!(
                "{:<9} {}  {}",
                category.name(),
                taxonomy.category_dir(category).display(),
                category.description()
            )),
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err("Some category folders could not be created".to_string())
    }
}

fn place(
    config: ParaConfig,
    category: Category,
    paths: &[PathBuf],
    into: Option<&Path>,
    dry_run: bool,
    json: bool,
) -> Result<(), String> {
    let mut session = configured_session(config)?;

    let target = match into {
        Some(dir) => {
            match session.category_for_path(dir) {
                Some(found) if found == category => {}
                Some(found) => {
                    return Err(format!("{} belongs to {}, not {}", dir.display(), found, category));
                }
                None => return Err(format!("{} is not inside a category folder", dir.display())),
            }
            PlacementTarget::Directory(dir.to_path_buf())
        }
        None => PlacementTarget::Category(category),
    };

    let report = if dry_run {
        session.plan(paths, &target).map_err(|e| e.to_string())?
    } else if json {
        session
            .place_with_progress(paths, &target, |_| {})
            .map_err(|e| e.to_string())?
    } else {
        let pb = OutputFormatter::create_progress_bar(paths.len() as u64);
        let result = session.place_with_progress(paths, &target, |outcome| {
            pb.set_message(outcome.source.display().to_string());
            pb.inc(1);
        });
        pb.finish_and_clear();
        result.map_err(|e| e.to_string())?
    };

    if json {
        return print_json(&report.to_json());
    }

    OutputFormatter::placement_report(&report);
    if !report.is_complete_success() {
        OutputFormatter::warning("Some paths could not be placed. Please review errors above.");
    }
    Ok(())
}

fn index(config: ParaConfig, json: bool) -> Result<(), String> {
    let mut session = configured_session(config)?;
    let index = session.rebuild_index().map_err(|e| e.to_string())?;

    if json {
        return print_json(&json!({
            "root": index.root().to_string_lossy().to_string(),
            "entries": index.len(),
            "skipped": index.skipped().iter().map(|skipped| json!({
                "path": skipped.path.as_ref().map(|p| p.to_string_lossy().to_string()),
                "reason": skipped.reason,
            })).collect::<Vec<_>>(),
        }));
    }

    OutputFormatter::success(&format!(
        "Indexed {} entries under {}",
        index.len(),
        index.root().display()
    ));
    for skipped in index.skipped() {
        OutputFormatter::warning(&format!("Skipped: {}", skipped.reason));
    }
    Ok(())
}

fn search(config: ParaConfig, term: &str, json: bool) -> Result<(), String> {
    let session = configured_session(config)?;
    let index = session.index();
    // An empty term lists everything.
    let hits = session
        .search(term)
        .unwrap_or_else(|| index.entries().iter().collect());

    if json {
        let value = serde_json::to_value(&hits).map_err(|e| format!("Error rendering JSON: {}", e))?;
        return print_json(&value);
    }

    OutputFormatter::search_results(&hits, index.root());
    Ok(())
}

fn which(config: ParaConfig, path: &Path, json: bool) -> Result<(), String> {
    let session = configured_session(config)?;
    let category = session.category_for_path(path);

    if json {
        return print_json(&json!({
            "path": path.to_string_lossy().to_string(),
            "category": category.map(|c| c.name()),
        }));
    }

    match category {
        Some(category) => OutputFormatter::plain(category.name()),
        None => OutputFormatter::warning(&format!(
            "{} is not inside a category folder",
            path.display()
        )),
    }
    Ok(())
}

fn run_migrate(
    config: &ParaConfig,
    old_root: &Path,
    new_root: &Path,
    json: bool,
) -> Result<(), String> {
    let report = migrate(old_root, new_root, &config.folders).map_err(|e| e.to_string())?;
    if let Some(path) = &config.history_file
        && let Err(e) = OperationLog::new(path)
            .record(&HistoryEntry::new(OperationKind::Migrate, report.to_json()))
    {
        OutputFormatter::warning(&format!("Could not save history: {}", e));
    }

    if json {
        print_json(&report.to_json())?;
    } else {
        OutputFormatter::migration_report(&report);
    }
    if !report.is_complete_success() && !json {
        OutputFormatter::warning("Some category folders were not moved.");
    }
    Ok(())
}

fn rules(config: &ParaConfig, json: bool) -> Result<(), String> {
    if json {
        let value = serde_json::to_value(&config.rules)
            .map_err(|e| format!("Error rendering JSON: {}", e))?;
        return print_json(&value);
    }

    if config.rules.is_empty() {
        OutputFormatter::info("No rules configured");
        return Ok(());
    }
    OutputFormatter::header("RULES (first match wins)");
    for (position, rule) in config.rules.iter().enumerate() {
        OutputFormatter::plain(&format!("{:>3}. {}", position + 1, rule));
    }
    Ok(())
}

fn duplicates(config: ParaConfig, json: bool) -> Result<(), String> {
    let session = configured_session(config)?;
    let groups = session.find_duplicates().map_err(|e| e.to_string())?;

    if json {
        let value =
            serde_json::to_value(&groups).map_err(|e| format!("Error rendering JSON: {}", e))?;
        return print_json(&value);
    }

    let Some(taxonomy) = session.root() else {
        return Err("No base directory available".to_string());
    };
    OutputFormatter::duplicate_groups(&groups, taxonomy.path());
    Ok(())
}

fn history(config: &ParaConfig, limit: Option<usize>, json: bool) -> Result<(), String> {
    let Some(path) = &config.history_file else {
        return Err("No history_file configured".to_string());
    };
    let log = OperationLog::new(path);
    let entries = match limit {
        Some(limit) => log.recent(limit),
        None => log.entries(),
    }
    .map_err(|e| format!("Error reading history: {}", e))?;

    if json {
        let value =
            serde_json::to_value(&entries).map_err(|e| format!("Error rendering JSON: {}", e))?;
        return print_json(&value);
    }

    OutputFormatter::history(&entries);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_place_command() {
        let cli = Cli::parse_from([
            "paratidy", "--json", "place", "projects", "a.txt", "b.txt", "--dry-run",
        ]);
        assert!(cli.json);
        match cli.command {
            Command::Place {
                category,
                paths,
                into,
                dry_run,
                move_as_is,
                on_duplicate,
            } => {
                assert_eq!(category, Category::Projects);
                assert_eq!(paths.len(), 2);
                assert!(into.is_none());
                assert!(dry_run);
                assert!(!move_as_is);
                assert!(on_duplicate.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_category_is_rejected() {
        let result = Cli::try_parse_from(["paratidy", "place", "inbox", "a.txt"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_place_requires_paths() {
        let result = Cli::try_parse_from(["paratidy", "place", "areas"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_search_term_defaults_to_empty() {
        let cli = Cli::parse_from(["paratidy", "search"]);
        assert!(matches!(cli.command, Command::Search { term } if term.is_empty()));
    }

    #[test]
    fn test_parse_place_overrides() {
        let cli = Cli::parse_from([
            "paratidy", "place", "areas", "trip", "--move-as-is", "--on-duplicate", "skip",
        ]);
        match cli.command {
            Command::Place {
                move_as_is,
                on_duplicate,
                ..
            } => {
                assert!(move_as_is);
                assert_eq!(on_duplicate, Some(DuplicatePolicy::Skip));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_history_limit() {
        let cli = Cli::parse_from(["paratidy", "history", "-n", "5"]);
        assert!(matches!(cli.command, Command::History { limit: Some(5) }));
    }
}
