//! Output formatting and styling module.
//!
//! All terminal output of the `paratidy` binary goes through here, so the
//! styling can change in one place.

use crate::duplicates::DuplicateGroup;
use crate::history::{HistoryEntry, OperationKind};
use crate::index::IndexEntry;
use crate::migrate::{FolderOutcome, MigrationReport};
use crate::placement::{Placed, PlacementReport};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

/// Manages all CLI output with consistent styling and formatting.
///
/// This struct provides methods for:
/// - Success messages (green with ✓)
/// - Error messages (red with ✗)
/// - Warning messages (yellow with ⚠)
/// - Info messages (cyan)
/// - A progress bar for placement batches
/// - Report tables
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use paratidy::output::OutputFormatter;
    /// OutputFormatter::success("Placed 3 files");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn plain(message: &str) {
        println!("{}", message);
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Creates a progress bar for `total` placement items.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use paratidy::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar(10);
    /// pb.inc(1);
    /// pb.finish_with_message("done");
    /// ```
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        pb.set_style(style);
        pb
    }

    /// Prints a placement report, one line per item, followed by a summary.
    pub fn placement_report(report: &PlacementReport) {
        if report.dry_run {
            Self::dry_run_notice(&format!(
                "Would place into {}",
                report.destination_root.display()
            ));
        } else {
            Self::info(&format!(
                "Placed into {} ({})",
                report.destination_root.display(),
                report.category
            ));
        }

        for outcome in &report.outcomes {
            let rule = outcome
                .rule
                .map(|position| format!(" [rule {}]", position + 1))
                .unwrap_or_default();
            match &outcome.result {
                Ok(Placed::Moved(destination)) => println!(
                    "   {} {} -> {}{}",
                    "✓".green(),
                    outcome.source.display(),
                    destination.display(),
                    rule.dimmed()
                ),
                Ok(Placed::DuplicateSkipped { existing }) => println!(
                    "   {} {} already at {}, left in place",
                    "=".yellow(),
                    outcome.source.display(),
                    existing.display()
                ),
                Ok(Placed::DuplicateRemoved { existing }) => println!(
                    "   {} {} already at {}, deleted",
                    "=".yellow(),
                    outcome.source.display(),
                    existing.display()
                ),
                Err(e) => eprintln!(
                    "   {} {}: {}{}",
                    "✗".red(),
                    outcome.source.display(),
                    e,
                    rule.dimmed()
                ),
            }
        }

        for dir in &report.removed_dirs {
            println!("   {} removed empty {}", "-".dimmed(), dir.display());
        }

        Self::summary_table(&[
            ("Placed", report.moved().count()),
            ("Duplicates", report.duplicates().count()),
            ("Failed", report.failed().count()),
        ]);
    }

    /// Prints per-category migration results.
    pub fn migration_report(report: &MigrationReport) {
        Self::header(&format!(
            "MIGRATION {} -> {}",
            report.old_root.display(),
            report.new_root.display()
        ));
        for (category, outcome) in &report.folders {
            match outcome {
                FolderOutcome::Moved(path) => {
                    Self::success(&format!("{}: moved to {}", category, path.display()))
                }
                FolderOutcome::Skipped => {
                    Self::plain(&format!("  {}: {}", category, "not present, skipped".dimmed()))
                }
                FolderOutcome::Failed(reason) => Self::error(&format!("{}: {}", category, reason)),
            }
        }
    }

    /// Prints search hits with their location below `root`.
    pub fn search_results(hits: &[&IndexEntry], root: &Path) {
        if hits.is_empty() {
            Self::warning("No matches");
            return;
        }
        let width = hits
            .iter()
            .map(|entry| entry.name().len())
            .max()
            .unwrap_or(0);
        for entry in hits {
            println!(
                "{:<width$}  {}",
                entry.name(),
                entry.location(root).dimmed(),
                width = width
            );
        }
    }

    /// Prints each group of identical files.
    pub fn duplicate_groups(groups: &[DuplicateGroup], root: &Path) {
        if groups.is_empty() {
            Self::success("No duplicate files");
            return;
        }
        for group in groups {
            Self::header(&format!(
                "{} ({} bytes)",
                &group.hash[..group.hash.len().min(12)],
                group.size
            ));
            for path in &group.paths {
                let shown = path.strip_prefix(root).unwrap_or(path);
                println!("   {}", shown.display());
            }
        }
        let wasted: u64 = groups
            .iter()
            .map(|group| group.size * (group.paths.len() as u64).saturating_sub(1))
            .sum();
        Self::info(&format!(
            "\n{} groups, {} bytes in extra copies",
            groups.len(),
            wasted
        ));
    }

    /// Prints one line per history entry.
    pub fn history(entries: &[HistoryEntry]) {
        if entries.is_empty() {
            Self::info("No recorded operations");
            return;
        }
        for entry in entries {
            let summary = match entry.kind {
                OperationKind::Place => {
                    let outcomes = entry.report["outcomes"].as_array();
                    let count = |key: &str| {
                        outcomes.map_or(0, |items| {
                            items.iter().filter(|item| item.get(key).is_some()).count()
                        })
                    };
                    format!(
                        "place   {} placed, {} duplicates, {} failed into {}",
                        count("destination"),
                        count("duplicate_of"),
                        count("error"),
                        entry.report["destination_root"].as_str().unwrap_or("?")
                    )
                }
                OperationKind::Migrate => format!(
                    "migrate {} -> {}",
                    entry.report["old_root"].as_str().unwrap_or("?"),
                    entry.report["new_root"].as_str().unwrap_or("?")
                ),
            };
            println!("{}  {}", entry.timestamp.dimmed(), summary);
        }
    }

    /// Prints a two-column table of labelled counts with a total row.
    pub fn summary_table(rows: &[(&str, usize)]) {
        Self::header("SUMMARY");

        let width = rows
            .iter()
            .map(|(label, _)| label.len())
            .max()
            .unwrap_or(0)
            .max(5); // "Total"

        println!("{}", "-".repeat(width + 10));
        for (label, count) in rows {
            let word = if *count == 1 { "item" } else { "items" };
            println!(
                "{:<width$} | {} {}",
                label,
                count.to_string().green(),
                word,
                width = width
            );
        }
        println!("{}", "-".repeat(width + 10));

        let total: usize = rows.iter().map(|(_, count)| count).sum();
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total.to_string().green().bold(),
            if total == 1 { "item" } else { "items" },
            width = width
        );
    }

    /// Prints a dry-run notice message.
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }
}
