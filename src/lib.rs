//! paratidy - sort files into a PARA folder structure
//!
//! This library keeps a base directory with four category folders (Projects,
//! Areas, Resources, Archives), places dropped files into them according to
//! an ordered rule list, keeps a searchable name index of the tree, and moves
//! the whole structure when the base directory changes.

pub mod category;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod fs_move;
pub mod history;
pub mod index;
pub mod migrate;
pub mod output;
pub mod placement;
pub mod rule;
pub mod session;
pub mod taxonomy;

pub use category::{Category, CategoryFolders, FolderNameError};
pub use classifier::classify;
pub use config::{ConfigError, ParaConfig};
pub use duplicates::{DuplicateGroup, find_duplicates};
pub use history::{HistoryEntry, HistoryError, OperationKind, OperationLog};
pub use index::{FileIndex, IndexEntry, IndexError, rebuild_index};
pub use migrate::{FolderOutcome, MigrationError, MigrationReport, migrate};
pub use placement::{
    ConflictPolicy, DuplicatePolicy, FolderMode, PlaceError, Placed, PlacementError,
    PlacementOptions, PlacementReport, PlacementTarget, place,
};
pub use rule::{Action, Condition, Rule};
pub use session::{ReloadOutcome, Session, SessionError};
pub use taxonomy::{RootError, TaxonomyRoot};

pub use cli::{Cli, run_cli};
