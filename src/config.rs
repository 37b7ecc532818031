//! Configuration loading.
//!
//! paratidy reads a single TOML file holding the taxonomy root, the category
//! folder names, placement options, and the ordered rule list.
//!
//! # Configuration File Format
//!
//! ```toml
//! base_directory = "/home/me/PARA"
//! on_conflict = "fail"            # or "rename"
//! cleanup_empty_sources = false
//! on_duplicate = "ignore"         # or "skip", "delete", "keep"
//! folder_mode = "merge"           # or "move_as_is"
//! history_file = "history.jsonl"
//!
//! [folders]
//! projects = "1_Projects"
//!
//! [[rules]]
//! category = "Projects"
//! condition_type = "extension"
//! condition_value = "png,jpg"
//! action = "subfolder"
//! action_value = "images"
//! ```
//!
//! Instead of inline `[[rules]]`, `rules_file` may point to a JSON array of
//! the same records. Relative `rules_file` and `history_file` paths are
//! resolved against the config file.

use crate::category::{CategoryFolders, FolderNameError};
use crate::placement::{ConflictPolicy, DuplicatePolicy, FolderMode, PlacementOptions};
use crate::rule::Rule;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Errors that can occur while loading configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),
    /// Invalid TOML syntax or structure.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),
    /// The referenced rules file is not a valid JSON rule list.
    #[error("invalid rules file {}: {reason}", .path.display())]
    RulesInvalid { path: PathBuf, reason: String },
    /// The `[folders]` table names unusable folders.
    #[error("invalid [folders]: {0}")]
    InvalidFolders(FolderNameError),
    /// IO error while reading configuration.
    #[error("IO error reading configuration: {0}")]
    IoError(String),
}

/// Everything paratidy needs from its configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParaConfig {
    /// The taxonomy root. An empty string means unset.
    #[serde(
        default,
        deserialize_with = "empty_path_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub base_directory: Option<PathBuf>,

    /// What to do when a destination already exists.
    #[serde(default)]
    pub on_conflict: ConflictPolicy,

    /// Remove source directories emptied by a placement batch.
    #[serde(default)]
    pub cleanup_empty_sources: bool,

    /// What to do with a file whose contents already exist in the category.
    #[serde(default)]
    pub on_duplicate: DuplicatePolicy,

    /// Whether dropped directories are merged file by file or moved whole.
    #[serde(default)]
    pub folder_mode: FolderMode,

    /// JSON-lines file that placements and migrations are appended to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_file: Option<PathBuf>,

    /// JSON file holding the rule list, used instead of inline rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_file: Option<PathBuf>,

    /// Category folder names.
    #[serde(default)]
    pub folders: CategoryFolders,

    /// Ordered rule list; the first matching rule wins.
    #[serde(default)]
    pub rules: Vec<Rule>,
}

fn empty_path_as_none<'de, D>(deserializer: D) -> Result<Option<PathBuf>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .filter(|path| !path.trim().is_empty())
        .map(PathBuf::from))
}

impl ParaConfig {
    /// Load configuration from a file, with fallback to defaults.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `.paratidy.toml` in the current directory
    /// 3. Look for `~/.config/paratidy/config.toml` in home directory
    /// 4. Fall back to default configuration (no base directory, no rules)
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is explicitly provided but cannot be read,
    /// or if any file found is invalid.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(".paratidy.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("paratidy")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        debug!("no configuration file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ConfigNotFound` if file does not exist.
    /// Returns `ConfigError::ConfigInvalid` if TOML parsing fails.
    /// Returns `ConfigError::RulesInvalid` if the referenced rules file is invalid.
    /// Returns `ConfigError::IoError` if a file cannot be read.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        let mut config = Self::from_toml_str(&content)?;

        if let Some(rules_file) = &config.rules_file {
            config.rules = load_rules_json(&relative_to(path, rules_file))?;
        }
        if let Some(history_file) = &config.history_file {
            config.history_file = Some(relative_to(path, history_file));
        }

        debug!(path = %path.display(), rules = config.rules.len(), "loaded configuration");
        Ok(config)
    }

    /// Parses configuration from TOML text. `rules_file` is not read.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ConfigInvalid` if TOML parsing fails and
    /// `ConfigError::InvalidFolders` if a folder name is unusable.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))?;
        config.folders.validate().map_err(ConfigError::InvalidFolders)?;
        Ok(config)
    }

    /// Returns the placement options this configuration asks for.
    pub fn placement_options(&self) -> PlacementOptions {
        PlacementOptions {
            on_conflict: self.on_conflict,
            on_duplicate: self.on_duplicate,
            folder_mode: self.folder_mode,
            cleanup_empty_sources: self.cleanup_empty_sources,
        }
    }
}

/// Resolves `file` against the directory of `config_path` when relative.
fn relative_to(config_path: &Path, file: &Path) -> PathBuf {
    match config_path.parent() {
        Some(dir) if file.is_relative() => dir.join(file),
        _ => file.to_path_buf(),
    }
}

/// Reads a JSON array of rule records.
pub fn load_rules_json(path: &Path) -> Result<Vec<Rule>, ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
    serde_json::from_str(&content).map_err(|e| ConfigError::RulesInvalid {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::Category;
    use crate::rule::{Action, Condition};
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_unconfigured() {
        let config = ParaConfig::default();
        assert!(config.base_directory.is_none());
        assert!(config.rules.is_empty());
        assert_eq!(config.on_conflict, ConflictPolicy::Fail);
        assert_eq!(config.folders, CategoryFolders::default());
        assert_eq!(config.on_duplicate, DuplicatePolicy::Ignore);
        assert_eq!(config.folder_mode, FolderMode::Merge);
        assert!(config.history_file.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let config = ParaConfig::from_toml_str(
            r#"
            base_directory = "/para"
            on_conflict = "rename"
            cleanup_empty_sources = true

            [folders]
            archives = "Archive"

            [[rules]]
            category = "Projects"
            condition_type = "extension"
            condition_value = "png,jpg"
            action = "subfolder"
            action_value = "images"
            "#,
        )
        .unwrap();

        assert_eq!(config.base_directory, Some(PathBuf::from("/para")));
        assert_eq!(config.on_conflict, ConflictPolicy::Rename);
        assert!(config.placement_options().cleanup_empty_sources);
        assert_eq!(config.folders.get(Category::Archives), "Archive");
        assert_eq!(config.folders.get(Category::Projects), "1_Projects");
        assert_eq!(config.rules.len(), 1);
    }

    #[test]
    fn test_empty_base_directory_is_unset() {
        let config = ParaConfig::from_toml_str("base_directory = \"  \"").unwrap();
        assert!(config.base_directory.is_none());
    }

    #[test]
    fn test_invalid_toml() {
        let result = ParaConfig::from_toml_str("base_directory = ");
        assert!(matches!(result, Err(ConfigError::ConfigInvalid(_))));
    }

    #[test]
    fn test_invalid_conflict_policy() {
        let result = ParaConfig::from_toml_str("on_conflict = \"overwrite\"");
        assert!(matches!(result, Err(ConfigError::ConfigInvalid(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = ParaConfig::load(Some(Path::new("/non/existent/config.toml")));
        assert!(matches!(result, Err(ConfigError::ConfigNotFound(_))));
    }

    #[test]
    fn test_load_rules_file_relative_to_config() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config_path = temp_dir.path().join("config.toml");
        fs::write(
            &config_path,
            "base_directory = \"/para\"\nrules_file = \"rules.json\"\n",
        )
        .unwrap();
        fs::write(
            temp_dir.path().join("rules.json"),
            r#"[{"category": "Areas", "condition_type": "keyword", "condition_value": "tax",
                 "action": "prefix", "action_value": "TAX_"}]"#,
        )
        .unwrap();

        let config = ParaConfig::load(Some(&config_path)).unwrap();
        assert_eq!(
            config.rules,
            vec![Rule::new(
                Category::Areas,
                Condition::Keyword("tax".to_string()),
                Action::Prefix("TAX_".to_string()),
            )]
        );
    }

    #[test]
    fn test_invalid_rules_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "rules_file = \"rules.json\"\n").unwrap();
        fs::write(temp_dir.path().join("rules.json"), "[{\"category\": 1}]").unwrap();

        let result = ParaConfig::load(Some(&config_path));
        assert!(matches!(result, Err(ConfigError::RulesInvalid { .. })));
    }

    #[test]
    fn test_parse_duplicate_and_folder_mode() {
        let config = ParaConfig::from_toml_str(
            "on_duplicate = \"skip\"\nfolder_mode = \"move_as_is\"\n",
        )
        .unwrap();

        let options = config.placement_options();
        assert_eq!(options.on_duplicate, DuplicatePolicy::Skip);
        assert_eq!(options.folder_mode, FolderMode::MoveAsIs);
    }

    #[test]
    fn test_folder_name_with_separator_is_rejected() {
        let result = ParaConfig::from_toml_str("[folders]\nprojects = \"../escape\"\n");
        assert!(matches!(
            result,
            Err(ConfigError::InvalidFolders(FolderNameError::NotASingleName { .. }))
        ));
    }

    #[test]
    fn test_shared_folder_name_is_rejected() {
        let result = ParaConfig::from_toml_str(
            "[folders]\nprojects = \"Work\"\nareas = \"Work\"\n",
        );
        assert!(matches!(
            result,
            Err(ConfigError::InvalidFolders(FolderNameError::Shared { .. }))
        ));
    }

    #[test]
    fn test_history_file_relative_to_config() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "history_file = \"history.jsonl\"\n").unwrap();

        let config = ParaConfig::load(Some(&config_path)).unwrap();
        assert_eq!(
            config.history_file,
            Some(temp_dir.path().join("history.jsonl"))
        );
    }
}
