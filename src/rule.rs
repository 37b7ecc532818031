//! Classification rules.
//!
//! A rule pairs one condition on a filename with one action that changes where
//! (or under which name) the file is placed. Rules belong to a single category
//! and are kept in an ordered list where the first match wins.
//!
//! # Configuration Format
//!
//! Rules are stored as flat records, one `[[rules]]` table each:
//!
//! ```toml
//! [[rules]]
//! category = "Projects"
//! condition_type = "extension"
//! condition_value = "png, jpg"
//! action = "subfolder"
//! action_value = "images"
//! ```
//!
//! `condition_type` is `extension` or `keyword`; `action` is `subfolder` or
//! `prefix`. Any other value is rejected when the configuration is parsed.

use crate::category::Category;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The test a rule applies to a filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// Comma-separated list of suffixes, e.g. `"pdf, docx"`.
    Extension(String),
    /// A single substring, e.g. `"invoice"`.
    Keyword(String),
}

impl Condition {
    /// Checks the condition against a filename, ignoring case.
    ///
    /// Empty pieces of an extension list are ignored. An empty keyword matches
    /// every filename.
    pub fn matches(&self, filename: &str) -> bool {
        let filename = filename.to_lowercase();
        match self {
            Condition::Extension(suffixes) => suffixes
                .split(',')
                .map(str::trim)
                .filter(|suffix| !suffix.is_empty())
                .any(|suffix| filename.ends_with(&suffix.to_lowercase())),
            Condition::Keyword(keyword) => filename.contains(&keyword.to_lowercase()),
        }
    }
}

/// What happens to a file whose name satisfies the condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Place the file in this folder below the destination directory.
    Subfolder(String),
    /// Prepend this text to the filename, without a separator.
    Prefix(String),
}

/// A condition/action pair scoped to one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RuleRecord", into = "RuleRecord")]
pub struct Rule {
    pub category: Category,
    pub condition: Condition,
    pub action: Action,
}

impl Rule {
    pub fn new(category: Category, condition: Condition, action: Action) -> Self {
        Self {
            category,
            condition,
            action,
        }
    }

    /// Returns true if this rule belongs to `category` and its condition
    /// accepts `filename`.
    pub fn applies_to(&self, category: Category, filename: &str) -> bool {
        self.category == category && self.condition.matches(filename)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let condition = match &self.condition {
            Condition::Extension(value) => format!("extension in [{}]", value),
            Condition::Keyword(value) => format!("name contains '{}'", value),
        };
        let action = match &self.action {
            Action::Subfolder(value) => format!("move into {}/", value),
            Action::Prefix(value) => format!("prefix with '{}'", value),
        };
        write!(f, "{}: {} -> {}", self.category, condition, action)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ConditionKind {
    Extension,
    Keyword,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ActionKind {
    Subfolder,
    Prefix,
}

/// The flat record shape rules have in configuration files.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RuleRecord {
    category: Category,
    condition_type: ConditionKind,
    #[serde(default)]
    condition_value: String,
    action: ActionKind,
    #[serde(default)]
    action_value: String,
}

impl From<RuleRecord> for Rule {
    fn from(record: RuleRecord) -> Self {
        let condition = match record.condition_type {
            ConditionKind::Extension => Condition::Extension(record.condition_value),
            ConditionKind::Keyword => Condition::Keyword(record.condition_value),
        };
        let action = match record.action {
            ActionKind::Subfolder => Action::Subfolder(record.action_value),
            ActionKind::Prefix => Action::Prefix(record.action_value),
        };
        Rule::new(record.category, condition, action)
    }
}

impl From<Rule> for RuleRecord {
    fn from(rule: Rule) -> Self {
        let (condition_type, condition_value) = match rule.condition {
            Condition::Extension(value) => (ConditionKind::Extension, value),
            Condition::Keyword(value) => (ConditionKind::Keyword, value),
        };
        let (action, action_value) = match rule.action {
            Action::Subfolder(value) => (ActionKind::Subfolder, value),
            Action::Prefix(value) => (ActionKind::Prefix, value),
        };
        RuleRecord {
            category: rule.category,
            condition_type,
            condition_value,
            action,
            action_value,
        }
    }
}
