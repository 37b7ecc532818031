/// The four PARA categories and their folder names.
///
/// Every file paratidy files away lands under one of four fixed top-level
/// folders. The set of categories never changes; only the folder name each one
/// maps to can be configured.
///
/// # Examples
///
/// ```
/// use paratidy::category::{Category, CategoryFolders};
///
/// let folders = CategoryFolders::default();
/// assert_eq!(folders.get(Category::Projects), "1_Projects");
/// assert_eq!(folders.get(Category::Archives), "4_Archives");
/// assert_eq!("areas".parse::<Category>(), Ok(Category::Areas));
/// ```
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path};
use std::str::FromStr;

/// One of the four PARA buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    /// Short-term efforts with a goal and a deadline.
    Projects,
    /// Ongoing responsibilities without an end date.
    Areas,
    /// Reference material and topics of interest.
    Resources,
    /// Inactive items from the other three categories.
    Archives,
}

impl Category {
    /// All categories, in taxonomy order.
    pub const ALL: [Category; 4] = [
        Category::Projects,
        Category::Areas,
        Category::Resources,
        Category::Archives,
    ];

    /// Returns the category name as written in configuration files.
    ///
    /// # Examples
    ///
    /// ```
    /// use paratidy::category::Category;
    ///
    /// assert_eq!(Category::Resources.name(), "Resources");
    /// ```
    pub fn name(&self) -> &'static str {
        match self {
            Category::Projects => "Projects",
            Category::Areas => "Areas",
            Category::Resources => "Resources",
            Category::Archives => "Archives",
        }
    }

    /// Returns the folder name used when nothing else is configured.
    pub fn default_folder(&self) -> &'static str {
        match self {
            Category::Projects => "1_Projects",
            Category::Areas => "2_Areas",
            Category::Resources => "3_Resources",
            Category::Archives => "4_Archives",
        }
    }

    /// Returns a human-readable description of this category.
    pub fn description(&self) -> &'static str {
        match self {
            Category::Projects => "Active projects with a deadline",
            Category::Areas => "Ongoing areas of responsibility",
            Category::Resources => "Reference material",
            Category::Archives => "Inactive items",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a string does not name a category.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category '{0}': expected one of Projects, Areas, Resources, Archives")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    /// Parses a category name, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Category::ALL
            .into_iter()
            .find(|category| category.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// Maps each category to the folder that holds it under the taxonomy root.
///
/// Any field left out of the configuration falls back to the
/// category's [`Category::default_folder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryFolders {
    #[serde(default = "default_projects")]
    pub projects: String,
    #[serde(default = "default_areas")]
    pub areas: String,
    #[serde(default = "default_resources")]
    pub resources: String,
    #[serde(default = "default_archives")]
    pub archives: String,
}

fn default_projects() -> String {
    Category::Projects.default_folder().to_string()
}

fn default_areas() -> String {
    Category::Areas.default_folder().to_string()
}

fn default_resources() -> String {
    Category::Resources.default_folder().to_string()
}

fn default_archives() -> String {
    Category::Archives.default_folder().to_string()
}

impl CategoryFolders {
    /// Returns the folder name for a category.
    pub fn get(&self, category: Category) -> &str {
        match category {
            Category::Projects => &self.projects,
            Category::Areas => &self.areas,
            Category::Resources => &self.resources,
            Category::Archives => &self.archives,
        }
    }

    /// Iterates over `(category, folder)` pairs in taxonomy order.
    pub fn iter(&self) -> impl Iterator<Item = (Category, &str)> + '_ {
        Category::ALL
            .into_iter()
            .map(move |category| (category, self.get(category)))
    }
}

/// Why a folder mapping cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FolderNameError {
    /// The name is empty, contains a separator, or is `.` or `..`.
    #[error("folder for {category} must be a single directory name, got '{name}'")]
    NotASingleName { category: Category, name: String },
    /// Two categories map to the same folder.
    #[error("{first} and {second} both use folder '{name}'")]
    Shared {
        first: Category,
        second: Category,
        name: String,
    },
}

impl CategoryFolders {
    /// Checks that every name is one plain directory name and that no two
    /// categories share a folder.
    pub fn validate(&self) -> Result<(), FolderNameError> {
        for (category, name) in self.iter() {
            let mut components = Path::new(name).components();
            let single = matches!(
                (components.next(), components.next()),
                (Some(Component::Normal(part)), None) if part == name
            );
            if !single {
                return Err(FolderNameError::NotASingleName {
                    category,
                    name: name.to_string(),
                });
            }
        }

        for (i, (first, name)) in self.iter().enumerate() {
            if let Some((second, _)) = self.iter().skip(i + 1).find(|(_, other)| *other == name) {
                return Err(FolderNameError::Shared {
                    first,
                    second,
                    name: name.to_string(),
                });
            }
        }
        Ok(())
    }
}

impl Default for CategoryFolders {
    fn default() -> Self {
        Self {
            projects: default_projects(),
            areas: default_areas(),
            resources: default_resources(),
            archives: default_archives(),
        }
    }
}
