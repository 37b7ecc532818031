//! First-match-wins rule evaluation.

use crate::category::Category;
use crate::rule::Rule;

/// Returns the first rule in `rules` that belongs to `category` and matches
/// `filename`, or `None` if no rule does.
///
/// # Examples
///
/// ```
/// use paratidy::category::Category;
/// use paratidy::classifier::classify;
/// use paratidy::rule::{Action, Condition, Rule};
///
/// let rules = vec![Rule::new(
///     Category::Projects,
///     Condition::Extension("png,jpg".to_string()),
///     Action::Subfolder("images".to_string()),
/// )];
///
/// assert!(classify(&rules, Category::Projects, "photo.JPG").is_some());
/// assert!(classify(&rules, Category::Projects, "notes.txt").is_none());
/// assert!(classify(&rules, Category::Areas, "photo.jpg").is_none());
/// ```
pub fn classify<'a>(rules: &'a [Rule], category: Category, filename: &str) -> Option<&'a Rule> {
    classify_position(rules, category, filename).map(|(_, rule)| rule)
}

/// Like [`classify`], but also returns the matching rule's position in the list.
pub fn classify_position<'a>(
    rules: &'a [Rule],
    category: Category,
    filename: &str,
) -> Option<(usize, &'a Rule)> {
    rules
        .iter()
        .enumerate()
        .find(|(_, rule)| rule.applies_to(category, filename))
}
