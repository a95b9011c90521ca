//! The bounded playbook of learned strategies.
//!
//! A playbook holds a single category today, `process_strategies`.
//! [`PlaybookSection`] is carried through formatting so that stages can
//! already declare which section they want once more categories exist.

mod curator;

pub use curator::{Curator, DEFAULT_PLAYBOOK_CAPACITY, LEARNED_PATTERNS_KEY};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Text used in prompts before anything has been learned.
pub const EMPTY_PLAYBOOK_TEXT: &str = "No strategies learned yet. This is your first attempt.";

/// Header placed above the numbered strategy list.
pub const PROCESS_STRATEGIES_HEADER: &str = "PROCESS STRATEGIES (learned from previous critiques):";

/// The section a stage asks for when its playbook text is formatted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaybookSection(String);

impl PlaybookSection {
    /// The section name that selects every category.
    pub const ALL: &'static str = "all";

    /// Creates a section from its name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the section selecting every category.
    #[must_use]
    pub fn all() -> Self {
        Self::new(Self::ALL)
    }

    /// Returns the section name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for PlaybookSection {
    fn default() -> Self {
        Self::all()
    }
}

impl fmt::Display for PlaybookSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlaybookSection {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for PlaybookSection {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Accumulated strategies injected into future prompts.
///
/// Only the [`Curator`] grows a playbook; everything else reads it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playbook {
    /// Learned process strategies, oldest first.
    #[serde(default)]
    process_strategies: Vec<String>,
}

impl Playbook {
    /// Creates an empty playbook.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a playbook holding the given strategies, oldest first.
    #[must_use]
    pub fn from_strategies<I, S>(strategies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            process_strategies: strategies.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the strategies, oldest first.
    #[must_use]
    pub fn strategies(&self) -> &[String] {
        &self.process_strategies
    }

    /// Returns the number of strategies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.process_strategies.len()
    }

    /// Returns true if nothing has been learned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.process_strategies.is_empty()
    }

    /// Returns true if the exact strategy is already present.
    #[must_use]
    pub fn contains(&self, strategy: &str) -> bool {
        self.process_strategies.iter().any(|s| s == strategy)
    }

    pub(crate) fn push(&mut self, strategy: String) {
        self.process_strategies.push(strategy);
    }

    /// Keeps only the newest `capacity` strategies.
    pub(crate) fn truncate_oldest(&mut self, capacity: usize) {
        let len = self.process_strategies.len();
        if len > capacity {
            self.process_strategies.drain(..len - capacity);
        }
    }

    /// Renders the playbook as prompt text.
    ///
    /// The section is accepted for forward compatibility and does not filter.
    #[must_use]
    pub fn format(&self, _section: &PlaybookSection) -> String {
        if self.is_empty() {
            return EMPTY_PLAYBOOK_TEXT.to_string();
        }

        let mut out = String::from(PROCESS_STRATEGIES_HEADER);
        out.push('\n');
        for (i, strategy) in self.process_strategies.iter().enumerate() {
            out.push_str(&format!("{}. {strategy}\n", i + 1));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_playbook_sentinel() {
        let pb = Playbook::new();
        assert_eq!(pb.format(&PlaybookSection::all()), EMPTY_PLAYBOOK_TEXT);
    }

    #[test]
    fn test_format_numbered_list() {
        let pb = Playbook::from_strategies(["Prefer active verbs.", "Keep the final couplet."]);
        assert_eq!(
            pb.format(&PlaybookSection::all()),
            "PROCESS STRATEGIES (learned from previous critiques):\n\
             1. Prefer active verbs.\n\
             2. Keep the final couplet.\n"
        );
    }

    #[test]
    fn test_section_does_not_filter() {
        let pb = Playbook::from_strategies(["A"]);
        assert_eq!(
            pb.format(&PlaybookSection::new("critique")),
            pb.format(&PlaybookSection::new("translation"))
        );
    }

    #[test]
    fn test_truncate_oldest_keeps_newest() {
        let mut pb = Playbook::from_strategies(["1", "2", "3", "4"]);
        pb.truncate_oldest(2);
        assert_eq!(pb.strategies(), ["3".to_string(), "4".to_string()]);
    }

    #[test]
    fn test_serde_shape_and_extra_categories() {
        let pb = Playbook::from_strategies(["A"]);
        assert_eq!(
            serde_json::to_value(&pb).unwrap(),
            serde_json::json!({"process_strategies": ["A"]})
        );

        let old: Playbook = serde_json::from_value(serde_json::json!({
            "process_strategies": ["B"],
            "critique_strategies": ["ignored"]
        }))
        .unwrap();
        assert_eq!(old.strategies(), ["B".to_string()]);
    }

    #[test]
    fn test_section_serde_is_plain_string() {
        let section: PlaybookSection = serde_json::from_str("\"translation\"").unwrap();
        assert_eq!(section.as_str(), "translation");
        assert_eq!(PlaybookSection::default().to_string(), "all");
    }
}
