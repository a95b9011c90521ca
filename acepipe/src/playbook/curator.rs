//! Merges learned patterns into the playbook.

use super::Playbook;
use serde_json::Value;

/// Maximum number of strategies a playbook retains by default.
pub const DEFAULT_PLAYBOOK_CAPACITY: usize = 10;

/// Field of the last stage's output that carries new strategies.
pub const LEARNED_PATTERNS_KEY: &str = "learned_patterns";

/// Deduplicating, size-bounded playbook updater.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Curator {
    capacity: usize,
}

impl Default for Curator {
    fn default() -> Self {
        Self::new(DEFAULT_PLAYBOOK_CAPACITY)
    }
}

impl Curator {
    /// Creates a curator that keeps at most `capacity` strategies.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }

    /// Returns the capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns true if the output carries a `learned_patterns` field.
    #[must_use]
    pub fn has_learned_patterns(output: &Value) -> bool {
        output.get(LEARNED_PATTERNS_KEY).is_some()
    }

    /// Produces the playbook that results from merging `output`'s learned
    /// patterns into `playbook`.
    ///
    /// New patterns are appended in order when not already present, then the
    /// oldest entries are dropped until the capacity holds. A missing or empty
    /// `learned_patterns` field returns the playbook unchanged.
    #[must_use]
    pub fn curate(&self, playbook: &Playbook, output: &Value) -> Playbook {
        let mut next = playbook.clone();

        let patterns = match output.get(LEARNED_PATTERNS_KEY) {
            None | Some(Value::Null) => return next,
            Some(Value::Array(items)) => items,
            Some(other) => {
                tracing::warn!(value = %other, "'learned_patterns' is not an array; playbook unchanged");
                return next;
            }
        };

        for item in patterns {
            let Some(pattern) = item.as_str() else {
                tracing::warn!(value = %item, "Ignoring non-string learned pattern");
                continue;
            };
            if next.contains(pattern) {
                tracing::debug!(pattern, "Learned pattern already in playbook");
                continue;
            }
            tracing::info!(pattern = %truncate_for_log(pattern), "Added process strategy");
            next.push(pattern.to_string());
        }

        next.truncate_oldest(self.capacity);
        tracing::info!(strategies = next.len(), "Playbook curated");
        next
    }
}

fn truncate_for_log(pattern: &str) -> String {
    const LIMIT: usize = 80;
    match pattern.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}...", &pattern[..idx]),
        None => pattern.to_string(),
    }
}
