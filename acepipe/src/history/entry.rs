//! History entries and the in-memory log.

use crate::context::RunContext;
use crate::pipeline::AcePrompt;
use crate::playbook::Playbook;
use serde::{Deserialize, Serialize};

/// One finalized run, stored in its flat wire form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryEntry(RunContext);

impl HistoryEntry {
    /// Wraps a run context.
    #[must_use]
    pub fn new(context: RunContext) -> Self {
        Self(context)
    }

    /// Returns the run context.
    #[must_use]
    pub fn context(&self) -> &RunContext {
        &self.0
    }

    /// Unwraps the run context.
    #[must_use]
    pub fn into_context(self) -> RunContext {
        self.0
    }

    /// Returns the job id.
    #[must_use]
    pub fn pipeline_id(&self) -> &str {
        self.0.pipeline_id()
    }

    /// Returns the playbook as it stood after this run.
    #[must_use]
    pub fn playbook_snapshot(&self) -> Option<&Playbook> {
        self.0.playbook_snapshot()
    }

    /// Returns the next-run seed prompt split into its parts.
    #[must_use]
    pub fn ace_prompt(&self) -> Option<AcePrompt> {
        self.0.current_ace_prompt().and_then(AcePrompt::parse)
    }
}

impl From<RunContext> for HistoryEntry {
    fn from(context: RunContext) -> Self {
        Self::new(context)
    }
}

/// Ordered, append-only list of runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryLog {
    entries: Vec<HistoryEntry>,
}

impl HistoryLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
    }

    /// Returns the number of runs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no run has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the most recent entry.
    #[must_use]
    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    /// Iterates entries oldest first.
    pub fn iter(&self) -> std::slice::Iter<'_, HistoryEntry> {
        self.entries.iter()
    }

    /// Returns the playbook snapshot of the most recent entry.
    #[must_use]
    pub fn latest_playbook(&self) -> Option<&Playbook> {
        self.last().and_then(HistoryEntry::playbook_snapshot)
    }

    /// Returns the seed prompt of the most recent entry.
    #[must_use]
    pub fn latest_ace_prompt(&self) -> Option<AcePrompt> {
        self.last().and_then(HistoryEntry::ace_prompt)
    }
}

impl<'a> IntoIterator for &'a HistoryLog {
    type Item = &'a HistoryEntry;
    type IntoIter = std::slice::Iter<'a, HistoryEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl FromIterator<HistoryEntry> for HistoryLog {
    fn from_iter<I: IntoIterator<Item = HistoryEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn finalized(id: &str, strategies: &[&str]) -> HistoryEntry {
        let mut ctx = RunContext::new(id, BTreeMap::new());
        let prompt = AcePrompt::new("sys", "pb").to_string();
        ctx.finalize(Playbook::from_strategies(strategies.iter().copied()), prompt);
        HistoryEntry::new(ctx)
    }

    #[test]
    fn test_log_is_ordered() {
        let mut log = HistoryLog::new();
        assert!(log.latest_playbook().is_none());
        log.push(finalized("a", &["1"]));
        log.push(finalized("b", &["1", "2"]));

        let ids: Vec<_> = log.iter().map(HistoryEntry::pipeline_id).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(log.latest_playbook().map(Playbook::len), Some(2));
    }

    #[test]
    fn test_latest_ace_prompt() {
        let log: HistoryLog = [finalized("a", &[])].into_iter().collect();
        let prompt = log.latest_ace_prompt().unwrap();
        assert_eq!(prompt.system_prompt, "sys");
        assert_eq!(prompt.playbook, "pb");
    }

    #[test]
    fn test_log_serializes_as_array() {
        let log: HistoryLog = [finalized("a", &["x"])].into_iter().collect();
        let value = serde_json::to_value(&log).unwrap();
        assert!(value.is_array());
        assert_eq!(value[0]["pipeline_id"], "a");
        assert_eq!(value[0]["playbook_snapshot"]["process_strategies"][0], "x");
    }
}
