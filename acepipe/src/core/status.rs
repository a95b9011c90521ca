//! Stage status and job phase enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a single stage ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// The capability answered with valid JSON and the result was recorded.
    Completed,
    /// The template could not be rendered; nothing was recorded.
    Skipped,
    /// The capability call failed; the empty result was recorded.
    SoftFailed,
    /// The capability answered with unparseable text; the job stopped.
    ParseFailed,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Skipped => write!(f, "skipped"),
            Self::SoftFailed => write!(f, "soft_failed"),
            Self::ParseFailed => write!(f, "parse_failed"),
        }
    }
}

impl StageStatus {
    /// Returns true if a record for the stage exists in the context.
    #[must_use]
    pub fn is_recorded(&self) -> bool {
        matches!(self, Self::Completed | Self::SoftFailed)
    }

    /// Returns true if the status stops the job.
    #[must_use]
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::ParseFailed)
    }
}

/// Where a job is in its lifecycle.
///
/// `Pending -> Stage(0) -> ... -> Stage(n-1) -> Curation -> Snapshot -> Done`,
/// or `Stage(i) -> Partial` when a stage returns unparseable output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    /// Not started.
    Pending,
    /// Executing the stage at this index.
    Stage(usize),
    /// Merging learned patterns into the playbook.
    Curation,
    /// Recording the playbook snapshot and next-run prompt.
    Snapshot,
    /// Finished normally.
    Done,
    /// Stopped early after a parse failure.
    Partial,
}

impl Default for JobPhase {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Stage(i) => write!(f, "stage({i})"),
            Self::Curation => write!(f, "curation"),
            Self::Snapshot => write!(f, "snapshot"),
            Self::Done => write!(f, "done"),
            Self::Partial => write!(f, "partial"),
        }
    }
}

impl JobPhase {
    /// Returns true if the phase is terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Partial)
    }
}
