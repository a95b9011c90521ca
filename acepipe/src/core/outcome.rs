//! Per-stage outcomes with factory methods.

use super::StageStatus;
use serde::{Deserialize, Serialize};

/// What happened to one stage of a job.
///
/// Outcomes are immutable once created. The engine produces exactly one per
/// stage it reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOutcome {
    /// The stage key.
    pub stage: String,

    /// How the stage ended.
    pub status: StageStatus,

    /// Failure kind for skipped and soft-failed stages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human readable detail (error message).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// Raw capability text for parse failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl StageOutcome {
    fn with_status(stage: impl Into<String>, status: StageStatus) -> Self {
        Self {
            stage: stage.into(),
            status,
            reason: None,
            detail: None,
            raw: None,
        }
    }

    /// The stage result was recorded.
    #[must_use]
    pub fn completed(stage: impl Into<String>) -> Self {
        Self::with_status(stage, StageStatus::Completed)
    }

    /// The stage template could not be rendered.
    #[must_use]
    pub fn skipped(stage: impl Into<String>, reason: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            detail: Some(detail.into()),
            ..Self::with_status(stage, StageStatus::Skipped)
        }
    }

    /// The capability call failed and the empty result was recorded.
    #[must_use]
    pub fn soft_failed(stage: impl Into<String>, reason: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            detail: Some(detail.into()),
            ..Self::with_status(stage, StageStatus::SoftFailed)
        }
    }

    /// The capability returned text that is not JSON.
    #[must_use]
    pub fn parse_failed(stage: impl Into<String>, raw: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            detail: Some(detail.into()),
            raw: Some(raw.into()),
            ..Self::with_status(stage, StageStatus::ParseFailed)
        }
    }

    /// Returns true if the stage stopped the job.
    #[must_use]
    pub fn is_abort(&self) -> bool {
        self.status.is_abort()
    }
}
