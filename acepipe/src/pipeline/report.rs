//! Per-job result returned by the engine.

use crate::context::RunContext;
use crate::core::{JobPhase, StageOutcome, StageStatus};
use serde_json::Value;

/// Everything the engine knows about one finished job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobReport {
    /// The finalized run context, as appended to history.
    pub context: RunContext,
    /// Terminal phase: `Done` or `Partial`.
    pub phase: JobPhase,
    /// One outcome per stage reached, in execution order.
    pub outcomes: Vec<StageOutcome>,
    /// True if curation changed the playbook.
    pub playbook_updated: bool,
}

impl JobReport {
    /// Returns the job id.
    #[must_use]
    pub fn pipeline_id(&self) -> &str {
        self.context.pipeline_id()
    }

    /// Returns true if a parse failure stopped the job.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.phase == JobPhase::Partial
    }

    /// Returns the outcome for a stage, if it was reached.
    #[must_use]
    pub fn outcome(&self, stage: &str) -> Option<&StageOutcome> {
        self.outcomes.iter().find(|o| o.stage == stage)
    }

    /// Returns the keys of stages with the given status.
    #[must_use]
    pub fn stages_with_status(&self, status: StageStatus) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.status == status)
            .map(|o| o.stage.as_str())
            .collect()
    }

    /// Returns a stage's parsed output, if recorded.
    #[must_use]
    pub fn stage_data(&self, stage: &str) -> Option<&Value> {
        self.context.stage_data(stage).ok()
    }
}
