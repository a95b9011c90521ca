//! Engine lifecycle events.
//!
//! The engine reports every job and stage transition to an injected
//! [`EventSink`]. Sinks never fail the job; they are a side channel for
//! logging, monitoring and tests.

mod sink;

pub use sink::{CollectingEventSink, EventRecord, EventSink, LoggingEventSink, NoOpEventSink};

/// A job began; data carries `pipeline_id`, `run_id` and `stage_count`.
pub const JOB_STARTED: &str = "job.started";
/// A stage began; data carries `stage` and `index`.
pub const STAGE_STARTED: &str = "stage.started";
/// A stage result was recorded.
pub const STAGE_COMPLETED: &str = "stage.completed";
/// A stage was skipped because its template could not be rendered.
pub const STAGE_SKIPPED: &str = "stage.skipped";
/// A capability call failed and the empty result was recorded.
pub const STAGE_SOFT_FAILED: &str = "stage.soft_failed";
/// A stage returned unparseable text and the job stopped.
pub const STAGE_PARSE_FAILED: &str = "stage.parse_failed";
/// The playbook was replaced by the curator.
pub const PLAYBOOK_CURATED: &str = "playbook.curated";
/// A job finished; data carries the terminal `phase`.
pub const JOB_COMPLETED: &str = "job.completed";

/// Returns true for event types that report a problem.
#[must_use]
pub fn is_failure_event(event_type: &str) -> bool {
    matches!(event_type, STAGE_SKIPPED | STAGE_SOFT_FAILED | STAGE_PARSE_FAILED)
}
