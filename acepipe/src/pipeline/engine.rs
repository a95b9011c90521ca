//! The pipeline engine.

use super::{AcePrompt, JobReport};
use crate::capability::TextGenerator;
use crate::context::{RunContext, StageRecord, StageScope};
use crate::core::{JobDescriptor, JobPhase, StageDefinition, StageOutcome, StageSet, StageStatus};
use crate::errors::ParseFailure;
use crate::events::{
    EventSink, NoOpEventSink, JOB_COMPLETED, JOB_STARTED, PLAYBOOK_CURATED, STAGE_COMPLETED, STAGE_PARSE_FAILED,
    STAGE_SKIPPED, STAGE_SOFT_FAILED, STAGE_STARTED,
};
use crate::history::{HistoryEntry, HistoryLog, LoadedHistory};
use crate::playbook::{Curator, Playbook};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Template name bound to the formatted playbook.
pub const PLAYBOOK_BINDING: &str = "playbook";
/// Template name bound to the pretty-printed ground truth.
pub const GROUND_TRUTH_BINDING: &str = "ground_truth_json";
/// Text bound when a job has no ground truth.
pub const NO_GROUND_TRUTH: &str = "None provided.";

/// Runs jobs through a stage set and learns from them.
///
/// The engine owns the live playbook and the in-memory history log. Jobs run
/// one at a time; `&mut self` on the processing methods enforces it.
pub struct PipelineEngine {
    generator: Arc<dyn TextGenerator>,
    playbook: Playbook,
    curator: Curator,
    history: HistoryLog,
    events: Arc<dyn EventSink>,
}

impl std::fmt::Debug for PipelineEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineEngine")
            .field("playbook", &self.playbook)
            .field("curator", &self.curator)
            .field("history_len", &self.history.len())
            .finish_non_exhaustive()
    }
}

impl PipelineEngine {
    /// Creates an engine with an empty playbook and history.
    #[must_use]
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            playbook: Playbook::default(),
            curator: Curator::default(),
            history: HistoryLog::default(),
            events: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the curator.
    #[must_use]
    pub fn with_curator(mut self, curator: Curator) -> Self {
        self.curator = curator;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Sets the starting playbook.
    #[must_use]
    pub fn with_playbook(mut self, playbook: Playbook) -> Self {
        self.playbook = playbook;
        self
    }

    /// Sets the starting history.
    #[must_use]
    pub fn with_history(mut self, history: HistoryLog) -> Self {
        self.history = history;
        self
    }

    /// Resumes from a loaded history file.
    #[must_use]
    pub fn restore(self, loaded: LoadedHistory) -> Self {
        self.with_history(loaded.log).with_playbook(loaded.playbook)
    }

    /// Returns the live playbook.
    #[must_use]
    pub fn playbook(&self) -> &Playbook {
        &self.playbook
    }

    /// Returns the in-memory history.
    #[must_use]
    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    /// Runs one job and returns its finalized context.
    pub async fn process(
        &mut self,
        job_id: &str,
        stages: &StageSet,
        inputs: BTreeMap<String, Value>,
        ground_truth: Option<&Value>,
    ) -> RunContext {
        self.run(job_id, stages, inputs, ground_truth).await.context
    }

    /// Runs one job and returns the full report.
    pub async fn process_job(&mut self, job: &JobDescriptor, stages: &StageSet) -> JobReport {
        self.run(&job.id, stages, job.inputs.clone(), job.ground_truth.as_ref())
            .await
    }

    async fn run(
        &mut self,
        job_id: &str,
        stages: &StageSet,
        inputs: BTreeMap<String, Value>,
        ground_truth: Option<&Value>,
    ) -> JobReport {
        let start = Instant::now();
        let mut context = RunContext::new(job_id, inputs);
        let run_id = context.run_id();

        info!(pipeline_id = %job_id, run_id = %run_id, stages = stages.len(), "Job started");
        self.events.try_emit(
            JOB_STARTED,
            Some(json!({
                "pipeline_id": job_id,
                "run_id": run_id.to_string(),
                "stage_count": stages.len(),
            })),
        );

        let ground_truth_json = ground_truth_text(ground_truth);
        let mut phase = JobPhase::Pending;
        let mut outcomes = Vec::with_capacity(stages.len());

        for (index, stage) in stages.iter().enumerate() {
            phase = advance(job_id, phase, JobPhase::Stage(index));
            let outcome = self.run_stage(&mut context, stage, index, &ground_truth_json).await;
            let abort = outcome.is_abort();
            outcomes.push(outcome);
            if abort {
                phase = advance(job_id, phase, JobPhase::Partial);
                break;
            }
        }

        let mut playbook_updated = false;
        if phase == JobPhase::Partial {
            warn!(pipeline_id = %job_id, "Job stopped early; curation skipped");
        } else {
            phase = advance(job_id, phase, JobPhase::Curation);
            playbook_updated = self.curate(&context, stages.last());
            phase = advance(job_id, phase, JobPhase::Snapshot);
        }

        let first = stages.first();
        let ace_prompt = AcePrompt::new(first.system_prompt(), self.playbook.format(first.playbook_section()));
        context.finalize(self.playbook.clone(), ace_prompt.to_string());
        self.history.push(HistoryEntry::new(context.clone()));

        if phase != JobPhase::Partial {
            phase = advance(job_id, phase, JobPhase::Done);
        }

        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        info!(
            pipeline_id = %job_id,
            run_id = %run_id,
            phase = %phase,
            strategies = self.playbook.len(),
            duration_ms,
            "Job completed"
        );
        self.events.try_emit(
            JOB_COMPLETED,
            Some(json!({
                "pipeline_id": job_id,
                "run_id": run_id.to_string(),
                "phase": phase.to_string(),
                "playbook_updated": playbook_updated,
                "duration_ms": duration_ms,
            })),
        );

        JobReport {
            context,
            phase,
            outcomes,
            playbook_updated,
        }
    }

    async fn run_stage(
        &self,
        context: &mut RunContext,
        stage: &StageDefinition,
        index: usize,
        ground_truth_json: &str,
    ) -> StageOutcome {
        let key = stage.key();
        let pipeline_id = context.pipeline_id().to_string();

        self.events.try_emit(
            STAGE_STARTED,
            Some(json!({"pipeline_id": pipeline_id, "stage": key, "index": index})),
        );
        context.record_system_prompt(key, stage.system_prompt());

        let rendered = {
            let scope = StageScope::new(context)
                .bind(PLAYBOOK_BINDING, self.playbook.format(stage.playbook_section()))
                .bind(GROUND_TRUTH_BINDING, ground_truth_json);
            stage.template().render(&scope)
        };

        let user_prompt = match rendered {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!(pipeline_id = %pipeline_id, stage = %key, kind = e.kind(), error = %e, "Stage skipped");
                self.events.try_emit(
                    STAGE_SKIPPED,
                    Some(json!({"pipeline_id": pipeline_id, "stage": key, "reason": e.kind(), "error": e.to_string()})),
                );
                return StageOutcome::skipped(key, e.kind(), e.to_string());
            }
        };

        debug!(pipeline_id = %pipeline_id, stage = %key, temperature = stage.temperature(), "Invoking generator");
        let (record, outcome) = match self
            .generator
            .generate(stage.system_prompt(), &user_prompt, stage.temperature())
            .await
        {
            Ok(raw) => match serde_json::from_str::<Value>(&raw) {
                Ok(data) => (StageRecord::new(raw, data), StageOutcome::completed(key)),
                Err(source) => {
                    let failure = ParseFailure::new(key, raw, source);
                    error!(pipeline_id = %pipeline_id, stage = %key, error = %failure, "Stage output is not JSON; job aborted");
                    self.events.try_emit(
                        STAGE_PARSE_FAILED,
                        Some(json!({"pipeline_id": pipeline_id, "stage": key, "error": failure.source.to_string()})),
                    );
                    return StageOutcome::parse_failed(key, failure.raw, failure.source.to_string());
                }
            },
            Err(e) => {
                warn!(pipeline_id = %pipeline_id, stage = %key, kind = e.kind(), error = %e, "Generation failed; recording empty result");
                self.events.try_emit(
                    STAGE_SOFT_FAILED,
                    Some(json!({"pipeline_id": pipeline_id, "stage": key, "reason": e.kind(), "error": e.to_string()})),
                );
                (
                    StageRecord::empty(),
                    StageOutcome::soft_failed(key, e.kind(), e.to_string()),
                )
            }
        };

        if let Err(e) = context.insert_stage(key, record) {
            error!(pipeline_id = %pipeline_id, stage = %key, error = %e, "Stage result not recorded");
        }

        if outcome.status == StageStatus::Completed {
            info!(pipeline_id = %pipeline_id, stage = %key, "Stage completed");
            self.events.try_emit(
                STAGE_COMPLETED,
                Some(json!({"pipeline_id": pipeline_id, "stage": key})),
            );
        }
        outcome
    }

    /// Merges the last stage's learned patterns. Returns true if the
    /// playbook changed.
    fn curate(&mut self, context: &RunContext, last: &StageDefinition) -> bool {
        let pipeline_id = context.pipeline_id();
        let Ok(output) = context.stage_data(last.key()) else {
            info!(pipeline_id = %pipeline_id, stage = %last.key(), "Last stage produced no output; playbook unchanged");
            return false;
        };
        if !Curator::has_learned_patterns(output) {
            info!(pipeline_id = %pipeline_id, stage = %last.key(), "No learned patterns (inference run); playbook unchanged");
            return false;
        }

        let previous = self.playbook.len();
        let next = self.curator.curate(&self.playbook, output);
        let changed = next != self.playbook;
        self.playbook = next;

        info!(pipeline_id = %pipeline_id, previous, strategies = self.playbook.len(), changed, "Playbook curated");
        self.events.try_emit(
            PLAYBOOK_CURATED,
            Some(json!({
                "pipeline_id": pipeline_id,
                "previous": previous,
                "strategies": self.playbook.len(),
                "changed": changed,
            })),
        );
        changed
    }
}

fn advance(pipeline_id: &str, from: JobPhase, to: JobPhase) -> JobPhase {
    debug!(pipeline_id = %pipeline_id, from = %from, to = %to, "Job phase");
    to
}

/// Renders a job's ground truth the way stage templates see it.
///
/// Absent, `null` and empty values become [`NO_GROUND_TRUTH`]; anything else
/// is pretty JSON with two-space indentation.
#[must_use]
pub fn ground_truth_text(ground_truth: Option<&Value>) -> String {
    let is_empty = match ground_truth {
        None | Some(Value::Null) => true,
        Some(Value::Object(map)) => map.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    };
    match ground_truth {
        Some(value) if !is_empty => {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| NO_GROUND_TRUTH.to_string())
        }
        _ => NO_GROUND_TRUTH.to_string(),
    }
}
