//! Batch execution of a configuration file.
//!
//! The runner loads the history next to the config, runs every job in
//! order and checkpoints the history after each job.

use crate::capability::TextGenerator;
use crate::config::{history_path_for, PipelineConfig};
use crate::core::JobPhase;
use crate::events::EventSink;
use crate::history::{evolution_report, HistoryStore};
use crate::pipeline::PipelineEngine;
use anyhow::Context as _;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

/// The kept result of one job: the first stage's parsed output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobResult {
    /// Job id.
    pub job_id: String,
    /// Terminal phase.
    pub phase: JobPhase,
    /// Parsed output of the first stage, `{}` if it produced none.
    pub data: Value,
}

/// Results of a whole batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    /// Key of the stage whose output is reported.
    pub first_stage: String,
    /// One result per job, in config order.
    pub results: Vec<JobResult>,
    /// Number of history checkpoints that failed.
    pub save_failures: usize,
}

impl BatchSummary {
    /// Renders the results as readable text with 4-space indented JSON.
    #[must_use]
    pub fn render(&self) -> String {
        let rule = "=".repeat(60);
        let mut out = format!("{rule}\nFINAL RESULTS (from stage: {})\n{rule}\n", self.first_stage);
        for result in &self.results {
            out.push_str("\n----------------------------------\n");
            out.push_str(&pretty_json(&result.data, b"    "));
            out.push('\n');
        }
        out
    }

    /// Returns the number of jobs that stopped early.
    #[must_use]
    pub fn partial_jobs(&self) -> usize {
        self.results.iter().filter(|r| r.phase == JobPhase::Partial).count()
    }
}

fn pretty_json(value: &Value, indent: &[u8]) -> String {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent);
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    if value.serialize(&mut serializer).is_err() {
        return value.to_string();
    }
    String::from_utf8(buf).unwrap_or_else(|_| value.to_string())
}

/// Runs jobs against an engine and persists history after each one.
#[derive(Debug)]
pub struct BatchRunner {
    engine: PipelineEngine,
    store: HistoryStore,
}

impl BatchRunner {
    /// Creates a runner whose engine resumes from the store's history.
    ///
    /// An unreadable history file is moved to the store's backup path and
    /// the run starts with an empty history.
    #[must_use]
    pub fn new(generator: Arc<dyn TextGenerator>, store: HistoryStore) -> Self {
        let engine = PipelineEngine::new(generator).restore(store.load_or_default());
        Self { engine, store }
    }

    /// Creates a runner around an already configured engine.
    #[must_use]
    pub fn from_engine(engine: PipelineEngine, store: HistoryStore) -> Self {
        Self { engine, store }
    }

    /// Sets the engine's event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.engine = self.engine.with_event_sink(events);
        self
    }

    /// Returns the engine.
    #[must_use]
    pub fn engine(&self) -> &PipelineEngine {
        &self.engine
    }

    /// Returns the history store.
    #[must_use]
    pub fn store(&self) -> &HistoryStore {
        &self.store
    }

    /// Runs every job in the configuration.
    ///
    /// Job failures never stop the batch; save failures are logged and
    /// counted.
    pub async fn run(&mut self, config: &PipelineConfig) -> BatchSummary {
        let first_stage = config.stages().first().key().to_string();
        info!(first_stage = %first_stage, jobs = config.jobs().len(), "Batch started");

        let mut results = Vec::with_capacity(config.jobs().len());
        let mut save_failures = 0;

        for job in config.jobs() {
            info!(job_id = %job.id, "Processing job");
            let report = self.engine.process_job(job, config.stages()).await;

            results.push(JobResult {
                job_id: job.id.clone(),
                phase: report.phase,
                data: report
                    .stage_data(&first_stage)
                    .cloned()
                    .unwrap_or_else(|| Value::Object(Map::new())),
            });

            if let Err(e) = self.store.save(self.engine.history()) {
                save_failures += 1;
                error!(job_id = %job.id, error = %e, "Failed to save history; continuing");
            }
            info!(job_id = %job.id, phase = %report.phase, "Completed job");
        }

        BatchSummary {
            first_stage,
            results,
            save_failures,
        }
    }

    /// Renders the playbook evolution for everything run so far.
    #[must_use]
    pub fn evolution_report(&self) -> String {
        evolution_report(self.engine.history(), self.engine.playbook())
    }
}

/// Loads a configuration file, runs it, and logs the results.
///
/// History is read from and written to `<config stem>_history.json`.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded.
pub async fn run_config_file(
    config_path: impl AsRef<Path>,
    generator: Arc<dyn TextGenerator>,
) -> anyhow::Result<BatchSummary> {
    let config_path = config_path.as_ref();
    let config = PipelineConfig::load(config_path)
        .with_context(|| format!("loading pipeline config {}", config_path.display()))?;

    let store = HistoryStore::new(history_path_for(config_path));
    let mut runner = BatchRunner::new(generator, store);
    let summary = runner.run(&config).await;

    info!("\n{}", summary.render());
    info!("\n{}", runner.evolution_report());
    Ok(summary)
}
