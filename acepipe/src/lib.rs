//! # Acepipe
//!
//! Analyze-Critique-Execute pipelines with a self-curating playbook.
//!
//! Acepipe runs a job through an ordered set of template-driven stages, each
//! calling a text-generation backend and recording structured JSON output.
//! The last stage may report `learned_patterns`; these are merged into a
//! bounded playbook that is injected into every later prompt. The full run
//! history is persisted so learning survives restarts.
//!
//! - **Stages**: named-placeholder templates rendered against the run context
//! - **Skip versus abort**: unbound placeholders skip a stage, unparseable
//!   output stops the job, backend failures record an empty result
//! - **Playbook**: deduplicated, newest-first bounded strategy list
//! - **History**: append-only log, atomically rewritten after every job
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use acepipe::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example(generator: Arc<dyn TextGenerator>) -> Result<(), AceError> {
//! let config = PipelineConfig::load("poems.json")?;
//! let store = HistoryStore::new(history_path_for("poems.json"));
//!
//! let mut engine = PipelineEngine::new(generator).restore(store.load()?);
//! for job in config.jobs() {
//!     let report = engine.process_job(job, config.stages()).await;
//!     println!("{} -> {}", report.pipeline_id(), report.phase);
//!     store.save(engine.history())?;
//! }
//! # Ok(()) }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod capability;
pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod history;
pub mod observability;
pub mod pipeline;
pub mod playbook;
pub mod runner;
pub mod testing;
pub mod utils;

pub use errors::{AceError, AceResult};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::capability::TextGenerator;
    pub use crate::config::{history_path_for, PipelineConfig, StageConfig};
    pub use crate::context::{RunContext, StageRecord};
    pub use crate::core::{JobDescriptor, JobPhase, StageDefinition, StageOutcome, StageSet, StageStatus};
    pub use crate::errors::{
        AceError, AceResult, ConfigError, ContextError, GenerationError, ParseFailure, PersistenceError,
        TemplateError,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::history::{evolution_report, HistoryEntry, HistoryLog, HistoryStore, LoadedHistory};
    pub use crate::pipeline::{AcePrompt, JobReport, PipelineEngine};
    pub use crate::playbook::{Curator, Playbook, PlaybookSection};
    pub use crate::runner::{run_config_file, BatchRunner, BatchSummary};
}
