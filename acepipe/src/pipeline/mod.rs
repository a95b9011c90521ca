//! Pipeline execution.
//!
//! This module provides:
//! - The engine that runs one job through an ordered stage set
//! - Per-job reports
//! - The next-run seed prompt

mod ace_prompt;
mod engine;
#[cfg(test)]
mod engine_tests;
mod report;

pub use ace_prompt::{AcePrompt, PLAYBOOK_MARKER, SYSTEM_PROMPT_MARKER};
pub use engine::{ground_truth_text, PipelineEngine, GROUND_TRUTH_BINDING, NO_GROUND_TRUTH, PLAYBOOK_BINDING};
pub use report::JobReport;
