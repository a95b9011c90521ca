//! Run context management.
//!
//! This module provides:
//! - The per-job [`RunContext`] with typed stage records
//! - Named-placeholder [`Template`] rendering over a context

mod run_context;
pub mod template;

pub use run_context::{
    RunContext, StageRecord, StageScope, COMPLETED_AT_KEY, CURRENT_ACE_PROMPT_KEY, DATA_SUFFIX,
    INPUT_KEYS_KEY, JSON_SUFFIX, PIPELINE_ID_KEY, PLAYBOOK_SNAPSHOT_KEY, RUN_ID_KEY, SYSTEM_PROMPT_SUFFIX,
};
pub use template::{render, Placeholder, Scope, Template};
