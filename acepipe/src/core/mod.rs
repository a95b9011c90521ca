//! Core domain model types for acepipe.
//!
//! This module contains the fundamental types the engine is driven by:
//! - Stage definitions and the ordered stage set
//! - Job descriptors
//! - Stage status, job phase and per-stage outcomes

mod job;
mod outcome;
#[cfg(test)]
mod outcome_tests;
mod stage;
mod status;

pub use job::JobDescriptor;
pub use outcome::StageOutcome;
pub use stage::{StageDefinition, StageSet, DEFAULT_TEMPERATURE};
pub use status::{JobPhase, StageStatus};
