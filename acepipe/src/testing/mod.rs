//! Testing utilities for acepipe pipelines.
//!
//! This module provides:
//! - Scripted and failing text generators
//! - Stage set and job fixtures
//! - Assertions over job reports

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{assert_playbook_eq, assert_stage_recorded, assert_stage_status, assert_stages_absent};
pub use fixtures::{ace_stage_set, ace_stages_json, job, stage, stage_set, write_config};
pub use mocks::{FailingGenerator, GenerationCall, ScriptedGenerator};
