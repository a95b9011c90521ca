//! Fixtures for engine, history and config tests.

use serde_json::{json, Value};
use std::path::{Path, PathBuf};

use crate::core::{JobDescriptor, StageDefinition, StageSet};

/// Builds a stage with a generated system prompt, panicking on a bad template.
#[must_use]
pub fn stage(key: &str, template: &str) -> StageDefinition {
    StageDefinition::new(key, format!("You are the {key} stage."), template)
        .unwrap_or_else(|e| panic!("fixture stage '{key}' is invalid: {e}"))
}

/// Builds a stage set, panicking if it is empty or has duplicates.
#[must_use]
pub fn stage_set(stages: impl IntoIterator<Item = StageDefinition>) -> StageSet {
    StageSet::new(stages).unwrap_or_else(|e| panic!("fixture stage set is invalid: {e}"))
}

/// A three-stage draft, critique and reflect loop in the wire format.
#[must_use]
pub fn ace_stages_json() -> Value {
    json!({
        "1_draft": {
            "system_prompt": "You write drafts.",
            "playbook_section": "all",
            "temperature": 0.3,
            "user_prompt_template": "Topic: {topic}\n\n{playbook}\n\nAnswer as {{\"draft\": \"...\"}}"
        },
        "2_critique": {
            "system_prompt": "You critique drafts.",
            "user_prompt_template": "Draft: {1_draft_json}\nReference: {ground_truth_json}"
        },
        "3_reflect": {
            "system_prompt": "You extract lessons.",
            "temperature": 0.0,
            "user_prompt_template": "Critique: {2_critique_json}\n\n{playbook}"
        }
    })
}

/// The stage set described by [`ace_stages_json`].
#[must_use]
pub fn ace_stage_set() -> StageSet {
    stage_set([
        StageDefinition::new(
            "1_draft",
            "You write drafts.",
            "Topic: {topic}\n\n{playbook}\n\nAnswer as {{\"draft\": \"...\"}}",
        )
        .map(|s| s.with_temperature(0.3))
        .unwrap_or_else(|e| panic!("{e}")),
        StageDefinition::new(
            "2_critique",
            "You critique drafts.",
            "Draft: {1_draft_json}\nReference: {ground_truth_json}",
        )
        .unwrap_or_else(|e| panic!("{e}")),
        StageDefinition::new("3_reflect", "You extract lessons.", "Critique: {2_critique_json}\n\n{playbook}")
            .map(|s| s.with_temperature(0.0))
            .unwrap_or_else(|e| panic!("{e}")),
    ])
}

/// A job with a single `topic` input.
#[must_use]
pub fn job(id: &str, topic: &str) -> JobDescriptor {
    JobDescriptor::new(id).with_input("topic", topic)
}

/// Writes a config file into `dir` and returns its path.
///
/// # Panics
///
/// Panics if the file cannot be written.
#[must_use]
pub fn write_config(dir: &Path, name: &str, config: &Value) -> PathBuf {
    let path = dir.join(name);
    let text = serde_json::to_string_pretty(config).unwrap_or_else(|e| panic!("fixture config: {e}"));
    std::fs::write(&path, text).unwrap_or_else(|e| panic!("cannot write {}: {e}", path.display()));
    path
}
