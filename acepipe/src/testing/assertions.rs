//! Assertions over job reports.

use crate::core::StageStatus;
use crate::pipeline::JobReport;
use crate::playbook::Playbook;

/// Asserts that a stage ended with the expected status.
pub fn assert_stage_status(report: &JobReport, stage: &str, expected: StageStatus) {
    let actual = report.outcome(stage).map(|o| o.status);
    assert_eq!(
        actual,
        Some(expected),
        "Expected stage '{stage}' to be {expected}, got {actual:?}"
    );
}

/// Asserts that a stage has both `_json` and `_data` entries in the context.
pub fn assert_stage_recorded(report: &JobReport, stage: &str) {
    assert!(
        report.context.has_stage(stage),
        "Expected stage '{}' to be recorded. Recorded: {:?}",
        stage,
        report.context.stage_keys().collect::<Vec<_>>()
    );
}

/// Asserts that none of the stages left entries in the context.
pub fn assert_stages_absent(report: &JobReport, stages: &[&str]) {
    for stage in stages {
        assert!(
            report.context.get(&format!("{stage}_json")).is_none()
                && report.context.get(&format!("{stage}_data")).is_none(),
            "Expected no entries for stage '{stage}'"
        );
    }
}

/// Asserts that a playbook holds exactly the given strategies, in order.
pub fn assert_playbook_eq(playbook: &Playbook, expected: &[&str]) {
    let actual: Vec<&str> = playbook.strategies().iter().map(String::as_str).collect();
    assert_eq!(actual, expected, "Playbook strategies differ");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineEngine;
    use crate::testing::{job, stage, stage_set, ScriptedGenerator};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_assertions_on_a_real_report() {
        let generator = Arc::new(ScriptedGenerator::with_responses([r#"{"learned_patterns": ["L"]}"#]));
        let mut engine = PipelineEngine::new(generator);
        let stages = stage_set([stage("1_a", "{nope}"), stage("2_b", "{topic}")]);

        let report = engine.process_job(&job("j", "sea"), &stages).await;

        assert_stage_status(&report, "1_a", StageStatus::Skipped);
        assert_stage_status(&report, "2_b", StageStatus::Completed);
        assert_stage_recorded(&report, "2_b");
        assert_stages_absent(&report, &["1_a"]);
        assert_playbook_eq(engine.playbook(), &["L"]);
    }

    #[tokio::test]
    #[should_panic(expected = "Expected stage '1_a' to be completed")]
    async fn test_status_assertion_fails() {
        let mut engine = PipelineEngine::new(Arc::new(ScriptedGenerator::new()));
        let report = engine.process_job(&job("j", "x"), &stage_set([stage("1_a", "{nope}")])).await;
        assert_stage_status(&report, "1_a", StageStatus::Completed);
    }
}
