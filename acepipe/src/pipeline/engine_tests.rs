//! End-to-end tests for the pipeline engine.

#[cfg(test)]
mod tests {
    use crate::capability::MockTextGenerator;
    use crate::core::{JobDescriptor, JobPhase, StageStatus};
    use crate::errors::GenerationError;
    use crate::events::{
        CollectingEventSink, JOB_COMPLETED, JOB_STARTED, PLAYBOOK_CURATED, STAGE_COMPLETED, STAGE_SKIPPED,
        STAGE_SOFT_FAILED, STAGE_STARTED,
    };
    use crate::history::HistoryStore;
    use crate::pipeline::{AcePrompt, PipelineEngine, NO_GROUND_TRUTH};
    use crate::playbook::{Curator, Playbook, DEFAULT_PLAYBOOK_CAPACITY};
    use crate::testing::{ace_stage_set, job, stage, stage_set, ScriptedGenerator};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn abc_stages() -> crate::core::StageSet {
        stage_set([
            stage("1_a", "Topic: {topic}"),
            stage("2_b", "Previous: {1_a_json}"),
            stage("3_c", "Score: {2_b_data[score]}"),
        ])
    }

    fn topic_inputs() -> BTreeMap<String, serde_json::Value> {
        let mut inputs = BTreeMap::new();
        inputs.insert("topic".to_string(), json!("harbor"));
        inputs
    }

    #[tokio::test]
    async fn test_stages_run_in_lexicographic_order() {
        let generator = Arc::new(ScriptedGenerator::with_responses(["{}", "{}", "{}"]));
        let mut engine = PipelineEngine::new(generator.clone());
        let stages = stage_set([stage("b_second", "x"), stage("c_third", "x"), stage("a_first", "x")]);

        engine.process_job(&JobDescriptor::new("order"), &stages).await;

        let systems: Vec<_> = generator.calls().into_iter().map(|c| c.system_prompt).collect();
        assert_eq!(
            systems,
            vec![
                "You are the a_first stage.",
                "You are the b_second stage.",
                "You are the c_third stage."
            ]
        );
    }

    #[tokio::test]
    async fn test_learned_patterns_are_appended() {
        let generator = Arc::new(ScriptedGenerator::with_responses([
            r#"{"draft": "d"}"#,
            r#"{"score": 7}"#,
            r#"{"learned_patterns": ["X", "Y"]}"#,
        ]));
        let mut engine = PipelineEngine::new(generator).with_playbook(Playbook::from_strategies(["Old"]));

        let report = engine.process_job(&job("j1", "rain"), &abc_stages()).await;

        assert_eq!(report.phase, JobPhase::Done);
        assert!(report.playbook_updated);
        let snapshot = report.context.playbook_snapshot().unwrap();
        assert_eq!(snapshot.strategies(), ["Old".to_string(), "X".to_string(), "Y".to_string()]);
        assert_eq!(engine.playbook(), snapshot);
    }

    #[tokio::test]
    async fn test_snapshot_trimmed_to_capacity() {
        let existing: Vec<String> = (1..=DEFAULT_PLAYBOOK_CAPACITY).map(|i| format!("S{i}")).collect();
        let generator = Arc::new(ScriptedGenerator::with_responses([
            "{}",
            r#"{"score": 1}"#,
            r#"{"learned_patterns": ["X", "Y"]}"#,
        ]));
        let mut engine = PipelineEngine::new(generator).with_playbook(Playbook::from_strategies(existing));

        let ctx = engine.process("j", &abc_stages(), topic_inputs(), None).await;

        let strategies = ctx.playbook_snapshot().unwrap().strategies();
        assert_eq!(strategies.len(), DEFAULT_PLAYBOOK_CAPACITY);
        assert_eq!(&strategies[DEFAULT_PLAYBOOK_CAPACITY - 2..], ["X".to_string(), "Y".to_string()]);
        assert_eq!(strategies[0], "S3");
    }

    #[tokio::test]
    async fn test_no_learned_patterns_leaves_playbook_unchanged() {
        let before = Playbook::from_strategies(["Keep"]);
        let generator = Arc::new(ScriptedGenerator::with_responses(["{}", r#"{"score": 2}"#, r#"{"verdict": "ok"}"#]));
        let mut engine = PipelineEngine::new(generator).with_playbook(before.clone());

        let report = engine.process_job(&job("j", "t"), &abc_stages()).await;

        assert!(!report.playbook_updated);
        assert_eq!(engine.playbook(), &before);
        assert_eq!(report.context.playbook_snapshot(), Some(&before));
    }

    #[tokio::test]
    async fn test_unbound_placeholder_skips_stage_and_continues() {
        let generator = Arc::new(ScriptedGenerator::with_responses(["{}", "{}"]));
        let mut engine = PipelineEngine::new(generator.clone());
        let stages = stage_set([
            stage("1_a", "Needs {missing_input}"),
            stage("2_b", "Fine"),
            stage("3_c", "Also fine"),
        ]);

        let report = engine.process_job(&JobDescriptor::new("skip"), &stages).await;

        assert_eq!(report.stages_with_status(StageStatus::Skipped), vec!["1_a"]);
        assert!(!report.context.has_stage("1_a"));
        assert!(report.context.get("1_a_json").is_none());
        assert!(report.context.get("1_a_data").is_none());
        assert!(report.context.has_stage("2_b"));
        assert!(report.context.has_stage("3_c"));
        assert_eq!(generator.call_count(), 2);
        assert_eq!(report.phase, JobPhase::Done);
        // the system prompt is recorded before rendering
        assert_eq!(report.context.system_prompt("1_a"), Some("You are the 1_a stage."));
    }

    #[tokio::test]
    async fn test_transport_error_then_missing_field_skips_last_stage() {
        let mut mock = MockTextGenerator::new();
        let mut seq = mockall::Sequence::new();
        mock.expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(r#"{"draft": "first"}"#.to_string()));
        mock.expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Err(GenerationError::transport("connection reset")));

        let before = Playbook::from_strategies(["Existing"]);
        let mut engine = PipelineEngine::new(Arc::new(mock)).with_playbook(before.clone());

        let report = engine.process_job(&job("soft", "t"), &abc_stages()).await;

        let ctx = &report.context;
        assert_eq!(ctx.stage_data("1_a").unwrap(), &json!({"draft": "first"}));
        assert_eq!(ctx.stage_data("2_b").unwrap(), &json!({}));
        assert_eq!(ctx.stage_raw("2_b").unwrap(), "{}");
        assert!(!ctx.has_stage("3_c"));
        assert!(ctx.get("3_c_json").is_none());
        assert_eq!(report.outcome("2_b").map(|o| o.status), Some(StageStatus::SoftFailed));
        assert_eq!(report.outcome("3_c").map(|o| o.status), Some(StageStatus::Skipped));
        assert_eq!(engine.playbook(), &before);
        assert_eq!(report.phase, JobPhase::Done);
    }

    #[tokio::test]
    async fn test_parse_failure_aborts_job_but_is_recorded() {
        let generator = Arc::new(ScriptedGenerator::with_responses([
            r#"{"draft": "ok"}"#,
            "Sure! Here is the critique you asked for.",
            r#"{"learned_patterns": ["never reached"]}"#,
        ]));
        let before = Playbook::from_strategies(["A"]);
        let mut engine = PipelineEngine::new(generator.clone()).with_playbook(before.clone());

        let report = engine.process_job(&job("abort", "t"), &abc_stages()).await;

        assert_eq!(report.phase, JobPhase::Partial);
        assert!(report.is_partial());
        assert_eq!(generator.call_count(), 2);
        assert_eq!(generator.remaining(), 1);
        assert!(!report.context.has_stage("2_b"));
        assert!(report.outcome("3_c").is_none());
        let failed = report.outcome("2_b").unwrap();
        assert_eq!(failed.raw.as_deref(), Some("Sure! Here is the critique you asked for."));

        assert_eq!(engine.playbook(), &before);
        assert_eq!(engine.history().len(), 1);
        assert_eq!(report.context.playbook_snapshot(), Some(&before));
        assert!(report.context.current_ace_prompt().is_some());
    }

    #[tokio::test]
    async fn test_playbook_and_ground_truth_bindings() {
        let generator = Arc::new(ScriptedGenerator::with_responses([
            r#"{"draft": "d"}"#,
            r#"{"notes": []}"#,
            r#"{"learned_patterns": ["Use concrete imagery."]}"#,
        ]));
        let mut engine = PipelineEngine::new(generator.clone());
        let stages = ace_stage_set();

        let first = job("gt-1", "spring").with_ground_truth(json!({"title_en": "春望 → Spring View"}));
        engine.process_job(&first, &stages).await;
        engine.process_job(&job("gt-2", "autumn"), &stages).await;

        let calls = generator.calls();
        assert!(calls[0].user_prompt.contains("No strategies learned yet. This is your first attempt."));
        assert!(calls[0].user_prompt.ends_with("Answer as {\"draft\": \"...\"}"));
        assert!(calls[1].user_prompt.contains("Draft: {\"draft\": \"d\"}"));
        assert!(calls[1]
            .user_prompt
            .contains("Reference: {\n  \"title_en\": \"春望 → Spring View\"\n}"));
        assert!((calls[0].temperature - 0.3).abs() < f64::EPSILON);
        assert!(calls[2].temperature.abs() < f64::EPSILON);

        // second job sees the learned strategy and has no ground truth
        assert!(calls[3].user_prompt.contains("1. Use concrete imagery."));
        assert!(calls[4].user_prompt.ends_with(NO_GROUND_TRUTH));
    }

    #[tokio::test]
    async fn test_ace_prompt_uses_first_stage() {
        let generator = Arc::new(ScriptedGenerator::with_responses([
            "{}",
            "{}",
            r#"{"learned_patterns": ["Be brief."]}"#,
        ]));
        let mut engine = PipelineEngine::new(generator);

        let ctx = engine.process("p", &ace_stage_set(), topic_inputs(), None).await;
        let prompt = AcePrompt::parse(ctx.current_ace_prompt().unwrap()).unwrap();

        assert_eq!(prompt.system_prompt, "You write drafts.");
        assert_eq!(
            prompt.playbook,
            "PROCESS STRATEGIES (learned from previous critiques):\n1. Be brief.\n"
        );
        assert!(ctx.completed_at().is_some());
    }

    #[tokio::test]
    async fn test_events_follow_the_job() {
        let sink = Arc::new(CollectingEventSink::new());
        let generator = Arc::new(ScriptedGenerator::with_responses(["{}", r#"{"learned_patterns": ["Z"]}"#]));
        let mut engine = PipelineEngine::new(generator).with_event_sink(sink.clone());
        let stages = stage_set([
            stage("1_a", "{absent}"),
            stage("2_b", "ok"),
            stage("3_c", "ok"),
        ]);
        // 2_b consumes "{}", 3_c consumes the patterns
        engine.process_job(&JobDescriptor::new("ev"), &stages).await;

        assert_eq!(
            sink.event_types(),
            vec![
                JOB_STARTED,
                STAGE_STARTED,
                STAGE_SKIPPED,
                STAGE_STARTED,
                STAGE_COMPLETED,
                STAGE_STARTED,
                STAGE_COMPLETED,
                PLAYBOOK_CURATED,
                JOB_COMPLETED,
            ]
        );
        let done = sink.events_of_type(JOB_COMPLETED);
        assert_eq!(done[0].field("phase"), Some("done"));
    }

    #[tokio::test]
    async fn test_soft_failure_event() {
        let sink = Arc::new(CollectingEventSink::new());
        let generator = Arc::new(ScriptedGenerator::new());
        let mut engine = PipelineEngine::new(generator).with_event_sink(sink.clone());

        let report = engine
            .process_job(&JobDescriptor::new("soft"), &stage_set([stage("1_a", "x")]))
            .await;

        assert_eq!(sink.events_of_type(STAGE_SOFT_FAILED).len(), 1);
        assert_eq!(report.outcome("1_a").and_then(|o| o.reason.as_deref()), Some("transport"));
    }

    #[tokio::test]
    async fn test_custom_curator_capacity() {
        let generator = Arc::new(ScriptedGenerator::with_responses([r#"{"learned_patterns": ["A", "B", "C"]}"#]));
        let mut engine = PipelineEngine::new(generator).with_curator(Curator::new(2));

        engine
            .process_job(&JobDescriptor::new("cap"), &stage_set([stage("only", "x")]))
            .await;

        assert_eq!(engine.playbook().strategies(), ["B".to_string(), "C".to_string()]);
    }

    #[tokio::test]
    async fn test_learning_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("run_history.json"));

        let generator = Arc::new(ScriptedGenerator::with_responses([
            "{}",
            "{}",
            r#"{"learned_patterns": ["Check meter first."]}"#,
        ]));
        let mut engine = PipelineEngine::new(generator).restore(store.load().unwrap());
        engine.process_job(&job("first", "t"), &ace_stage_set()).await;
        store.save(engine.history()).unwrap();
        let in_memory = engine.playbook().clone();

        let restarted = PipelineEngine::new(Arc::new(ScriptedGenerator::new())).restore(store.load().unwrap());
        assert_eq!(restarted.playbook(), &in_memory);
        assert_eq!(restarted.history().len(), 1);
    }
}
