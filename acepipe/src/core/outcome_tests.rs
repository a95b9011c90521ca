//! Tests for StageOutcome.

#[cfg(test)]
mod tests {
    use crate::core::{StageOutcome, StageStatus};
    use serde_json::json;

    #[test]
    fn test_outcome_completed() {
        let outcome = StageOutcome::completed("1_translate");
        assert_eq!(outcome.status, StageStatus::Completed);
        assert!(outcome.reason.is_none());
        assert!(!outcome.is_abort());
    }

    #[test]
    fn test_outcome_skipped_carries_kind() {
        let outcome = StageOutcome::skipped("2_critique", "missing_placeholder", "'x' is not bound");
        assert_eq!(outcome.status, StageStatus::Skipped);
        assert_eq!(outcome.reason.as_deref(), Some("missing_placeholder"));
        assert!(!outcome.is_abort());
    }

    #[test]
    fn test_outcome_soft_failed() {
        let outcome = StageOutcome::soft_failed("2_critique", "transport", "connection reset");
        assert_eq!(outcome.status, StageStatus::SoftFailed);
        assert!(outcome.status.is_recorded());
    }

    #[test]
    fn test_outcome_parse_failed_keeps_raw() {
        let outcome = StageOutcome::parse_failed("2_critique", "Sure! Here you go", "expected value");
        assert!(outcome.is_abort());
        assert_eq!(outcome.raw.as_deref(), Some("Sure! Here you go"));
    }

    #[test]
    fn test_outcome_serialization_skips_empty_fields() {
        let json = serde_json::to_value(StageOutcome::completed("1_a")).unwrap();
        assert_eq!(json, json!({"stage": "1_a", "status": "completed"}));
    }
}
