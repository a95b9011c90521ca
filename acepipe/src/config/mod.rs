//! Pipeline configuration files.
//!
//! A configuration is a JSON object with two required keys:
//!
//! ```json
//! {
//!   "STAGES": {
//!     "1_translate": {
//!       "system_prompt": "You are a translator.",
//!       "playbook_section": "all",
//!       "temperature": 0.1,
//!       "user_prompt_template": "Translate {title_cn}.\n\n{playbook}"
//!     }
//!   },
//!   "JOBS": [{"id": "job-1", "inputs": {"title_cn": "春望"}, "ground_truth": null}]
//! }
//! ```

pub use crate::core::JobDescriptor;

use crate::core::{StageDefinition, StageSet, DEFAULT_TEMPERATURE};
use crate::errors::ConfigError;
use crate::playbook::PlaybookSection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Top-level key holding the stage map.
pub const STAGES_KEY: &str = "STAGES";
/// Top-level key holding the job list.
pub const JOBS_KEY: &str = "JOBS";
/// Suffix appended to the config stem to name the history file.
pub const HISTORY_SUFFIX: &str = "_history.json";

fn default_playbook_section() -> String {
    PlaybookSection::ALL.to_string()
}

fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

/// One stage as written in a configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    /// System prompt sent with every call.
    pub system_prompt: String,

    /// Playbook section injected as `{playbook}`.
    #[serde(default = "default_playbook_section")]
    pub playbook_section: String,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// User prompt with `{name}` placeholders.
    pub user_prompt_template: String,
}

impl StageConfig {
    /// Builds the stage definition for `key`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidTemplate` if the template is malformed.
    pub fn into_definition(self, key: impl Into<String>) -> Result<StageDefinition, ConfigError> {
        Ok(StageDefinition::new(key, self.system_prompt, &self.user_prompt_template)?
            .with_section(self.playbook_section)
            .with_temperature(self.temperature))
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(rename = "STAGES", default)]
    stages: Option<BTreeMap<String, StageConfig>>,
    #[serde(rename = "JOBS", default)]
    jobs: Option<Vec<JobDescriptor>>,
}

/// A validated configuration: a non-empty stage set and a non-empty job list.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    stages: StageSet,
    jobs: Vec<JobDescriptor>,
}

impl PipelineConfig {
    /// Creates a configuration from parts.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingKey` if `jobs` is empty.
    pub fn new(stages: StageSet, jobs: Vec<JobDescriptor>) -> Result<Self, ConfigError> {
        if jobs.is_empty() {
            return Err(ConfigError::MissingKey(JOBS_KEY.to_string()));
        }
        for warning in stages.reference_warnings() {
            warn!("{warning}");
        }
        Ok(Self { stages, jobs })
    }

    /// Reads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file is unreadable, not JSON, misses a
    /// required key, or contains a malformed template.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&text, &path.display().to_string())?;
        info!(
            path = %path.display(),
            stages = config.stages.len(),
            jobs = config.jobs.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Parses and validates configuration text.
    ///
    /// `origin` names the source in error messages.
    ///
    /// # Errors
    ///
    /// See [`load`](Self::load).
    pub fn from_json_str(text: &str, origin: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(text).map_err(|source| ConfigError::Json {
            origin: origin.to_string(),
            source,
        })?;

        let stage_map = raw
            .stages
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError::MissingKey(STAGES_KEY.to_string()))?;
        let jobs = raw
            .jobs
            .filter(|j| !j.is_empty())
            .ok_or_else(|| ConfigError::MissingKey(JOBS_KEY.to_string()))?;

        let definitions = stage_map
            .into_iter()
            .map(|(key, stage)| stage.into_definition(key))
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(StageSet::new(definitions)?, jobs)
    }

    /// Returns the stage set.
    #[must_use]
    pub fn stages(&self) -> &StageSet {
        &self.stages
    }

    /// Returns the jobs in file order.
    #[must_use]
    pub fn jobs(&self) -> &[JobDescriptor] {
        &self.jobs
    }

    /// Splits the configuration into its parts.
    #[must_use]
    pub fn into_parts(self) -> (StageSet, Vec<JobDescriptor>) {
        (self.stages, self.jobs)
    }
}

/// Derives the history file path for a configuration file.
///
/// `poems.json` becomes `poems_history.json` in the same directory.
#[must_use]
pub fn history_path_for(config_path: impl AsRef<Path>) -> PathBuf {
    let path = config_path.as_ref();
    let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let stem = name.strip_suffix(".json").unwrap_or(&name);
    path.with_file_name(format!("{stem}{HISTORY_SUFFIX}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ace_stages_json, write_config};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn config_json() -> serde_json::Value {
        json!({
            "STAGES": ace_stages_json(),
            "JOBS": [
                {"id": "job-1", "inputs": {"topic": "rain"}, "ground_truth": {"note": "x"}},
                {"id": "job-2"}
            ]
        })
    }

    #[test]
    fn test_load_valid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "cfg.json", &config_json());

        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.stages().len(), 3);
        assert_eq!(config.jobs().len(), 2);
        assert_eq!(config.jobs()[1].inputs.len(), 0);
        assert!(config.jobs()[1].ground_truth.is_none());

        let critique = config.stages().get("2_critique").unwrap();
        assert_eq!(critique.playbook_section().as_str(), "all");
        assert!((critique.temperature() - DEFAULT_TEMPERATURE).abs() < f64::EPSILON);
        assert!((config.stages().get("1_draft").unwrap().temperature() - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn test_missing_or_empty_keys() {
        let err = PipelineConfig::from_json_str(r#"{"JOBS": [{"id": "a"}]}"#, "inline").unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey(k) if k == STAGES_KEY));

        let text = json!({"STAGES": ace_stages_json(), "JOBS": []}).to_string();
        let err = PipelineConfig::from_json_str(&text, "inline").unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey(k) if k == JOBS_KEY));

        let err = PipelineConfig::from_json_str(r#"{"STAGES": {}, "JOBS": [{"id": "a"}]}"#, "inline").unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey(k) if k == STAGES_KEY));
    }

    #[test]
    fn test_invalid_json_and_unreadable_file() {
        assert!(matches!(
            PipelineConfig::from_json_str("{not json", "inline"),
            Err(ConfigError::Json { .. })
        ));
        assert!(matches!(
            PipelineConfig::load("/definitely/not/here.json"),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_malformed_template_is_rejected() {
        let text = json!({
            "STAGES": {"1_a": {"system_prompt": "s", "user_prompt_template": "{broken"}},
            "JOBS": [{"id": "a"}]
        })
        .to_string();
        assert!(matches!(
            PipelineConfig::from_json_str(&text, "inline"),
            Err(ConfigError::InvalidTemplate { stage, .. }) if stage == "1_a"
        ));
    }

    #[test]
    fn test_stage_missing_template_is_json_error() {
        let text = json!({"STAGES": {"1_a": {"system_prompt": "s"}}, "JOBS": [{"id": "a"}]}).to_string();
        assert!(matches!(
            PipelineConfig::from_json_str(&text, "inline"),
            Err(ConfigError::Json { .. })
        ));
    }

    #[test]
    fn test_history_path_for() {
        assert_eq!(
            history_path_for("configs/poems.json"),
            PathBuf::from("configs/poems_history.json")
        );
        assert_eq!(history_path_for("run"), PathBuf::from("run_history.json"));
        assert_eq!(history_path_for("a.b.json"), PathBuf::from("a.b_history.json"));
    }
}
