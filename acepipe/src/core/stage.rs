//! Stage definitions and the ordered stage set.

use crate::context::{Template, DATA_SUFFIX, JSON_SUFFIX, SYSTEM_PROMPT_SUFFIX};
use crate::errors::ConfigError;
use crate::playbook::PlaybookSection;
use std::collections::BTreeMap;

/// Temperature used when a stage does not set one.
pub const DEFAULT_TEMPERATURE: f64 = 0.1;

/// One named step of a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct StageDefinition {
    key: String,
    system_prompt: String,
    template: Template,
    playbook_section: PlaybookSection,
    temperature: f64,
}

impl StageDefinition {
    /// Creates a stage, parsing its user prompt template.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidTemplate` if the template is malformed.
    pub fn new(
        key: impl Into<String>,
        system_prompt: impl Into<String>,
        user_prompt_template: &str,
    ) -> Result<Self, ConfigError> {
        let key = key.into();
        let template = Template::parse(user_prompt_template).map_err(|source| ConfigError::InvalidTemplate {
            stage: key.clone(),
            source,
        })?;
        Ok(Self {
            key,
            system_prompt: system_prompt.into(),
            template,
            playbook_section: PlaybookSection::default(),
            temperature: DEFAULT_TEMPERATURE,
        })
    }

    /// Sets the playbook section injected into this stage.
    #[must_use]
    pub fn with_section(mut self, section: impl Into<PlaybookSection>) -> Self {
        self.playbook_section = section.into();
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Returns the stage key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the system prompt.
    #[must_use]
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Returns the parsed user prompt template.
    #[must_use]
    pub fn template(&self) -> &Template {
        &self.template
    }

    /// Returns the playbook section.
    #[must_use]
    pub fn playbook_section(&self) -> &PlaybookSection {
        &self.playbook_section
    }

    /// Returns the sampling temperature.
    #[must_use]
    pub fn temperature(&self) -> f64 {
        self.temperature
    }
}

/// A non-empty set of stages, iterated in lexicographic key order.
#[derive(Debug, Clone, PartialEq)]
pub struct StageSet {
    stages: BTreeMap<String, StageDefinition>,
}

impl StageSet {
    /// Builds a stage set.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::EmptyStageSet` for no stages and
    /// `ConfigError::DuplicateStage` when two stages share a key.
    pub fn new(stages: impl IntoIterator<Item = StageDefinition>) -> Result<Self, ConfigError> {
        let mut map = BTreeMap::new();
        for stage in stages {
            if map.contains_key(stage.key()) {
                return Err(ConfigError::DuplicateStage(stage.key().to_string()));
            }
            map.insert(stage.key().to_string(), stage);
        }
        if map.is_empty() {
            return Err(ConfigError::EmptyStageSet);
        }
        Ok(Self { stages: map })
    }

    /// Iterates stages in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &StageDefinition> {
        self.stages.values()
    }

    /// Iterates stage keys in execution order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.stages.keys().map(String::as_str)
    }

    /// Returns a stage by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&StageDefinition> {
        self.stages.get(key)
    }

    /// Returns the first stage in execution order.
    #[must_use]
    pub fn first(&self) -> &StageDefinition {
        self.stages
            .values()
            .next()
            .unwrap_or_else(|| unreachable!("stage set is never empty"))
    }

    /// Returns the last stage in execution order.
    #[must_use]
    pub fn last(&self) -> &StageDefinition {
        self.stages
            .values()
            .next_back()
            .unwrap_or_else(|| unreachable!("stage set is never empty"))
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Always false; kept for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Lists template references to stage outputs that cannot exist yet when
    /// the referencing stage runs.
    ///
    /// Rendering such a template always skips the stage, so these are worth
    /// surfacing when a configuration is loaded.
    #[must_use]
    pub fn reference_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        for stage in self.iter() {
            for name in stage.template().root_names() {
                let Some((target, own_prompt_ok)) = referenced_stage(name) else {
                    continue;
                };
                if !self.stages.contains_key(target) {
                    continue;
                }
                let runs_later = target > stage.key() || (target == stage.key() && !own_prompt_ok);
                if runs_later {
                    warnings.push(format!(
                        "stage '{}' references '{name}' but stage '{target}' does not run before it",
                        stage.key()
                    ));
                }
            }
        }
        warnings
    }
}

/// Splits a flat context name into the stage it refers to.
///
/// The flag is true when a stage may reference that entry for itself.
fn referenced_stage(name: &str) -> Option<(&str, bool)> {
    name.strip_suffix(JSON_SUFFIX)
        .map(|s| (s, false))
        .or_else(|| name.strip_suffix(DATA_SUFFIX).map(|s| (s, false)))
        .or_else(|| name.strip_suffix(SYSTEM_PROMPT_SUFFIX).map(|s| (s, true)))
}

impl<'a> IntoIterator for &'a StageSet {
    type Item = &'a StageDefinition;
    type IntoIter = std::collections::btree_map::Values<'a, String, StageDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.stages.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TemplateError;
    use pretty_assertions::assert_eq;

    fn stage(key: &str, template: &str) -> StageDefinition {
        StageDefinition::new(key, format!("system for {key}"), template).unwrap()
    }

    #[test]
    fn test_stage_defaults() {
        let s = stage("1_a", "hello");
        assert_eq!(s.temperature(), DEFAULT_TEMPERATURE);
        assert_eq!(s.playbook_section().as_str(), "all");
        assert_eq!(s.system_prompt(), "system for 1_a");
    }

    #[test]
    fn test_stage_builders() {
        let s = stage("1_a", "hello").with_section("translation").with_temperature(0.7);
        assert_eq!(s.temperature(), 0.7);
        assert_eq!(s.playbook_section().as_str(), "translation");
    }

    #[test]
    fn test_invalid_template_is_config_error() {
        let err = StageDefinition::new("1_a", "sys", "{oops").unwrap_err();
        match err {
            ConfigError::InvalidTemplate { stage, source } => {
                assert_eq!(stage, "1_a");
                assert_eq!(source.kind(), TemplateError::malformed(0, "").kind());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_lexicographic_order() {
        let set = StageSet::new([stage("3_c", "x"), stage("1_a", "x"), stage("2_b", "x")]).unwrap();
        assert_eq!(set.keys().collect::<Vec<_>>(), vec!["1_a", "2_b", "3_c"]);
        assert_eq!(set.first().key(), "1_a");
        assert_eq!(set.last().key(), "3_c");
    }

    #[test]
    fn test_order_is_by_code_point_not_number() {
        let set = StageSet::new([stage("10_z", "x"), stage("2_b", "x")]).unwrap();
        assert_eq!(set.keys().collect::<Vec<_>>(), vec!["10_z", "2_b"]);
    }

    #[test]
    fn test_empty_and_duplicate_sets_rejected() {
        assert!(matches!(
            StageSet::new(Vec::<StageDefinition>::new()),
            Err(ConfigError::EmptyStageSet)
        ));
        assert!(matches!(
            StageSet::new([stage("1_a", "x"), stage("1_a", "y")]),
            Err(ConfigError::DuplicateStage(k)) if k == "1_a"
        ));
    }

    #[test]
    fn test_reference_warnings_flag_forward_references() {
        let set = StageSet::new([
            stage("1_a", "{2_b_json}"),
            stage("2_b", "{1_a_data[x]} {2_b_system_prompt}"),
            stage("3_c", "{3_c_data} {title_data}"),
        ])
        .unwrap();

        let warnings = set.reference_warnings();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("'1_a' references '2_b_json'"));
        assert!(warnings[1].contains("'3_c' references '3_c_data'"));
    }
}
