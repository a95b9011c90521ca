//! The per-job run context.

use super::template::Scope;
use crate::errors::ContextError;
use crate::playbook::Playbook;
use crate::utils::{format_timestamp, generate_run_id, now_utc, Timestamp};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Context key holding the job id.
pub const PIPELINE_ID_KEY: &str = "pipeline_id";
/// Context key holding the run id.
pub const RUN_ID_KEY: &str = "run_id";
/// Context key holding the playbook snapshot.
pub const PLAYBOOK_SNAPSHOT_KEY: &str = "playbook_snapshot";
/// Context key holding the seed prompt for the next run.
pub const CURRENT_ACE_PROMPT_KEY: &str = "current_ace_prompt";
/// Context key holding the completion timestamp.
pub const COMPLETED_AT_KEY: &str = "completed_at";
/// Context key listing inputs whose names look like stage entries.
///
/// Only written when such inputs exist, so the reload keeps them as inputs.
pub const INPUT_KEYS_KEY: &str = "input_keys";

/// Suffix of the raw-text entry for a stage.
pub const JSON_SUFFIX: &str = "_json";
/// Suffix of the parsed entry for a stage.
pub const DATA_SUFFIX: &str = "_data";
/// Suffix of the system prompt entry for a stage.
pub const SYSTEM_PROMPT_SUFFIX: &str = "_system_prompt";

const RESERVED_KEYS: [&str; 6] = [
    PIPELINE_ID_KEY,
    RUN_ID_KEY,
    PLAYBOOK_SNAPSHOT_KEY,
    CURRENT_ACE_PROMPT_KEY,
    COMPLETED_AT_KEY,
    INPUT_KEYS_KEY,
];

/// The result of one executed stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    /// Raw text returned by the capability (`<stage>_json`).
    pub raw: String,
    /// Parsed structure (`<stage>_data`).
    pub data: Value,
}

impl StageRecord {
    /// Creates a record from already-parsed parts.
    #[must_use]
    pub fn new(raw: impl Into<String>, data: Value) -> Self {
        Self {
            raw: raw.into(),
            data,
        }
    }

    /// Parses raw capability text into a record.
    ///
    /// # Errors
    ///
    /// Returns the JSON error when the text is not valid JSON.
    pub fn parse(raw: impl Into<String>) -> Result<Self, serde_json::Error> {
        let raw = raw.into();
        let data = serde_json::from_str(&raw)?;
        Ok(Self { raw, data })
    }

    /// The record used when the capability call itself failed.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            raw: "{}".to_string(),
            data: Value::Object(Map::new()),
        }
    }
}

/// Mutable per-job store threaded through every stage.
///
/// Stage results live in a typed map keyed by stage; the flat
/// `<stage>_json` / `<stage>_data` names only exist in the wire form and in
/// placeholder lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct RunContext {
    pipeline_id: String,
    run_id: Uuid,
    inputs: BTreeMap<String, Value>,
    system_prompts: BTreeMap<String, String>,
    stages: BTreeMap<String, StageRecord>,
    playbook_snapshot: Option<Playbook>,
    current_ace_prompt: Option<String>,
    completed_at: Option<Timestamp>,
}

impl RunContext {
    /// Creates a context for a job from its declared inputs.
    #[must_use]
    pub fn new(pipeline_id: impl Into<String>, inputs: BTreeMap<String, Value>) -> Self {
        let pipeline_id = pipeline_id.into();
        for key in inputs.keys().filter(|k| RESERVED_KEYS.contains(&k.as_str())) {
            tracing::warn!(pipeline_id = %pipeline_id, key = %key, "Job input shadowed by reserved context key");
        }
        Self {
            pipeline_id,
            run_id: generate_run_id(),
            inputs,
            system_prompts: BTreeMap::new(),
            stages: BTreeMap::new(),
            playbook_snapshot: None,
            current_ace_prompt: None,
            completed_at: None,
        }
    }

    /// Returns the job id.
    #[must_use]
    pub fn pipeline_id(&self) -> &str {
        &self.pipeline_id
    }

    /// Returns the run id.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns the job inputs.
    #[must_use]
    pub fn inputs(&self) -> &BTreeMap<String, Value> {
        &self.inputs
    }

    /// Returns a single job input.
    #[must_use]
    pub fn input(&self, name: &str) -> Option<&Value> {
        self.inputs.get(name)
    }

    /// Records the system prompt used for a stage.
    pub fn record_system_prompt(&mut self, stage: impl Into<String>, prompt: impl Into<String>) {
        self.system_prompts.insert(stage.into(), prompt.into());
    }

    /// Returns the system prompt recorded for a stage.
    #[must_use]
    pub fn system_prompt(&self, stage: &str) -> Option<&str> {
        self.system_prompts.get(stage).map(String::as_str)
    }

    /// Records a stage result.
    ///
    /// # Errors
    ///
    /// Returns `ContextError::StageConflict` if the stage already has one.
    pub fn insert_stage(&mut self, stage: impl Into<String>, record: StageRecord) -> Result<(), ContextError> {
        let stage = stage.into();
        if self.stages.contains_key(&stage) {
            return Err(ContextError::StageConflict(stage));
        }
        self.stages.insert(stage, record);
        Ok(())
    }

    /// Returns true if the stage produced a result.
    #[must_use]
    pub fn has_stage(&self, stage: &str) -> bool {
        self.stages.contains_key(stage)
    }

    /// Returns the record for a stage.
    ///
    /// # Errors
    ///
    /// Returns `ContextError::UnknownStage` if the stage has no result.
    pub fn stage_record(&self, stage: &str) -> Result<&StageRecord, ContextError> {
        self.stages
            .get(stage)
            .ok_or_else(|| ContextError::UnknownStage(stage.to_string()))
    }

    /// Returns the parsed output of a stage.
    ///
    /// # Errors
    ///
    /// Returns `ContextError::UnknownStage` if the stage has no result.
    pub fn stage_data(&self, stage: &str) -> Result<&Value, ContextError> {
        self.stage_record(stage).map(|r| &r.data)
    }

    /// Returns the raw output of a stage.
    ///
    /// # Errors
    ///
    /// Returns `ContextError::UnknownStage` if the stage has no result.
    pub fn stage_raw(&self, stage: &str) -> Result<&str, ContextError> {
        self.stage_record(stage).map(|r| r.raw.as_str())
    }

    /// Returns the keys of stages that produced results, in order.
    pub fn stage_keys(&self) -> impl Iterator<Item = &str> {
        self.stages.keys().map(String::as_str)
    }

    /// Stamps the context with its playbook snapshot and next-run prompt.
    pub fn finalize(&mut self, snapshot: Playbook, current_ace_prompt: impl Into<String>) {
        self.playbook_snapshot = Some(snapshot);
        self.current_ace_prompt = Some(current_ace_prompt.into());
        self.completed_at = Some(now_utc());
    }

    /// Returns true once [`finalize`](Self::finalize) has run.
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.playbook_snapshot.is_some()
    }

    /// Returns the playbook snapshot, if finalized.
    #[must_use]
    pub fn playbook_snapshot(&self) -> Option<&Playbook> {
        self.playbook_snapshot.as_ref()
    }

    /// Returns the seed prompt for the next run, if finalized.
    #[must_use]
    pub fn current_ace_prompt(&self) -> Option<&str> {
        self.current_ace_prompt.as_deref()
    }

    /// Returns the completion time, if finalized.
    #[must_use]
    pub fn completed_at(&self) -> Option<Timestamp> {
        self.completed_at
    }

    /// Returns true if an input's flat name could be read back as a stage
    /// entry or system prompt and no stage entry already takes that name.
    fn is_ambiguous_input(&self, key: &str) -> bool {
        let stage_taken = [JSON_SUFFIX, DATA_SUFFIX]
            .iter()
            .find_map(|suffix| key.strip_suffix(*suffix))
            .map(|stage| self.stages.contains_key(stage));
        let prompt_taken = key
            .strip_suffix(SYSTEM_PROMPT_SUFFIX)
            .map(|stage| self.system_prompts.contains_key(stage));
        matches!(stage_taken.or(prompt_taken), Some(false))
    }

    /// Looks up a flat context key the way templates see it.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        match name {
            PIPELINE_ID_KEY => return Some(Value::String(self.pipeline_id.clone())),
            RUN_ID_KEY => return Some(Value::String(self.run_id.to_string())),
            _ => {}
        }
        if let Some(record) = name.strip_suffix(JSON_SUFFIX).and_then(|s| self.stages.get(s)) {
            return Some(Value::String(record.raw.clone()));
        }
        if let Some(record) = name.strip_suffix(DATA_SUFFIX).and_then(|s| self.stages.get(s)) {
            return Some(record.data.clone());
        }
        if let Some(prompt) = name
            .strip_suffix(SYSTEM_PROMPT_SUFFIX)
            .and_then(|s| self.system_prompts.get(s))
        {
            return Some(Value::String(prompt.clone()));
        }
        self.inputs.get(name).cloned()
    }

    /// Converts the context into its flat wire form.
    #[must_use]
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map: Map<String, Value> = self
            .inputs
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        for (stage, prompt) in &self.system_prompts {
            map.insert(format!("{stage}{SYSTEM_PROMPT_SUFFIX}"), Value::String(prompt.clone()));
        }
        for (stage, record) in &self.stages {
            map.insert(format!("{stage}{JSON_SUFFIX}"), Value::String(record.raw.clone()));
            map.insert(format!("{stage}{DATA_SUFFIX}"), record.data.clone());
        }

        map.insert(PIPELINE_ID_KEY.to_string(), Value::String(self.pipeline_id.clone()));
        map.insert(RUN_ID_KEY.to_string(), Value::String(self.run_id.to_string()));
        if let Some(ref snapshot) = self.playbook_snapshot {
            map.insert(
                PLAYBOOK_SNAPSHOT_KEY.to_string(),
                serde_json::to_value(snapshot).unwrap_or(Value::Null),
            );
        }
        if let Some(ref prompt) = self.current_ace_prompt {
            map.insert(CURRENT_ACE_PROMPT_KEY.to_string(), Value::String(prompt.clone()));
        }
        if let Some(ts) = self.completed_at {
            map.insert(COMPLETED_AT_KEY.to_string(), Value::String(format_timestamp(&ts)));
        }

        let pinned: Vec<Value> = self
            .inputs
            .keys()
            .filter(|k| self.is_ambiguous_input(k))
            .map(|k| Value::String(k.clone()))
            .collect();
        if !pinned.is_empty() {
            map.insert(INPUT_KEYS_KEY.to_string(), Value::Array(pinned));
        }
        map
    }

    /// Rebuilds a context from its flat wire form.
    ///
    /// Entries written by older tools without `run_id` get the nil UUID.
    /// Keys listed under `input_keys` stay inputs; every other
    /// `<stage>_json`/`<stage>_data` pair becomes a stage record.
    ///
    /// # Errors
    ///
    /// Returns a description of the first malformed reserved entry.
    pub fn from_map(mut map: Map<String, Value>) -> Result<Self, String> {
        let pipeline_id = match map.remove(PIPELINE_ID_KEY) {
            Some(Value::String(id)) => id,
            Some(other) => return Err(format!("'{PIPELINE_ID_KEY}' must be a string, got {other}")),
            None => return Err(format!("missing '{PIPELINE_ID_KEY}'")),
        };

        let run_id = match map.remove(RUN_ID_KEY) {
            Some(Value::String(s)) => Uuid::parse_str(&s).map_err(|e| format!("invalid '{RUN_ID_KEY}': {e}"))?,
            _ => Uuid::nil(),
        };

        let playbook_snapshot = match map.remove(PLAYBOOK_SNAPSHOT_KEY) {
            None | Some(Value::Null) => None,
            Some(v) => Some(
                serde_json::from_value(v).map_err(|e| format!("invalid '{PLAYBOOK_SNAPSHOT_KEY}': {e}"))?,
            ),
        };

        let current_ace_prompt = match map.remove(CURRENT_ACE_PROMPT_KEY) {
            Some(Value::String(s)) => Some(s),
            _ => None,
        };

        let completed_at = match map.remove(COMPLETED_AT_KEY) {
            Some(Value::String(s)) => Some(
                chrono::DateTime::parse_from_rfc3339(&s)
                    .map_err(|e| format!("invalid '{COMPLETED_AT_KEY}': {e}"))?
                    .with_timezone(&chrono::Utc),
            ),
            _ => None,
        };

        let pinned_inputs: Vec<(String, Value)> = match map.remove(INPUT_KEYS_KEY) {
            Some(Value::Array(keys)) => keys
                .iter()
                .filter_map(Value::as_str)
                .filter_map(|k| map.remove(k).map(|v| (k.to_string(), v)))
                .collect(),
            _ => Vec::new(),
        };

        let mut system_prompts = BTreeMap::new();
        let prompt_keys: Vec<String> = map
            .iter()
            .filter(|(k, v)| k.ends_with(SYSTEM_PROMPT_SUFFIX) && v.is_string())
            .map(|(k, _)| k.clone())
            .collect();
        for key in prompt_keys {
            if let Some(Value::String(prompt)) = map.remove(&key) {
                let stage = key.strip_suffix(SYSTEM_PROMPT_SUFFIX).unwrap_or(&key).to_string();
                system_prompts.insert(stage, prompt);
            }
        }

        let mut stages = BTreeMap::new();
        let stage_keys: Vec<String> = map
            .iter()
            .filter_map(|(k, v)| {
                let stage = k.strip_suffix(JSON_SUFFIX)?;
                (v.is_string() && map.contains_key(&format!("{stage}{DATA_SUFFIX}"))).then(|| stage.to_string())
            })
            .collect();
        for stage in stage_keys {
            let raw = map.remove(&format!("{stage}{JSON_SUFFIX}"));
            let data = map.remove(&format!("{stage}{DATA_SUFFIX}"));
            if let (Some(Value::String(raw)), Some(data)) = (raw, data) {
                stages.insert(stage, StageRecord { raw, data });
            }
        }

        Ok(Self {
            pipeline_id,
            run_id,
            inputs: map.into_iter().chain(pinned_inputs).collect(),
            system_prompts,
            stages,
            playbook_snapshot,
            current_ace_prompt,
            completed_at,
        })
    }
}

impl Scope for RunContext {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.get(name)
    }
}

impl Serialize for RunContext {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_map().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RunContext {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = Map::deserialize(deserializer)?;
        Self::from_map(map).map_err(serde::de::Error::custom)
    }
}

/// A run context plus per-stage bindings that are visible to templates but
/// never stored (`playbook`, `ground_truth_json`).
#[derive(Debug)]
pub struct StageScope<'a> {
    context: &'a RunContext,
    bindings: BTreeMap<&'static str, Value>,
}

impl<'a> StageScope<'a> {
    /// Creates a scope over a context.
    #[must_use]
    pub fn new(context: &'a RunContext) -> Self {
        Self {
            context,
            bindings: BTreeMap::new(),
        }
    }

    /// Adds a transient binding that shadows context entries.
    #[must_use]
    pub fn bind(mut self, name: &'static str, value: impl Into<Value>) -> Self {
        self.bindings.insert(name, value.into());
        self
    }
}

impl Scope for StageScope<'_> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.bindings
            .get(name)
            .cloned()
            .or_else(|| self.context.get(name))
    }
}
