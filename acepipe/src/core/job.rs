//! Job descriptors.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One unit of work in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    /// Job id, becomes the context's `pipeline_id`.
    pub id: String,

    /// Named values visible to every stage template.
    #[serde(default)]
    pub inputs: BTreeMap<String, Value>,

    /// Optional reference answer, bound as `ground_truth_json`.
    #[serde(default)]
    pub ground_truth: Option<Value>,
}

impl JobDescriptor {
    /// Creates a job with no inputs and no ground truth.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            inputs: BTreeMap::new(),
            ground_truth: None,
        }
    }

    /// Adds an input.
    #[must_use]
    pub fn with_input(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inputs.insert(name.into(), value.into());
        self
    }

    /// Sets the ground truth.
    #[must_use]
    pub fn with_ground_truth(mut self, ground_truth: Value) -> Self {
        self.ground_truth = Some(ground_truth);
        self
    }
}
