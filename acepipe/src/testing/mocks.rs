//! Test doubles for the text-generation capability.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::capability::TextGenerator;
use crate::errors::GenerationError;

/// One recorded call to a test generator.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationCall {
    /// System prompt passed in.
    pub system_prompt: String,
    /// Rendered user prompt passed in.
    pub user_prompt: String,
    /// Temperature passed in.
    pub temperature: f64,
}

/// Answers calls from a script, in order, and records every call.
///
/// Running past the end of the script yields a transport error, which the
/// engine treats as a soft failure.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Result<String, GenerationError>>>,
    calls: Mutex<Vec<GenerationCall>>,
}

impl ScriptedGenerator {
    /// Creates a generator with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a generator answering with the given texts.
    #[must_use]
    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let generator = Self::new();
        for r in responses {
            generator.push_response(r);
        }
        generator
    }

    /// Appends a successful response.
    pub fn push_response(&self, text: impl Into<String>) {
        self.script.lock().push_back(Ok(text.into()));
    }

    /// Appends a failure.
    pub fn push_error(&self, error: GenerationError) {
        self.script.lock().push_back(Err(error));
    }

    /// Returns the calls made so far.
    #[must_use]
    pub fn calls(&self) -> Vec<GenerationCall> {
        self.calls.lock().clone()
    }

    /// Returns the number of calls made so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Returns the number of unused script entries.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.script.lock().len()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, system_prompt: &str, user_prompt: &str, temperature: f64) -> Result<String, GenerationError> {
        self.calls.lock().push(GenerationCall {
            system_prompt: system_prompt.to_string(),
            user_prompt: user_prompt.to_string(),
            temperature,
        });
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(GenerationError::transport("script exhausted")))
    }
}

/// Fails every call with the same error.
#[derive(Debug, Clone)]
pub struct FailingGenerator {
    error: GenerationError,
}

impl FailingGenerator {
    /// Creates a generator failing with `error`.
    #[must_use]
    pub fn new(error: GenerationError) -> Self {
        Self { error }
    }
}

impl Default for FailingGenerator {
    fn default() -> Self {
        Self::new(GenerationError::Service {
            status: 503,
            message: "service unavailable".to_string(),
        })
    }
}

#[async_trait]
impl TextGenerator for FailingGenerator {
    async fn generate(&self, _system_prompt: &str, _user_prompt: &str, _temperature: f64) -> Result<String, GenerationError> {
        Err(self.error.clone())
    }
}
