//! The text-generation capability the engine calls for every stage.
//!
//! The engine depends only on [`TextGenerator`]; backends are injected as
//! `Arc<dyn TextGenerator>`. Temperature travels with each call so a single
//! generator can serve stages with different settings.

#[cfg(feature = "gemini")]
mod gemini;

#[cfg(feature = "gemini")]
pub use gemini::{GeminiGenerator, DEFAULT_GEMINI_MODEL, GOOGLE_API_KEY_ENV};

use crate::errors::GenerationError;
use async_trait::async_trait;

/// A backend that turns a system prompt and a user prompt into text.
///
/// Implementations are expected to ask for structured (JSON) output; the
/// engine parses whatever comes back.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generates text for one stage.
    ///
    /// # Errors
    ///
    /// Returns a [`GenerationError`] when the backend cannot produce text.
    async fn generate(&self, system_prompt: &str, user_prompt: &str, temperature: f64)
        -> Result<String, GenerationError>;
}

/// A generator that always answers with the same text.
///
/// Useful for dry runs and smoke tests.
#[derive(Debug, Clone)]
pub struct StaticGenerator {
    response: String,
}

impl StaticGenerator {
    /// Creates a generator returning `response` for every call.
    #[must_use]
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}

impl Default for StaticGenerator {
    fn default() -> Self {
        Self::new("{}")
    }
}

#[async_trait]
impl TextGenerator for StaticGenerator {
    async fn generate(&self, _system_prompt: &str, _user_prompt: &str, _temperature: f64) -> Result<String, GenerationError> {
        Ok(self.response.clone())
    }
}
