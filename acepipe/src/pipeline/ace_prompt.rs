//! The two-part seed prompt written at the end of every job.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker opening the system prompt part.
pub const SYSTEM_PROMPT_MARKER: &str = "--- SYSTEM PROMPT ---";
/// Marker opening the playbook part.
pub const PLAYBOOK_MARKER: &str = "--- PLAYBOOK (for next run) ---";

/// The first stage's system prompt together with the formatted playbook, as
/// a ready-to-use instruction for the next run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcePrompt {
    /// System prompt of the first stage.
    pub system_prompt: String,
    /// Formatted playbook text.
    pub playbook: String,
}

impl AcePrompt {
    /// Creates a prompt from its parts.
    #[must_use]
    pub fn new(system_prompt: impl Into<String>, playbook: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            playbook: playbook.into(),
        }
    }

    /// Splits rendered prompt text back into its parts.
    ///
    /// The split happens at the first playbook marker, so a system prompt
    /// must not itself contain that marker line.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let rest = text.strip_prefix(SYSTEM_PROMPT_MARKER)?.strip_prefix('\n')?;
        let separator = format!("\n\n{PLAYBOOK_MARKER}\n");
        let (system_prompt, playbook) = rest.split_once(&separator)?;
        Some(Self::new(system_prompt, playbook))
    }
}

impl fmt::Display for AcePrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{SYSTEM_PROMPT_MARKER}\n{}\n\n{PLAYBOOK_MARKER}\n{}",
            self.system_prompt, self.playbook
        )
    }
}
