//! Error types for acepipe.
//!
//! Every failure in the engine is job-local. The variants here map to the
//! decision the engine takes when it meets them:
//!
//! | Error | Engine decision |
//! |---|---|
//! | [`ConfigError`] | abort the whole run before any job starts |
//! | [`TemplateError`] | skip the current stage, keep going |
//! | [`GenerationError`] | substitute `{}` for the stage result, keep going |
//! | [`ParseFailure`] | abort the remaining stages of the current job |
//! | [`PersistenceError`] | log it, keep running |
//! | [`ContextError`] | caller misuse of the run context accessors |

use std::path::PathBuf;
use thiserror::Error;

/// Convenience result alias for acepipe operations.
pub type AceResult<T> = Result<T, AceError>;

/// The main error type for acepipe operations.
#[derive(Debug, Error)]
pub enum AceError {
    /// The pipeline configuration could not be loaded or validated.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// A stage template could not be rendered.
    #[error("{0}")]
    Template(#[from] TemplateError),

    /// The text-generation capability failed.
    #[error("{0}")]
    Generation(#[from] GenerationError),

    /// A generated response could not be parsed.
    #[error("{0}")]
    Parse(#[from] ParseFailure),

    /// Reading or writing the history file failed.
    #[error("{0}")]
    Persistence(#[from] PersistenceError),

    /// A run context accessor was misused.
    #[error("{0}")]
    Context(#[from] ContextError),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors raised while loading a `STAGES`/`JOBS` configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Cannot read config file {}: {source}", path.display())]
    Read {
        /// The configuration path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON or has the wrong shape.
    #[error("Invalid configuration in {origin}: {source}")]
    Json {
        /// Where the configuration came from (usually a path).
        origin: String,
        /// The underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// A required top-level key is absent or empty.
    #[error("Required key '{0}' missing or empty in configuration")]
    MissingKey(String),

    /// A stage set was built without any stages.
    #[error("Stage set is empty: at least one stage is required")]
    EmptyStageSet,

    /// Two stages share the same key.
    #[error("Duplicate stage key '{0}'")]
    DuplicateStage(String),

    /// A stage template is malformed.
    #[error("Stage '{stage}' has an invalid template: {source}")]
    InvalidTemplate {
        /// The stage key.
        stage: String,
        /// The template error.
        #[source]
        source: TemplateError,
    },
}

/// Errors produced by the template renderer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TemplateError {
    /// A placeholder names a key that is not bound.
    #[error("Missing placeholder: '{key}' is not bound in the run context")]
    MissingPlaceholder {
        /// The placeholder text, e.g. `1_translate_json` or `2_b_data[score]`.
        key: String,
    },

    /// The template text cannot be parsed.
    #[error("Malformed template at byte {position}: {reason}")]
    Malformed {
        /// Byte offset of the offending brace.
        position: usize,
        /// Description of the problem.
        reason: String,
    },
}

impl TemplateError {
    /// Creates a missing placeholder error.
    #[must_use]
    pub fn missing(key: impl Into<String>) -> Self {
        Self::MissingPlaceholder { key: key.into() }
    }

    /// Creates a malformed template error.
    #[must_use]
    pub fn malformed(position: usize, reason: impl Into<String>) -> Self {
        Self::Malformed {
            position,
            reason: reason.into(),
        }
    }

    /// Short machine-readable failure kind, used in logs and events.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingPlaceholder { .. } => "missing_placeholder",
            Self::Malformed { .. } => "malformed_template",
        }
    }
}

/// Errors raised by a text-generation backend.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    /// The request never produced a response (network, DNS, timeout).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The service answered with an error status.
    #[error("Service error {status}: {message}")]
    Service {
        /// HTTP-like status code.
        status: u16,
        /// Error body or description.
        message: String,
    },

    /// The backend is not usable as configured (e.g. missing API key).
    #[error("Generation backend misconfigured: {0}")]
    Configuration(String),

    /// The service answered successfully but without any text.
    #[error("Empty response from generation backend")]
    EmptyResponse,
}

impl GenerationError {
    /// Creates a transport error.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Short machine-readable failure kind, used in logs and events.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Service { .. } => "service",
            Self::Configuration(_) => "configuration",
            Self::EmptyResponse => "empty_response",
        }
    }
}

/// A stage produced text that is not valid structured data.
#[derive(Debug, Error)]
#[error("Stage '{stage}' returned unparseable output: {source}")]
pub struct ParseFailure {
    /// The stage key.
    pub stage: String,
    /// The raw text returned by the capability.
    pub raw: String,
    /// The JSON parse error.
    #[source]
    pub source: serde_json::Error,
}

impl ParseFailure {
    /// Creates a new parse failure.
    #[must_use]
    pub fn new(stage: impl Into<String>, raw: impl Into<String>, source: serde_json::Error) -> Self {
        Self {
            stage: stage.into(),
            raw: raw.into(),
            source,
        }
    }
}

/// Errors raised while loading or saving the history log.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Filesystem access failed.
    #[error("History I/O error on {}: {source}", path.display())]
    Io {
        /// The history path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The history could not be encoded or decoded.
    #[error("History serialization error on {}: {source}", path.display())]
    Serialization {
        /// The history path.
        path: PathBuf,
        /// The underlying serde error.
        #[source]
        source: serde_json::Error,
    },
}

impl PersistenceError {
    /// Creates an I/O persistence error.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a serialization persistence error.
    #[must_use]
    pub fn serialization(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Serialization {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised by the typed run context accessors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContextError {
    /// No result is recorded for the stage.
    #[error("Unknown stage '{0}' in run context")]
    UnknownStage(String),

    /// The stage already has a recorded result.
    #[error("Stage conflict: stage '{0}' already has a recorded result")]
    StageConflict(String),
}
