//! Error types for qail-script.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for script loading, marshalling and execution.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// The script provider has no script under the expected name.
    #[error("Script not found: '{name}'")]
    ScriptNotFound { name: String },

    /// A directory-backed provider was pointed at a missing directory.
    #[error("Script directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    /// Neither an explicit argument nor a configured default was available.
    #[error("Configuration missing: no {0} supplied and no default configured")]
    ConfigurationMissing(&'static str),

    /// A sequence was given as the sole parameter source.
    #[error("Invalid parameter shape: '{0}' is a sequence and cannot be bound as parameters")]
    InvalidParameterShape(String),

    /// Failed to split a script into text and placeholders.
    #[error("Parse error at position {position}: {message}")]
    Parse { position: usize, message: String },

    /// A stored value could not be converted to the declared type.
    #[error("Cannot coerce column '{column}' from {found} to {expected}")]
    Coercion {
        column: String,
        expected: &'static str,
        found: &'static str,
    },

    /// The script references a placeholder with no bound parameter.
    #[error("Unbound parameter: '@{0}'")]
    UnboundParameter(String),

    /// Database round trip failed.
    #[error("Execution error: {0}")]
    Execution(#[from] sqlx::Error),

    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Serde (de)serialization of a fallback record failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A blocking entry point was called from inside an async runtime.
    #[error("Blocking call made from inside an async runtime; use the async entry point instead")]
    BlockingInAsyncContext,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScriptError {
    /// Create a script-not-found error.
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::ScriptNotFound { name: name.into() }
    }

    /// Create a parse error at the given position.
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }

    /// Create a coercion error for the given column.
    pub fn coercion(column: impl Into<String>, expected: &'static str, found: &'static str) -> Self {
        Self::Coercion {
            column: column.into(),
            expected,
            found,
        }
    }

    /// Whether this error comes from the database round trip.
    ///
    /// These are the errors the public `run` entry points collapse into
    /// `false`, `None` or an empty sequence.
    pub fn is_execution_failure(&self) -> bool {
        matches!(self, Self::Execution(_) | Self::UnboundParameter(_))
    }
}

/// Result type alias for qail-script operations.
pub type ScriptResult<T> = Result<T, ScriptError>;
