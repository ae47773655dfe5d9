//! Errors raised while loading datasets, reading settings and emitting scores.
//!
//! Run failures are not errors at this level: the batch driver records them in
//! the outcome and keeps going.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for evaluation operations
pub type Result<T> = std::result::Result<T, EvalError>;

#[derive(Debug, Error)]
pub enum EvalError {
    /// File could not be read or written
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSONL line did not parse
    #[error("Invalid record at {path}:{line}: {source}")]
    Parse {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// Settings file is malformed
    #[error("Invalid settings: {0}")]
    Settings(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Supervisor configuration or build failure
    #[error(transparent)]
    Supervisor(#[from] supervisor::SupervisorError),
}

impl EvalError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EvalError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<supervisor::BuildError> for EvalError {
    fn from(error: supervisor::BuildError) -> Self {
        EvalError::Supervisor(error.into())
    }
}

impl From<supervisor::ConfigurationError> for EvalError {
    fn from(error: supervisor::ConfigurationError) -> Self {
        EvalError::Supervisor(error.into())
    }
}
