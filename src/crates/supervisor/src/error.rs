//! Error Types - Configuration, Build and Run Failures
//!
//! Errors are split by the phase in which they occur so callers can decide how
//! to react without string matching:
//!
//! ```text
//! SupervisorError
//! ├── Configuration   - bad or unknown override, rejected before any model call
//! ├── Build           - empty or ambiguous agent catalog, missing tools
//! └── Run             - failures while a RoutingGraph is executing
//!     ├── Routing           - decision named an agent that does not exist
//!     ├── RunLimitExceeded  - hand-off cap reached
//!     ├── InvalidInput      - history without a user turn
//!     └── Transient         - model infrastructure failure, caller retries
//! ```
//!
//! Build errors are all-or-nothing: a failed build never yields a graph.
//! Run errors are reported through [`RunFailure`], which carries the partial
//! trace so evaluation tooling can score a failed run instead of aborting a
//! whole batch.

use crate::messages::ConversationTrace;
use std::time::Duration;
use thiserror::Error;

/// Result type for supervisor operations
pub type Result<T> = std::result::Result<T, SupervisorError>;

/// Invalid configuration overrides
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Key is not one of the recognised configuration fields
    #[error("Unknown configuration field: {0}")]
    UnknownField(String),

    /// Per-agent map names an agent the catalog does not contain
    #[error("Unknown agent '{agent}' in {field}")]
    UnknownAgent { field: String, agent: String },

    /// Model override is empty or whitespace
    #[error("Model id for {field} must be a non-empty string")]
    EmptyModelId { field: String },

    /// Value has the wrong shape for its field
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Failure to construct a [`RoutingGraph`](crate::graph::RoutingGraph)
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BuildError {
    /// No agent templates to route to
    #[error("Agent catalog is empty")]
    EmptyCatalog,

    /// Two agents resolve to the same routing description
    #[error("Agents '{first}' and '{second}' resolve to the same description: {description}")]
    DuplicateDescription {
        first: String,
        second: String,
        description: String,
    },

    /// Agent requires a tool that is not registered
    #[error("Agent '{agent}' requires tool '{tool}' which is not registered")]
    MissingTool { agent: String, tool: String },

    /// Graph limits cannot be satisfied
    #[error("Invalid graph limits: {0}")]
    InvalidLimits(String),

    /// Configuration does not match the catalog
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

/// Infrastructure failure of a model (or decision) call.
///
/// The core never retries these; it surfaces them so the caller can.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransientError {
    /// Provider unreachable or returned a server error
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// Provider asked us to slow down
    #[error("Rate limited by model provider")]
    RateLimited { retry_after: Option<Duration> },

    /// Call did not complete in time
    #[error("Model call timed out: {0}")]
    Timeout(String),
}

impl TransientError {
    /// Minimum delay the provider asked for, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            TransientError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Tool invocation failure.
///
/// Never aborts a run: the graph turns it into an error tool message the
/// supervisor can see and react to.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolError {
    /// Tool name is not available to the agent
    #[error("Tool not found: {0}")]
    NotFound(String),

    /// Arguments did not match the tool's schema
    #[error("Invalid tool input: {0}")]
    InvalidInput(String),

    /// Tool ran and failed
    #[error("Tool execution failed: {0}")]
    Execution(String),
}

/// Fatal error during a single run
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RunError {
    /// Decision named a description that matches no agent exactly
    #[error("Supervisor selected unknown agent description: {target}")]
    Routing { target: String },

    /// Hand-off cap reached
    #[error("Hand-off limit of {limit} exceeded")]
    RunLimitExceeded { limit: usize },

    /// Run was started without a user turn to answer
    #[error("Invalid run input: {0}")]
    InvalidInput(String),

    /// Model infrastructure failure
    #[error(transparent)]
    Transient(#[from] TransientError),
}

impl RunError {
    /// Whether retrying the whole run may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, RunError::Transient(_))
    }
}

/// A failed run together with the trace accumulated before the failure
#[derive(Debug, Clone, Error)]
#[error("{error}")]
pub struct RunFailure {
    /// What went wrong
    pub error: RunError,
    /// Messages produced up to the failure, in execution order
    pub trace: ConversationTrace,
}

/// Umbrella error for callers that do not care about the phase
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Build error
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    /// Run error
    #[error("Run failed: {0}")]
    Run(#[from] RunError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<RunFailure> for SupervisorError {
    fn from(failure: RunFailure) -> Self {
        SupervisorError::Run(failure.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_hint() {
        let err = TransientError::RateLimited {
            retry_after: Some(Duration::from_secs(2)),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(2)));
        assert_eq!(TransientError::Timeout("x".into()).retry_after(), None);
    }

    #[test]
    fn test_run_error_classification() {
        let transient: RunError = TransientError::ModelUnavailable("503".into()).into();
        assert!(transient.is_transient());
        assert!(!RunError::RunLimitExceeded { limit: 3 }.is_transient());
    }

    #[test]
    fn test_error_messages_name_the_offender() {
        let err = ConfigurationError::UnknownAgent {
            field: "agent_prompts".into(),
            agent: "poet_agent".into(),
        };
        assert!(err.to_string().contains("poet_agent"));

        let err: SupervisorError = BuildError::EmptyCatalog.into();
        assert_eq!(err.to_string(), "Build error: Agent catalog is empty");
    }
}
