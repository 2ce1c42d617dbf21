//! Error taxonomy for the retrieval and reasoning pipeline.
//!
//! Only model and vector-index unavailability ever reach a caller as an
//! `Err`. Keyword-index and cache-store failures are absorbed where they
//! happen (vector-only retrieval, disabled cache), tool failures become
//! observation strings, and the iteration limit is reported through
//! [`AgentResult::success`](crate::models::AgentResult).

use std::fmt;

use thiserror::Error;

/// External systems the core talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collaborator {
    VectorIndex,
    KeywordIndex,
    CacheStore,
    Model,
    IndexStats,
}

impl fmt::Display for Collaborator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Collaborator::VectorIndex => "vector index",
            Collaborator::KeywordIndex => "keyword index",
            Collaborator::CacheStore => "cache store",
            Collaborator::Model => "language model",
            Collaborator::IndexStats => "index statistics",
        };
        f.write_str(name)
    }
}

/// Main error type for core operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A collaborator was unreachable or returned an error.
    #[error("{collaborator} unavailable: {message}")]
    CollaboratorUnavailable {
        collaborator: Collaborator,
        message: String,
    },

    /// Model output matched neither the action nor the final-answer shape.
    #[error("could not parse model output: {0}")]
    ParseFailure(String),

    /// A tool's own logic failed.
    #[error("tool '{tool}' failed: {message}")]
    ToolExecutionFailure { tool: String, message: String },

    /// The reasoning loop ran out of iterations.
    #[error("iteration limit of {iterations} reached")]
    IterationLimitExceeded { iterations: usize },
}

impl CoreError {
    /// Wrap a collaborator failure.
    pub fn unavailable(collaborator: Collaborator, err: impl fmt::Display) -> Self {
        CoreError::CollaboratorUnavailable {
            collaborator,
            message: err.to_string(),
        }
    }

    /// The collaborator behind this error, if any.
    pub fn collaborator(&self) -> Option<Collaborator> {
        match self {
            CoreError::CollaboratorUnavailable { collaborator, .. } => Some(*collaborator),
            _ => None,
        }
    }
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_display() {
        let err = CoreError::unavailable(Collaborator::Model, "connection refused");
        assert_eq!(
            err.to_string(),
            "language model unavailable: connection refused"
        );
        assert_eq!(err.collaborator(), Some(Collaborator::Model));
    }

    #[test]
    fn test_tool_failure_display() {
        let err = CoreError::ToolExecutionFailure {
            tool: "calculator".to_string(),
            message: "division by zero".to_string(),
        };
        assert_eq!(err.to_string(), "tool 'calculator' failed: division by zero");
        assert_eq!(err.collaborator(), None);
    }

    #[test]
    fn test_iteration_limit_display() {
        let err = CoreError::IterationLimitExceeded { iterations: 3 };
        assert_eq!(err.to_string(), "iteration limit of 3 reached");
    }
}
