//! Domain errors for the waggle orchestration core.

use thiserror::Error;

/// Domain-level errors that can occur anywhere in the orchestration core.
///
/// Every public API that hands a `TaskResult` back to a caller converts
/// these into `success = false` results at the boundary; the enum itself is
/// for the internal seams.
#[derive(Debug, Clone, Error)]
pub enum SwarmError {
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Team not found: {0}")]
    TeamNotFound(String),

    #[error("Dependency cycle detected in sub-task graph")]
    DependencyCycle,

    #[error("Unknown dependency: {dependent} depends on {dependency}, which is neither in the batch nor on the board")]
    UnknownDependency { dependent: String, dependency: String },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Team creation failed: {0}")]
    TeamCreation(String),

    #[error("Planning failed: {0}")]
    PlanningFailed(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Execution cancelled")]
    Cancelled,

    #[error("Execution timed out after {0} seconds")]
    Timeout(u64),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type SwarmResult<T> = Result<T, SwarmError>;

impl From<serde_json::Error> for SwarmError {
    fn from(err: serde_json::Error) -> Self {
        SwarmError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for SwarmError {
    fn from(err: serde_yaml::Error) -> Self {
        SwarmError::Serialization(err.to_string())
    }
}
