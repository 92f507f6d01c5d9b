use thiserror::Error;

use crate::engine::dag::CycleError;

/// Typed outcome of a rejected engine operation.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("Execution not found: {0}")]
    ExecutionNotFound(String),

    #[error("Version {version} of workflow {workflow_id} not found")]
    VersionNotFound { workflow_id: String, version: u32 },

    /// The operation is invalid given the entity's current state.
    #[error("{0}")]
    Precondition(String),

    #[error(transparent)]
    Cycle(#[from] CycleError),

    #[error("Validation failed: {0}")]
    Validation(String),
}

impl EngineError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EngineError::WorkflowNotFound(_)
                | EngineError::ExecutionNotFound(_)
                | EngineError::VersionNotFound { .. }
        )
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
