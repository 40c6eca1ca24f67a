use crate::error::{MinerError, MiningError};
use crate::repository::RepositoryError;
use crate::state_machine::ImportState;
use thiserror::Error;

/// Failures of an import guard check
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GuardError {
    #[error("Import for task {task_id} is not waiting (import state: {import_state})")]
    ImportNotWaiting {
        task_id: i64,
        import_state: ImportState,
    },

    #[error("Task {task_id} not found")]
    TaskNotFound { task_id: i64 },

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Result type alias for import guard checks
pub type GuardResult<T> = Result<T, GuardError>;

/// Helper function to create the rejection for a task that is not waiting
pub fn import_not_waiting(task_id: i64, import_state: ImportState) -> GuardError {
    GuardError::ImportNotWaiting {
        task_id,
        import_state,
    }
}

impl From<GuardError> for MiningError {
    fn from(err: GuardError) -> Self {
        match err {
            GuardError::ImportNotWaiting {
                task_id,
                import_state,
            } => MiningError::ImportAlreadyInProgress {
                task_id,
                import_state,
            },
            GuardError::TaskNotFound { task_id } => MiningError::TaskIdNotFound { task_id },
            GuardError::Repository(err) => MiningError::Repository(err.to_string()),
        }
    }
}

impl From<GuardError> for MinerError {
    fn from(err: GuardError) -> Self {
        MinerError::MiningError(err.to_string())
    }
}
