//! Error types for the mining core.
//!
//! [`MinerError`] is the crate-wide error; [`MiningError`] carries the taxonomy
//! surfaced by the caller-facing operations of
//! [`crate::services::TaskMiningService`].

use crate::state_machine::{ImportState, TaskState};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MinerError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Mining error: {0}")]
    MiningError(String),
    #[error("Dispatch error: {0}")]
    DispatchError(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for MinerError {
    fn from(error: serde_json::Error) -> Self {
        MinerError::ValidationError(format!("JSON serialization error: {error}"))
    }
}

impl From<config::ConfigError> for MinerError {
    fn from(error: config::ConfigError) -> Self {
        MinerError::ConfigurationError(error.to_string())
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for MinerError {
    fn from(err: sqlx::Error) -> Self {
        MinerError::DatabaseError(err.to_string())
    }
}

impl From<MiningError> for MinerError {
    fn from(err: MiningError) -> Self {
        MinerError::MiningError(err.to_string())
    }
}

pub type MinerResult<T> = anyhow::Result<T, MinerError>;
pub type MiningResult<T> = anyhow::Result<T, MiningError>;

/// Failures of the mining lifecycle and serialization operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MiningError {
    /// The external mining engine could not be reached
    #[error("Mining engine '{engine}' is unavailable: {reason}")]
    DriverUnavailable { engine: String, reason: String },

    /// The mining engine (or local parsing) rejected the task configuration
    #[error("Invalid task settings: {reason}")]
    InvalidSettings { reason: String },

    /// Rules or a full PMML export were requested before the task was solved
    #[error("Task {task_id} has not been solved (state: {state})")]
    StateNotSolved { task_id: i64, state: TaskState },

    /// The import continuation guard rejected a second concurrent round
    #[error("Import for task {task_id} is not waiting (import state: {import_state})")]
    ImportAlreadyInProgress {
        task_id: i64,
        import_state: ImportState,
    },

    /// Rule graph violates an invariant (missing binding, dangling reference, cycle)
    #[error("Malformed rule graph: {reason}")]
    MalformedRuleGraph { reason: String },

    /// The driver call failed for a reason other than availability or settings
    #[error("Mining operation '{operation}' failed for task {task_id}: {reason}")]
    DriverFailure {
        task_id: i64,
        operation: String,
        reason: String,
    },

    #[error("Task {task_uuid} not found for miner {miner_id}")]
    TaskNotFound { miner_id: i64, task_uuid: Uuid },

    #[error("Task {task_id} not found")]
    TaskIdNotFound { task_id: i64 },

    #[error("Miner {miner_id} not found")]
    MinerNotFound { miner_id: i64 },

    #[error("Rule {rule_id} not found in task {task_id}")]
    RuleNotFound { task_id: i64, rule_id: i64 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl MiningError {
    /// Whether the error is the caller's fault rather than an infrastructure failure
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidSettings { .. }
                | Self::StateNotSolved { .. }
                | Self::TaskNotFound { .. }
                | Self::TaskIdNotFound { .. }
                | Self::MinerNotFound { .. }
                | Self::RuleNotFound { .. }
                | Self::InvalidInput(_)
        )
    }
}
