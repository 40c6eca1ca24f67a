//! # Mining Driver Boundary
//!
//! Contract of the external mining engines. Every call returns a
//! [`TaskStateSnapshot`]; the caller merges it into the persisted task without
//! second-guessing it.
//!
//! Drivers are resolved per miner engine type through
//! [`MiningDriverRegistry`].

pub mod registry;

pub use registry::MiningDriverRegistry;

use crate::error::MiningError;
use crate::models::{Miner, MinerType, Task};
use crate::state_machine::TaskStateSnapshot;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DriverError {
    /// The engine could not be reached
    #[error("Mining engine unavailable: {0}")]
    Unavailable(String),

    /// The engine rejected the task configuration
    #[error("Mining engine rejected task settings: {0}")]
    InvalidSettings(String),

    #[error("Mining engine failure: {0}")]
    Failure(String),
}

pub type DriverResult<T> = Result<T, DriverError>;

/// Driver operation names used in logs and errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverOperation {
    StartMining,
    CheckTaskState,
    StopMining,
    ImportResults,
}

impl DriverOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StartMining => "start_mining",
            Self::CheckTaskState => "check_task_state",
            Self::StopMining => "stop_mining",
            Self::ImportResults => "import_results_pmml",
        }
    }
}

impl std::fmt::Display for DriverOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DriverError {
    /// Translate into the caller-facing taxonomy
    pub fn into_mining_error(
        self,
        engine: &MinerType,
        task_id: i64,
        operation: DriverOperation,
    ) -> MiningError {
        match self {
            Self::Unavailable(reason) => MiningError::DriverUnavailable {
                engine: engine.to_string(),
                reason,
            },
            Self::InvalidSettings(reason) => MiningError::InvalidSettings { reason },
            Self::Failure(reason) => MiningError::DriverFailure {
                task_id,
                operation: operation.to_string(),
                reason,
            },
        }
    }
}

/// External mining engine
#[async_trait]
pub trait MiningDriver: Send + Sync {
    /// Submit the task settings and dataset identity to the engine
    async fn start_mining(&self, task: &Task, miner: &Miner) -> DriverResult<TaskStateSnapshot>;

    /// Poll the current status; must be free of side effects beyond the refresh
    async fn check_task_state(&self, task: &Task, miner: &Miner)
        -> DriverResult<TaskStateSnapshot>;

    /// Request cancellation; the engine may still report `solved`
    async fn stop_mining(&self, task: &Task, miner: &Miner) -> DriverResult<TaskStateSnapshot>;

    /// Import one bounded slice of results into the rule graph
    async fn import_results_pmml(
        &self,
        task: &Task,
        miner: &Miner,
    ) -> DriverResult<TaskStateSnapshot>;

    /// Get a description of this driver for logging
    fn description(&self) -> &'static str {
        "mining driver"
    }
}
