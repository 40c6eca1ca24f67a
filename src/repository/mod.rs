//! # Repository Layer
//!
//! Persistence boundary for tasks, rules, miners and column statistics.
//!
//! The core only relies on last-write-wins semantics for task rows, plus an
//! optional compare-and-set on `import_state` used by
//! [`crate::state_machine::AtomicImportGuard`]. Two implementations are provided:
//! [`memory`] for tests and embedded use, and [`postgres`] behind the
//! `postgres` feature.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

use crate::models::{Miner, NewTask, Rule, RuleOrder, Task, TaskRuleSet};
use crate::state_machine::ImportState;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use memory::{
    InMemoryColumnStatistics, InMemoryMinerRepository, InMemoryRuleRepository,
    InMemoryTaskRepository,
};
#[cfg(feature = "postgres")]
pub use postgres::{PgColumnStatistics, PgMinerRepository, PgRuleRepository, PgTaskRepository};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RepositoryError {
    #[error("Task {0} not found")]
    TaskNotFound(i64),

    #[error("Task {task_uuid} already exists for miner {miner_id}")]
    DuplicateTask { miner_id: i64, task_uuid: Uuid },

    #[error("Rule {rule_id} not found in task {task_id}")]
    RuleNotFound { task_id: i64, rule_id: i64 },

    #[error("Miner {0} not found")]
    MinerNotFound(i64),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<RepositoryError> for crate::error::MinerError {
    fn from(err: RepositoryError) -> Self {
        crate::error::MinerError::DatabaseError(err.to_string())
    }
}

impl From<RepositoryError> for crate::error::MiningError {
    fn from(err: RepositoryError) -> Self {
        use crate::error::MiningError;
        match err {
            RepositoryError::TaskNotFound(task_id) => MiningError::TaskIdNotFound { task_id },
            RepositoryError::RuleNotFound { task_id, rule_id } => {
                MiningError::RuleNotFound { task_id, rule_id }
            }
            RepositoryError::MinerNotFound(miner_id) => MiningError::MinerNotFound { miner_id },
            other => MiningError::Repository(other.to_string()),
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Paging and ordering for rule listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleQuery {
    pub offset: u32,
    pub limit: u32,
    pub order: RuleOrder,
}

impl RuleQuery {
    pub fn new(offset: u32, limit: u32, order: RuleOrder) -> Self {
        Self {
            offset,
            limit,
            order,
        }
    }
}

/// Observed range of a numeric column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericSummary {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn find_task(&self, task_id: i64) -> RepositoryResult<Option<Task>>;

    async fn find_task_by_uuid(
        &self,
        miner_id: i64,
        task_uuid: Uuid,
    ) -> RepositoryResult<Option<Task>>;

    /// Insert a task in `new`/`none`
    async fn create_task(&self, new_task: NewTask) -> RepositoryResult<Task>;

    /// Overwrite the stored row with `task`; last write wins
    async fn save_task(&self, task: &Task) -> RepositoryResult<Task>;

    /// Unconditionally store a new import state
    async fn update_import_state(
        &self,
        task_id: i64,
        import_state: ImportState,
    ) -> RepositoryResult<()>;

    /// Store `new` only if the stored import state equals `expected`.
    ///
    /// Returns whether the write happened.
    async fn compare_and_set_import_state(
        &self,
        task_id: i64,
        expected: ImportState,
        new: ImportState,
    ) -> RepositoryResult<bool>;
}

#[async_trait]
pub trait RuleRepository: Send + Sync {
    async fn find_rules(&self, task_id: i64, query: RuleQuery) -> RepositoryResult<Vec<Rule>>;

    async fn find_rule(&self, task_id: i64, rule_id: i64) -> RepositoryResult<Option<Rule>>;

    /// Set the clipboard flag, the only mutation allowed on a stored rule
    async fn set_rule_clipboard(
        &self,
        task_id: i64,
        rule_id: i64,
        in_rule_clipboard: bool,
    ) -> RepositoryResult<Rule>;

    /// All rules of a task in insertion order plus the reachable rule graph
    async fn load_task_rules(&self, task_id: i64) -> RepositoryResult<TaskRuleSet>;

    /// Append an imported slice of rules and graph nodes
    async fn store_rules(&self, task_id: i64, rule_set: TaskRuleSet) -> RepositoryResult<()>;
}

#[async_trait]
pub trait MinerRepository: Send + Sync {
    async fn find_miner(&self, miner_id: i64) -> RepositoryResult<Option<Miner>>;

    async fn save_miner(&self, miner: &Miner) -> RepositoryResult<()>;
}

/// Value statistics over raw and preprocessed tables
#[async_trait]
pub trait ColumnStatisticsProvider: Send + Sync {
    /// Occurrence count per distinct value, in the provider's order
    async fn value_frequencies(
        &self,
        table: &str,
        column: &str,
    ) -> RepositoryResult<IndexMap<String, u64>>;

    /// Range of a numeric column; `None` when the column holds no values
    async fn numeric_summary(
        &self,
        table: &str,
        column: &str,
    ) -> RepositoryResult<Option<NumericSummary>>;
}
