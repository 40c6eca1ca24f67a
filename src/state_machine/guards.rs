//! Re-entrancy guards for the background import continuation.
//!
//! A continuation may only run while the stored import state is `waiting`; the
//! guard marks the task `partial` before any import work starts. Two strategies
//! are available:
//!
//! - [`BestEffortImportGuard`] reads, checks and writes in separate repository
//!   calls. Two triggers racing between the read and the write can both pass.
//! - [`AtomicImportGuard`] performs a single compare-and-set at the repository,
//!   so at most one trigger passes.

use super::errors::{import_not_waiting, GuardError, GuardResult};
use super::states::ImportState;
use crate::models::Task;
use crate::repository::TaskRepository;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Guard admitting at most one import round per waiting task
#[async_trait]
pub trait ImportGuard: Send + Sync + fmt::Debug {
    /// Mark the task `partial` and return it, or reject when it is not `waiting`
    async fn try_begin_import(
        &self,
        tasks: &dyn TaskRepository,
        task_id: i64,
    ) -> GuardResult<Task>;

    /// Get a description of this guard for logging
    fn description(&self) -> &'static str;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BestEffortImportGuard;

#[async_trait]
impl ImportGuard for BestEffortImportGuard {
    async fn try_begin_import(
        &self,
        tasks: &dyn TaskRepository,
        task_id: i64,
    ) -> GuardResult<Task> {
        let mut task = tasks
            .find_task(task_id)
            .await?
            .ok_or(GuardError::TaskNotFound { task_id })?;

        if task.import_state != ImportState::Waiting {
            return Err(import_not_waiting(task_id, task.import_state));
        }

        tasks
            .update_import_state(task_id, ImportState::Partial)
            .await?;
        task.import_state = ImportState::Partial;

        debug!(task_id, guard = self.description(), "Import round admitted");
        Ok(task)
    }

    fn description(&self) -> &'static str {
        "best-effort check-then-act on import state"
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AtomicImportGuard;

#[async_trait]
impl ImportGuard for AtomicImportGuard {
    async fn try_begin_import(
        &self,
        tasks: &dyn TaskRepository,
        task_id: i64,
    ) -> GuardResult<Task> {
        let admitted = tasks
            .compare_and_set_import_state(task_id, ImportState::Waiting, ImportState::Partial)
            .await
            .map_err(|err| match err {
                crate::repository::RepositoryError::TaskNotFound(task_id) => {
                    GuardError::TaskNotFound { task_id }
                }
                other => GuardError::Repository(other),
            })?;

        let task = tasks
            .find_task(task_id)
            .await?
            .ok_or(GuardError::TaskNotFound { task_id })?;

        if !admitted {
            return Err(import_not_waiting(task_id, task.import_state));
        }

        debug!(task_id, guard = self.description(), "Import round admitted");
        Ok(task)
    }

    fn description(&self) -> &'static str {
        "atomic compare-and-set on import state"
    }
}

/// Import guard selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportGuardKind {
    #[default]
    BestEffort,
    Atomic,
}

impl ImportGuardKind {
    pub fn build(&self) -> Arc<dyn ImportGuard> {
        match self {
            Self::BestEffort => Arc::new(BestEffortImportGuard),
            Self::Atomic => Arc::new(AtomicImportGuard),
        }
    }
}
