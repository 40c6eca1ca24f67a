//! Driver-reported task state and the merge rules applied to persisted tasks.
//!
//! The mining engine is the only authority on `state` and `import_state`; the
//! core never computes a transition itself. The single local decision is
//! whether another background import round has to be scheduled.

use super::states::{ImportState, TaskState};
use crate::models::Task;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Value object returned by every mining driver call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStateSnapshot {
    pub state: TaskState,
    pub import_state: ImportState,
    pub rules_count: i64,
    /// Opaque driver data describing the pending import work
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_data: Option<Value>,
}

impl TaskStateSnapshot {
    pub fn new(state: TaskState, import_state: ImportState, rules_count: i64) -> Self {
        Self {
            state,
            import_state,
            rules_count,
            import_data: None,
        }
    }

    pub fn with_import_data(mut self, import_data: Value) -> Self {
        self.import_data = Some(import_data);
        self
    }

    /// Snapshot describing a task that has been handed to the engine
    pub fn in_progress() -> Self {
        Self::new(TaskState::InProgress, ImportState::None, 0)
    }
}

/// Apply a driver response to a persisted task.
///
/// State, import state, rule count and import data are always taken from the
/// response, whatever the persisted values were.
pub fn merge_task_state(persisted: &Task, response: &TaskStateSnapshot) -> Task {
    Task {
        state: response.state,
        import_state: response.import_state,
        rules_count: response.rules_count,
        import_data: response.import_data.clone(),
        ..persisted.clone()
    }
}

/// Whether a merged task requires another background import round
pub fn needs_import_continuation(merged: &Task) -> bool {
    merged.import_state == ImportState::Waiting
}
