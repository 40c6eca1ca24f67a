//! # Task Model
//!
//! A mining task submitted to an external engine on behalf of a miner.
//!
//! Tasks are created in state `new` on the first mining request for an unknown
//! `(miner, uuid)` pair and are mutated on every driver response. Deletion is
//! handled outside of this crate.

use crate::state_machine::{ImportState, TaskState, TaskStateSnapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Persisted mining task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: i64,
    /// External correlation key chosen by the client
    pub task_uuid: Uuid,
    pub miner_id: i64,
    pub name: String,
    pub state: TaskState,
    pub import_state: ImportState,
    /// Opaque settings document forwarded to the mining engine
    pub task_settings_json: String,
    pub rules_count: i64,
    pub import_data: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New task for creation (without generated fields)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    pub task_uuid: Uuid,
    pub miner_id: i64,
    pub name: String,
}

impl NewTask {
    pub fn new(miner_id: i64, task_uuid: Uuid) -> Self {
        Self {
            task_uuid,
            miner_id,
            name: task_uuid.to_string(),
        }
    }
}

impl Task {
    /// Build a fresh task in `new`/`none`
    pub fn from_new(task_id: i64, new_task: NewTask) -> Self {
        let now = Utc::now();
        Self {
            task_id,
            task_uuid: new_task.task_uuid,
            miner_id: new_task.miner_id,
            name: new_task.name,
            state: TaskState::New,
            import_state: ImportState::None,
            task_settings_json: String::new(),
            rules_count: 0,
            import_data: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Current state tuple as last reported by the engine
    pub fn task_state(&self) -> TaskStateSnapshot {
        TaskStateSnapshot {
            state: self.state,
            import_state: self.import_state,
            rules_count: self.rules_count,
            import_data: self.import_data.clone(),
        }
    }

    /// Names of the interest measures configured in the task settings
    pub fn interest_measures(&self) -> Vec<String> {
        let Ok(settings) = serde_json::from_str::<Value>(&self.task_settings_json) else {
            return Vec::new();
        };

        settings
            .pointer("/rule0/IMs")
            .and_then(Value::as_array)
            .map(|ims| {
                ims.iter()
                    .filter_map(|im| im.get("name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
pub(crate) fn test_task() -> Task {
    let mut task = Task::from_new(
        1,
        NewTask {
            task_uuid: Uuid::nil(),
            miner_id: 1,
            name: "test task".to_string(),
        },
    );
    task.task_settings_json = r#"{"taskName":"test task"}"#.to_string();
    task
}
