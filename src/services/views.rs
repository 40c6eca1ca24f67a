//! Caller-facing views returned by [`super::TaskMiningService`].

use crate::models::{MinerType, Rule, Task};
use crate::state_machine::{ImportState, TaskState};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

/// Client-side identity of a task: the owning miner and the task UUID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskIdentity {
    pub miner_id: i64,
    pub task_uuid: Uuid,
}

impl TaskIdentity {
    pub fn new(miner_id: i64, task_uuid: Uuid) -> Self {
        Self {
            miner_id,
            task_uuid,
        }
    }
}

impl fmt::Display for TaskIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.miner_id, self.task_uuid)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStateView {
    pub state: TaskState,
    pub import_state: ImportState,
    pub rules_count: i64,
}

impl From<&Task> for TaskStateView {
    fn from(task: &Task) -> Self {
        Self {
            state: task.state,
            import_state: task.import_state,
            rules_count: task.rules_count,
        }
    }
}

/// Simple task details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    pub id: i64,
    pub miner: i64,
    #[serde(rename = "type")]
    pub miner_type: MinerType,
    pub name: String,
    pub state: TaskState,
    pub import_state: ImportState,
    pub rules_count: i64,
}

impl TaskView {
    pub fn new(task: &Task, miner_type: MinerType) -> Self {
        Self {
            id: task.task_id,
            miner: task.miner_id,
            miner_type,
            name: task.name.clone(),
            state: task.state,
            import_state: task.import_state,
            rules_count: task.rules_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleListView {
    pub task: RuleListTaskView,
    pub rules: Vec<RuleView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleListTaskView {
    pub name: String,
    pub rules_count: i64,
    #[serde(rename = "IMs")]
    pub ims: Vec<String>,
    pub state: TaskState,
    pub import_state: ImportState,
}

impl From<&Task> for RuleListTaskView {
    fn from(task: &Task) -> Self {
        Self {
            name: task.name.clone(),
            rules_count: task.rules_count,
            ims: task.interest_measures(),
            state: task.state,
            import_state: task.import_state,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleView {
    pub id: i64,
    pub text: String,
    pub a: i64,
    pub b: i64,
    pub c: i64,
    pub d: i64,
    /// Written as `"1"`/`"0"`
    #[serde(serialize_with = "serialize_flag")]
    pub selected: bool,
}

impl From<&Rule> for RuleView {
    fn from(rule: &Rule) -> Self {
        Self {
            id: rule.rule_id,
            text: rule.text.clone(),
            a: rule.a,
            b: rule.b,
            c: rule.c,
            d: rule.d,
            selected: rule.in_rule_clipboard,
        }
    }
}

fn serialize_flag<S: Serializer>(flag: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(if *flag { "1" } else { "0" })
}
