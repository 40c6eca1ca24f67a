use miner_core::state_machine::{ImportState, TaskState, TaskStateSnapshot};
use proptest::prelude::*;

pub fn task_state_strategy() -> impl Strategy<Value = TaskState> {
    prop_oneof![
        Just(TaskState::New),
        Just(TaskState::InProgress),
        Just(TaskState::Solved),
        Just(TaskState::Failed),
        Just(TaskState::Interrupted),
        Just(TaskState::SolvedHeads),
    ]
}

pub fn import_state_strategy() -> impl Strategy<Value = ImportState> {
    prop_oneof![
        Just(ImportState::None),
        Just(ImportState::Waiting),
        Just(ImportState::Partial),
        Just(ImportState::Done),
    ]
}

/// Arbitrary driver response, with or without import data
pub fn snapshot_strategy() -> impl Strategy<Value = TaskStateSnapshot> {
    (
        task_state_strategy(),
        import_state_strategy(),
        0i64..10_000,
        prop::option::of(0u32..100),
    )
        .prop_map(|(state, import_state, rules_count, pending)| {
            let snapshot = TaskStateSnapshot::new(state, import_state, rules_count);
            match pending {
                Some(pending) => {
                    snapshot.with_import_data(serde_json::json!({ "pending": pending }))
                }
                None => snapshot,
            }
        })
}

/// Which caller-facing operation delivers a driver response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerOperation {
    StartOrCheck,
    Stop,
}

pub fn caller_operation_strategy() -> impl Strategy<Value = CallerOperation> {
    prop_oneof![Just(CallerOperation::StartOrCheck), Just(CallerOperation::Stop)]
}
