//! Scripted mining driver and recording dispatcher.

use async_trait::async_trait;
use miner_core::dispatch::ImportDispatcher;
use miner_core::driver::{DriverError, DriverOperation, DriverResult, MiningDriver};
use miner_core::models::{Miner, Task, TaskRuleSet};
use miner_core::repository::{InMemoryRuleRepository, RuleRepository};
use miner_core::state_machine::TaskStateSnapshot;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// One recorded driver call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverCall {
    pub operation: DriverOperation,
    pub task_id: i64,
}

/// Driver replaying queued responses per operation.
///
/// An empty check queue reports the task's persisted state back unchanged,
/// which models an engine with no progress since the last poll. Every other
/// empty queue fails the call.
pub struct ScriptedDriver {
    start: Mutex<VecDeque<DriverResult<TaskStateSnapshot>>>,
    check: Mutex<VecDeque<DriverResult<TaskStateSnapshot>>>,
    stop: Mutex<VecDeque<DriverResult<TaskStateSnapshot>>>,
    import: Mutex<VecDeque<DriverResult<TaskStateSnapshot>>>,
    /// Rule slices written to the rule store on each successful import call
    import_batches: Mutex<VecDeque<TaskRuleSet>>,
    import_delay: Mutex<Option<Duration>>,
    calls: Mutex<Vec<DriverCall>>,
    rules: Arc<InMemoryRuleRepository>,
}

impl ScriptedDriver {
    pub fn new(rules: Arc<InMemoryRuleRepository>) -> Self {
        Self {
            start: Mutex::new(VecDeque::new()),
            check: Mutex::new(VecDeque::new()),
            stop: Mutex::new(VecDeque::new()),
            import: Mutex::new(VecDeque::new()),
            import_batches: Mutex::new(VecDeque::new()),
            import_delay: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            rules,
        }
    }

    pub fn on_start(&self, response: DriverResult<TaskStateSnapshot>) {
        self.start.lock().push_back(response);
    }

    pub fn on_check(&self, response: DriverResult<TaskStateSnapshot>) {
        self.check.lock().push_back(response);
    }

    pub fn on_stop(&self, response: DriverResult<TaskStateSnapshot>) {
        self.stop.lock().push_back(response);
    }

    pub fn on_import(&self, response: DriverResult<TaskStateSnapshot>) {
        self.import.lock().push_back(response);
    }

    pub fn on_import_with_rules(&self, response: TaskStateSnapshot, batch: TaskRuleSet) {
        self.import.lock().push_back(Ok(response));
        self.import_batches.lock().push_back(batch);
    }

    /// Hold every import call for `delay` before answering
    pub fn delay_imports(&self, delay: Duration) {
        *self.import_delay.lock() = Some(delay);
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, operation: DriverOperation) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.operation == operation)
            .count()
    }

    fn record(&self, operation: DriverOperation, task: &Task) {
        self.calls.lock().push(DriverCall {
            operation,
            task_id: task.task_id,
        });
    }

    fn next(
        queue: &Mutex<VecDeque<DriverResult<TaskStateSnapshot>>>,
        operation: DriverOperation,
    ) -> DriverResult<TaskStateSnapshot> {
        queue.lock().pop_front().unwrap_or_else(|| {
            Err(DriverError::Failure(format!(
                "no scripted response for {operation}"
            )))
        })
    }
}

#[async_trait]
impl MiningDriver for ScriptedDriver {
    async fn start_mining(&self, task: &Task, _miner: &Miner) -> DriverResult<TaskStateSnapshot> {
        self.record(DriverOperation::StartMining, task);
        Self::next(&self.start, DriverOperation::StartMining)
    }

    async fn check_task_state(
        &self,
        task: &Task,
        _miner: &Miner,
    ) -> DriverResult<TaskStateSnapshot> {
        self.record(DriverOperation::CheckTaskState, task);
        let scripted = self.check.lock().pop_front();
        scripted.unwrap_or_else(|| Ok(task.task_state()))
    }

    async fn stop_mining(&self, task: &Task, _miner: &Miner) -> DriverResult<TaskStateSnapshot> {
        self.record(DriverOperation::StopMining, task);
        Self::next(&self.stop, DriverOperation::StopMining)
    }

    async fn import_results_pmml(
        &self,
        task: &Task,
        _miner: &Miner,
    ) -> DriverResult<TaskStateSnapshot> {
        self.record(DriverOperation::ImportResults, task);
        let delay = *self.import_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let response = Self::next(&self.import, DriverOperation::ImportResults)?;
        let batch = self.import_batches.lock().pop_front();
        if let Some(batch) = batch {
            self.rules
                .store_rules(task.task_id, batch)
                .await
                .map_err(|err| DriverError::Failure(err.to_string()))?;
        }
        Ok(response)
    }

    fn description(&self) -> &'static str {
        "scripted test driver"
    }
}

/// Dispatcher that only records the task ids it was asked to continue
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    dispatched: Mutex<Vec<i64>>,
}

impl RecordingDispatcher {
    pub fn dispatched(&self) -> Vec<i64> {
        self.dispatched.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.dispatched.lock().len()
    }
}

impl ImportDispatcher for RecordingDispatcher {
    fn dispatch(&self, task_id: i64) {
        self.dispatched.lock().push(task_id);
    }

    fn description(&self) -> &'static str {
        "recording test dispatcher"
    }
}
