//! In-memory repositories.
//!
//! Backed by `DashMap`; a compare-and-set holds the shard write lock of the
//! task entry for the whole read-check-write, so it is atomic with respect to
//! every other writer of the same task.

use super::{
    ColumnStatisticsProvider, MinerRepository, NumericSummary, RepositoryError,
    RepositoryResult, RuleQuery, RuleRepository, TaskRepository,
};
use crate::models::{Miner, NewTask, Rule, Task, TaskRuleSet};
use crate::state_machine::ImportState;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct InMemoryTaskRepository {
    tasks: DashMap<i64, Task>,
    last_id: AtomicI64,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn find_task(&self, task_id: i64) -> RepositoryResult<Option<Task>> {
        Ok(self.tasks.get(&task_id).map(|entry| entry.value().clone()))
    }

    async fn find_task_by_uuid(
        &self,
        miner_id: i64,
        task_uuid: Uuid,
    ) -> RepositoryResult<Option<Task>> {
        Ok(self
            .tasks
            .iter()
            .find(|entry| entry.miner_id == miner_id && entry.task_uuid == task_uuid)
            .map(|entry| entry.value().clone()))
    }

    async fn create_task(&self, new_task: NewTask) -> RepositoryResult<Task> {
        if self.find_task_by_uuid(new_task.miner_id, new_task.task_uuid).await?.is_some() {
            return Err(RepositoryError::DuplicateTask {
                miner_id: new_task.miner_id,
                task_uuid: new_task.task_uuid,
            });
        }

        let task_id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;
        let task = Task::from_new(task_id, new_task);
        self.tasks.insert(task_id, task.clone());
        Ok(task)
    }

    async fn save_task(&self, task: &Task) -> RepositoryResult<Task> {
        let mut entry = self
            .tasks
            .get_mut(&task.task_id)
            .ok_or(RepositoryError::TaskNotFound(task.task_id))?;

        let mut stored = task.clone();
        stored.updated_at = Utc::now();
        *entry = stored.clone();
        Ok(stored)
    }

    async fn update_import_state(
        &self,
        task_id: i64,
        import_state: ImportState,
    ) -> RepositoryResult<()> {
        let mut entry = self
            .tasks
            .get_mut(&task_id)
            .ok_or(RepositoryError::TaskNotFound(task_id))?;
        entry.import_state = import_state;
        entry.updated_at = Utc::now();
        Ok(())
    }

    async fn compare_and_set_import_state(
        &self,
        task_id: i64,
        expected: ImportState,
        new: ImportState,
    ) -> RepositoryResult<bool> {
        let mut entry = self
            .tasks
            .get_mut(&task_id)
            .ok_or(RepositoryError::TaskNotFound(task_id))?;
        if entry.import_state != expected {
            return Ok(false);
        }
        entry.import_state = new;
        entry.updated_at = Utc::now();
        Ok(true)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryRuleRepository {
    rule_sets: DashMap<i64, TaskRuleSet>,
}

impl InMemoryRuleRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RuleRepository for InMemoryRuleRepository {
    async fn find_rules(&self, task_id: i64, query: RuleQuery) -> RepositoryResult<Vec<Rule>> {
        let mut rules = self
            .rule_sets
            .get(&task_id)
            .map(|entry| entry.rules.clone())
            .unwrap_or_default();

        query.order.sort(&mut rules);
        Ok(rules
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect())
    }

    async fn find_rule(&self, task_id: i64, rule_id: i64) -> RepositoryResult<Option<Rule>> {
        Ok(self.rule_sets.get(&task_id).and_then(|entry| {
            entry
                .rules
                .iter()
                .find(|rule| rule.rule_id == rule_id)
                .cloned()
        }))
    }

    async fn set_rule_clipboard(
        &self,
        task_id: i64,
        rule_id: i64,
        in_rule_clipboard: bool,
    ) -> RepositoryResult<Rule> {
        let not_found = RepositoryError::RuleNotFound { task_id, rule_id };
        let mut entry = self.rule_sets.get_mut(&task_id).ok_or(not_found.clone())?;
        let rule = entry
            .rules
            .iter_mut()
            .find(|rule| rule.rule_id == rule_id)
            .ok_or(not_found)?;
        rule.in_rule_clipboard = in_rule_clipboard;
        Ok(rule.clone())
    }

    async fn load_task_rules(&self, task_id: i64) -> RepositoryResult<TaskRuleSet> {
        Ok(self
            .rule_sets
            .get(&task_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn store_rules(&self, task_id: i64, rule_set: TaskRuleSet) -> RepositoryResult<()> {
        let mut entry = self.rule_sets.entry(task_id).or_default();
        // A replayed import slice keeps the rules already stored
        let mut known: HashSet<i64> = entry.rules.iter().map(|rule| rule.rule_id).collect();
        let fresh: Vec<Rule> = rule_set
            .rules
            .into_iter()
            .filter(|rule| known.insert(rule.rule_id))
            .collect();
        entry.rules.extend(fresh);
        entry.graph.merge(rule_set.graph);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryMinerRepository {
    miners: DashMap<i64, Miner>,
}

impl InMemoryMinerRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_miner(miner: Miner) -> Self {
        let repository = Self::new();
        repository.miners.insert(miner.miner_id, miner);
        repository
    }
}

#[async_trait]
impl MinerRepository for InMemoryMinerRepository {
    async fn find_miner(&self, miner_id: i64) -> RepositoryResult<Option<Miner>> {
        Ok(self.miners.get(&miner_id).map(|entry| entry.value().clone()))
    }

    async fn save_miner(&self, miner: &Miner) -> RepositoryResult<()> {
        self.miners.insert(miner.miner_id, miner.clone());
        Ok(())
    }
}

type ColumnKey = (String, String);

/// Statistics seeded explicitly; unknown columns report no values
#[derive(Debug, Default)]
pub struct InMemoryColumnStatistics {
    frequencies: RwLock<HashMap<ColumnKey, IndexMap<String, u64>>>,
    summaries: RwLock<HashMap<ColumnKey, NumericSummary>>,
}

impl InMemoryColumnStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_frequencies<I, K>(&self, table: &str, column: &str, values: I)
    where
        I: IntoIterator<Item = (K, u64)>,
        K: Into<String>,
    {
        let values = values.into_iter().map(|(k, v)| (k.into(), v)).collect();
        self.frequencies
            .write()
            .insert((table.to_string(), column.to_string()), values);
    }

    pub fn set_numeric_summary(&self, table: &str, column: &str, summary: NumericSummary) {
        self.summaries
            .write()
            .insert((table.to_string(), column.to_string()), summary);
    }
}

#[async_trait]
impl ColumnStatisticsProvider for InMemoryColumnStatistics {
    async fn value_frequencies(
        &self,
        table: &str,
        column: &str,
    ) -> RepositoryResult<IndexMap<String, u64>> {
        Ok(self
            .frequencies
            .read()
            .get(&(table.to_string(), column.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn numeric_summary(
        &self,
        table: &str,
        column: &str,
    ) -> RepositoryResult<Option<NumericSummary>> {
        Ok(self
            .summaries
            .read()
            .get(&(table.to_string(), column.to_string()))
            .copied())
    }
}
