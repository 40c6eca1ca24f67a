#![allow(dead_code)]

pub mod builders;
pub mod mock_driver;
pub mod strategies;

pub use builders::*;
pub use mock_driver::*;

use miner_core::config::MinerConfig;
use miner_core::driver::MiningDriverRegistry;
use miner_core::models::{Miner, MinerType, Task};
use miner_core::repository::{
    InMemoryColumnStatistics, InMemoryMinerRepository, InMemoryRuleRepository,
    InMemoryTaskRepository, TaskRepository,
};
use miner_core::services::{MiningRepositories, TaskIdentity, TaskMiningService};
use std::sync::Arc;
use uuid::Uuid;

/// Service wired to in-memory repositories, a scripted driver and a recording dispatcher
pub struct MiningHarness {
    pub service: Arc<TaskMiningService>,
    pub tasks: Arc<InMemoryTaskRepository>,
    pub rules: Arc<InMemoryRuleRepository>,
    pub statistics: Arc<InMemoryColumnStatistics>,
    pub driver: Arc<ScriptedDriver>,
    pub dispatcher: Arc<RecordingDispatcher>,
    pub miner: Miner,
}

impl MiningHarness {
    pub fn new() -> Self {
        Self::with_config(MinerConfig::default())
    }

    pub fn with_config(config: MinerConfig) -> Self {
        let miner = heart_miner(MinerType::LispMiner);
        let tasks = Arc::new(InMemoryTaskRepository::new());
        let rules = Arc::new(InMemoryRuleRepository::new());
        let statistics = Arc::new(heart_statistics());
        let driver = Arc::new(ScriptedDriver::new(rules.clone()));
        let dispatcher = Arc::new(RecordingDispatcher::default());

        let drivers = Arc::new(MiningDriverRegistry::new());
        drivers.register(miner.miner_type.clone(), driver.clone());

        let repositories = MiningRepositories {
            tasks: tasks.clone(),
            rules: rules.clone(),
            miners: Arc::new(InMemoryMinerRepository::with_miner(miner.clone())),
            statistics: statistics.clone(),
        };
        let service = Arc::new(TaskMiningService::new(
            repositories,
            drivers,
            dispatcher.clone(),
            &config,
        ));

        Self {
            service,
            tasks,
            rules,
            statistics,
            driver,
            dispatcher,
            miner,
        }
    }

    /// Fresh identity under the harness miner
    pub fn identity(&self) -> TaskIdentity {
        TaskIdentity::new(self.miner.miner_id, Uuid::new_v4())
    }

    pub async fn find_task(&self, identity: TaskIdentity) -> Option<Task> {
        self.tasks
            .find_task_by_uuid(identity.miner_id, identity.task_uuid)
            .await
            .unwrap()
    }

    pub async fn stored_task(&self, identity: TaskIdentity) -> Task {
        self.find_task(identity)
            .await
            .expect("task should be persisted")
    }
}
