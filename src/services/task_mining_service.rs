//! # Task Mining Service
//!
//! Caller-facing operation surface of the mining core: starting and polling
//! mining, stopping it, the background import continuation, rule listing and
//! the PMML exports.
//!
//! Every driver response is merged into the persisted task as-is. The only
//! local decision is whether another import round must be dispatched, which
//! happens whenever the merged import state is `waiting`.

use super::views::{
    RuleListTaskView, RuleListView, RuleView, TaskIdentity, TaskStateView, TaskView,
};
use crate::config::{MinerConfig, RulesConfig};
use crate::dispatch::{
    DispatchMode, HttpImportDispatcher, ImportContinuation, ImportDispatcher, ImportWorker,
    ImportWorkerHandle, QueueImportDispatcher,
};
use crate::driver::{DriverOperation, MiningDriver, MiningDriverRegistry};
use crate::error::{MinerError, MinerResult, MiningError, MiningResult};
use crate::events::{EventPublisher, TaskEvent};
use crate::logging::{log_error, log_import_operation, log_mining_operation, log_serialization};
use crate::models::{Miner, NewTask, RuleOrder, Task};
use crate::pmml::{
    GuhaPmmlSerializer, GuhaTaskSettingsSerializer, NumberFormat, SerializerOptions,
    TaskSettingsSerializer,
};
use crate::repository::{
    ColumnStatisticsProvider, MinerRepository, RepositoryError, RuleQuery, RuleRepository,
    TaskRepository,
};
use crate::state_machine::{
    merge_task_state, needs_import_continuation, GuardError, ImportGuard, TaskState,
    TaskStateSnapshot,
};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;
use tracing::{debug, info, instrument, warn};

/// Persistence collaborators of the service
#[derive(Clone)]
pub struct MiningRepositories {
    pub tasks: Arc<dyn TaskRepository>,
    pub rules: Arc<dyn RuleRepository>,
    pub miners: Arc<dyn MinerRepository>,
    pub statistics: Arc<dyn ColumnStatisticsProvider>,
}

/// Result of one background import unit of work
#[derive(Debug, Clone, PartialEq)]
pub enum ImportRoundOutcome {
    /// The task carries no import data; nothing was touched
    NothingToImport,
    /// The guard rejected the round because another one is running or done
    AlreadyInProgress,
    /// The round ran and its response was persisted
    Completed {
        state: TaskStateView,
        rescheduled: bool,
    },
}

pub struct TaskMiningService {
    repositories: MiningRepositories,
    drivers: Arc<MiningDriverRegistry>,
    dispatcher: Arc<dyn ImportDispatcher>,
    guard: Arc<dyn ImportGuard>,
    events: EventPublisher,
    settings_serializer: Arc<dyn TaskSettingsSerializer>,
    serializer_options: SerializerOptions,
    rules_config: RulesConfig,
}

impl std::fmt::Debug for TaskMiningService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskMiningService")
            .field("drivers", &self.drivers)
            .field("dispatcher", &self.dispatcher.description())
            .field("guard", &self.guard.description())
            .finish()
    }
}

impl TaskMiningService {
    pub fn new(
        repositories: MiningRepositories,
        drivers: Arc<MiningDriverRegistry>,
        dispatcher: Arc<dyn ImportDispatcher>,
        config: &MinerConfig,
    ) -> Self {
        let serializer_options = SerializerOptions::from(&config.pmml);
        Self {
            repositories,
            drivers,
            dispatcher,
            guard: config.import.guard.build(),
            events: EventPublisher::default(),
            settings_serializer: Arc::new(GuhaTaskSettingsSerializer::new(NumberFormat::new(
                config.pmml.float_precision,
            ))),
            serializer_options,
            rules_config: config.rules.clone(),
        }
    }

    /// Build a service with the dispatcher selected by `config.dispatch.mode`.
    ///
    /// In queue mode an [`ImportWorker`] is started on the current runtime and
    /// its handle returned alongside the service. Queue mode must be called
    /// inside a tokio runtime. The worker holds the service, so its channel
    /// never closes on its own; stop it with [`ImportWorkerHandle::shutdown`].
    pub fn from_config(
        repositories: MiningRepositories,
        drivers: Arc<MiningDriverRegistry>,
        config: &MinerConfig,
    ) -> MinerResult<(Arc<Self>, Option<ImportWorkerHandle>)> {
        config.validate()?;

        match config.dispatch.mode {
            DispatchMode::Http => {
                let dispatcher = Arc::new(HttpImportDispatcher::new(&config.dispatch)?);
                Ok((Arc::new(Self::new(repositories, drivers, dispatcher, config)), None))
            }
            DispatchMode::Queue => {
                let runtime = Handle::try_current().map_err(|e| {
                    MinerError::ConfigurationError(format!(
                        "queue dispatch needs a running tokio runtime: {e}"
                    ))
                })?;
                let (dispatcher, receiver) =
                    QueueImportDispatcher::channel(config.dispatch.queue_capacity);
                let service = Arc::new(Self::new(
                    repositories,
                    drivers,
                    Arc::new(dispatcher),
                    config,
                ));
                let continuation: Arc<dyn ImportContinuation> = service.clone();
                let handle = ImportWorker::new(receiver, continuation).start_on(&runtime);
                Ok((service, Some(handle)))
            }
        }
    }

    pub fn with_event_publisher(mut self, events: EventPublisher) -> Self {
        self.events = events;
        self
    }

    pub fn with_import_guard(mut self, guard: Arc<dyn ImportGuard>) -> Self {
        self.guard = guard;
        self
    }

    pub fn with_settings_serializer(mut self, serializer: Arc<dyn TaskSettingsSerializer>) -> Self {
        self.settings_serializer = serializer;
        self
    }

    pub fn events(&self) -> &EventPublisher {
        &self.events
    }

    /// Submit a new task or poll an existing one.
    ///
    /// An unknown `(miner, uuid)` pair creates the task. A task still in `new`
    /// takes `settings_payload` as its configuration and is handed to the
    /// engine; any other task is polled.
    #[instrument(skip(self, identity, settings_payload), fields(identity = %identity))]
    pub async fn start_or_check_mining(
        &self,
        identity: TaskIdentity,
        settings_payload: &str,
    ) -> MiningResult<TaskStateView> {
        let miner = self.load_miner(identity.miner_id).await?;
        let mut task = self.find_or_create_task(identity).await?;
        let driver = self.drivers.resolve(&miner.miner_type)?;

        let (operation, response) = if task.state == TaskState::New {
            let settings = parse_settings(settings_payload)?;
            if let Some(name) = settings
                .get("taskName")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|name| !name.is_empty())
            {
                task.name = name.to_string();
            }
            task.task_settings_json = settings_payload.to_string();
            task = self.repositories.tasks.save_task(&task).await?;

            let operation = DriverOperation::StartMining;
            let response = driver.start_mining(&task, &miner).await;
            (operation, response)
        } else {
            let operation = DriverOperation::CheckTaskState;
            let response = driver.check_task_state(&task, &miner).await;
            (operation, response)
        };

        let response = self.driver_response(&task, &miner, driver.as_ref(), operation, response)?;
        let merged = self
            .apply_response(&task, &miner, &response, operation)
            .await?;
        Ok(TaskStateView::from(&merged))
    }

    /// Ask the engine to cancel mining; a concurrently finished task stays solved
    #[instrument(skip(self, identity), fields(identity = %identity))]
    pub async fn stop_mining(&self, identity: TaskIdentity) -> MiningResult<TaskStateView> {
        let miner = self.load_miner(identity.miner_id).await?;
        let task = self.load_task(identity).await?;
        let driver = self.drivers.resolve(&miner.miner_type)?;

        let operation = DriverOperation::StopMining;
        let response = driver.stop_mining(&task, &miner).await;
        let response = self.driver_response(&task, &miner, driver.as_ref(), operation, response)?;
        let merged = self
            .apply_response(&task, &miner, &response, operation)
            .await?;
        Ok(TaskStateView::from(&merged))
    }

    /// Run one background import round.
    ///
    /// A failing driver call leaves the task `partial` for a later trigger and
    /// records no failure state.
    #[instrument(skip(self))]
    pub async fn continue_import(&self, task_id: i64) -> MiningResult<ImportRoundOutcome> {
        let stored = self
            .repositories
            .tasks
            .find_task(task_id)
            .await?
            .ok_or(MiningError::TaskIdNotFound { task_id })?;
        if stored.import_data.is_none() {
            debug!(task_id, "No import data, nothing to import");
            return Ok(ImportRoundOutcome::NothingToImport);
        }

        let task = match self
            .guard
            .try_begin_import(self.repositories.tasks.as_ref(), task_id)
            .await
        {
            Ok(task) => task,
            Err(GuardError::ImportNotWaiting { import_state, .. }) => {
                debug!(task_id, import_state = %import_state, "Import round rejected by guard");
                return Ok(ImportRoundOutcome::AlreadyInProgress);
            }
            Err(err) => return Err(err.into()),
        };

        let miner = self.load_miner(task.miner_id).await?;
        let driver = self.drivers.resolve(&miner.miner_type)?;

        let operation = DriverOperation::ImportResults;
        let response = driver.import_results_pmml(&task, &miner).await;
        let response = self.driver_response(&task, &miner, driver.as_ref(), operation, response)?;

        let merged = self.merge_and_persist(&task, &response).await?;
        self.events.publish_task_event(TaskEvent::ImportRoundCompleted {
            task_id,
            import_state: merged.import_state,
            rules_count: merged.rules_count,
        });
        log_import_operation(
            "import_round_completed",
            task_id,
            merged.import_state.as_str(),
            Some(merged.rules_count),
            None,
        );

        let rescheduled = self.schedule_if_waiting(&merged);
        Ok(ImportRoundOutcome::Completed {
            state: TaskStateView::from(&merged),
            rescheduled,
        })
    }

    /// Page through the rules of a solved task
    #[instrument(skip(self, identity), fields(identity = %identity))]
    pub async fn get_rules(
        &self,
        identity: TaskIdentity,
        offset: u32,
        limit: Option<u32>,
        order: &str,
    ) -> MiningResult<RuleListView> {
        let task = self.load_task(identity).await?;
        ensure_solved(&task)?;

        let order = RuleOrder::parse(order)
            .ok_or_else(|| MiningError::InvalidInput(format!("unknown rule order '{order}'")))?;
        let query = RuleQuery::new(offset, self.rules_config.clamp_limit(limit), order);
        let rules = self
            .repositories
            .rules
            .find_rules(task.task_id, query)
            .await?;

        Ok(RuleListView {
            task: RuleListTaskView::from(&task),
            rules: rules.iter().map(RuleView::from).collect(),
        })
    }

    /// Complete PMML export of a solved task, frequencies and rules included
    #[instrument(skip(self, identity), fields(identity = %identity))]
    pub async fn get_full_pmml(&self, identity: TaskIdentity) -> MiningResult<String> {
        let task = self.load_task(identity).await?;
        ensure_solved(&task)?;
        let miner = self.load_miner(task.miner_id).await?;
        let rule_set = self
            .repositories
            .rules
            .load_task_rules(task.task_id)
            .await?;

        let started = Instant::now();
        let mut serializer = self.serializer(&task, &miner);
        serializer.initialize()?;
        serializer.append_task_settings(self.settings_serializer.as_ref())?;
        serializer.append_data_dictionary(true).await?;
        serializer.append_transformation_dictionary(true).await?;
        serializer.append_rules(&rule_set)?;
        let xml = serializer.finish()?;

        log_serialization(
            "full_pmml",
            task.task_id,
            rule_set.rules.len(),
            xml.len(),
            Some(started.elapsed().as_millis() as u64),
        );
        Ok(xml)
    }

    /// Task configuration export: settings and dictionaries without frequencies
    #[instrument(skip(self, identity), fields(identity = %identity))]
    pub async fn get_settings_pmml(&self, identity: TaskIdentity) -> MiningResult<String> {
        let task = self.load_task(identity).await?;
        let miner = self.load_miner(task.miner_id).await?;

        let started = Instant::now();
        let mut serializer = self.serializer(&task, &miner);
        serializer.initialize()?;
        serializer.append_task_settings(self.settings_serializer.as_ref())?;
        serializer.append_data_dictionary(false).await?;
        serializer.append_transformation_dictionary(false).await?;
        let xml = serializer.finish()?;

        log_serialization(
            "settings_pmml",
            task.task_id,
            0,
            xml.len(),
            Some(started.elapsed().as_millis() as u64),
        );
        Ok(xml)
    }

    #[instrument(skip(self, identity), fields(identity = %identity))]
    pub async fn get_task(&self, identity: TaskIdentity) -> MiningResult<TaskView> {
        let miner = self.load_miner(identity.miner_id).await?;
        let task = self.load_task(identity).await?;
        Ok(TaskView::new(&task, miner.miner_type))
    }

    #[instrument(skip(self, identity), fields(identity = %identity))]
    pub async fn rename_task(&self, identity: TaskIdentity, name: &str) -> MiningResult<TaskView> {
        let name = name.trim();
        if name.is_empty() {
            return Err(MiningError::InvalidInput(
                "task name must not be empty".to_string(),
            ));
        }

        let miner = self.load_miner(identity.miner_id).await?;
        let mut task = self.load_task(identity).await?;
        task.name = name.to_string();
        let task = self.repositories.tasks.save_task(&task).await?;

        self.events.publish_task_event(TaskEvent::Renamed {
            task_id: task.task_id,
            name: task.name.clone(),
        });
        Ok(TaskView::new(&task, miner.miner_type))
    }

    /// Mark or unmark a rule as interesting
    #[instrument(skip(self, identity), fields(identity = %identity))]
    pub async fn set_rule_clipboard(
        &self,
        identity: TaskIdentity,
        rule_id: i64,
        in_rule_clipboard: bool,
    ) -> MiningResult<RuleView> {
        let task = self.load_task(identity).await?;
        let rule = self
            .repositories
            .rules
            .set_rule_clipboard(task.task_id, rule_id, in_rule_clipboard)
            .await?;
        Ok(RuleView::from(&rule))
    }

    fn serializer<'a>(&'a self, task: &'a Task, miner: &'a Miner) -> GuhaPmmlSerializer<'a> {
        GuhaPmmlSerializer::new(
            task,
            miner,
            self.repositories.statistics.as_ref(),
            self.serializer_options.clone(),
        )
    }

    async fn load_miner(&self, miner_id: i64) -> MiningResult<Miner> {
        self.repositories
            .miners
            .find_miner(miner_id)
            .await?
            .ok_or(MiningError::MinerNotFound { miner_id })
    }

    async fn load_task(&self, identity: TaskIdentity) -> MiningResult<Task> {
        self.repositories
            .tasks
            .find_task_by_uuid(identity.miner_id, identity.task_uuid)
            .await?
            .ok_or(MiningError::TaskNotFound {
                miner_id: identity.miner_id,
                task_uuid: identity.task_uuid,
            })
    }

    async fn find_or_create_task(&self, identity: TaskIdentity) -> MiningResult<Task> {
        let tasks = &self.repositories.tasks;
        if let Some(task) = tasks
            .find_task_by_uuid(identity.miner_id, identity.task_uuid)
            .await?
        {
            return Ok(task);
        }

        match tasks
            .create_task(NewTask::new(identity.miner_id, identity.task_uuid))
            .await
        {
            Ok(task) => {
                info!(task_id = task.task_id, task_uuid = %task.task_uuid, "Created mining task");
                Ok(task)
            }
            // A concurrent request created it first
            Err(RepositoryError::DuplicateTask { .. }) => self.load_task(identity).await,
            Err(err) => Err(err.into()),
        }
    }

    /// Translate a driver result, logging failures
    fn driver_response(
        &self,
        task: &Task,
        miner: &Miner,
        driver: &dyn MiningDriver,
        operation: DriverOperation,
        response: crate::driver::DriverResult<TaskStateSnapshot>,
    ) -> MiningResult<TaskStateSnapshot> {
        response.map_err(|err| {
            let context = format!("task_id={} driver={}", task.task_id, driver.description());
            log_error(
                "task_mining_service",
                operation.as_str(),
                &err.to_string(),
                Some(&context),
            );
            err.into_mining_error(&miner.miner_type, task.task_id, operation)
        })
    }

    async fn apply_response(
        &self,
        task: &Task,
        miner: &Miner,
        response: &TaskStateSnapshot,
        operation: DriverOperation,
    ) -> MiningResult<Task> {
        let merged = self.merge_and_persist(task, response).await?;
        log_mining_operation(
            operation.as_str(),
            merged.task_id,
            miner.miner_type.as_str(),
            merged.state.as_str(),
            merged.import_state.as_str(),
            None,
        );
        self.schedule_if_waiting(&merged);
        Ok(merged)
    }

    async fn merge_and_persist(
        &self,
        task: &Task,
        response: &TaskStateSnapshot,
    ) -> MiningResult<Task> {
        let merged = merge_task_state(task, response);
        let saved = self.repositories.tasks.save_task(&merged).await?;

        self.events.publish_task_event(TaskEvent::StateChanged {
            task_id: saved.task_id,
            task_uuid: saved.task_uuid,
            state: saved.state,
            import_state: saved.import_state,
            rules_count: saved.rules_count,
        });
        Ok(saved)
    }

    fn schedule_if_waiting(&self, merged: &Task) -> bool {
        if !needs_import_continuation(merged) {
            return false;
        }
        self.dispatcher.dispatch(merged.task_id);
        self.events.publish_task_event(TaskEvent::ImportScheduled {
            task_id: merged.task_id,
        });
        debug!(
            task_id = merged.task_id,
            dispatcher = self.dispatcher.description(),
            "Import continuation dispatched"
        );
        true
    }
}

#[async_trait]
impl ImportContinuation for TaskMiningService {
    async fn continue_import(&self, task_id: i64) -> MiningResult<()> {
        match TaskMiningService::continue_import(self, task_id).await {
            Ok(outcome) => {
                debug!(task_id, outcome = ?outcome, "Import unit of work finished");
                Ok(())
            }
            Err(err) => {
                warn!(task_id, error = %err, "Import unit of work failed");
                Err(err)
            }
        }
    }
}

fn parse_settings(payload: &str) -> MiningResult<serde_json::Map<String, Value>> {
    match serde_json::from_str::<Value>(payload) {
        Ok(Value::Object(settings)) => Ok(settings),
        Ok(_) => Err(MiningError::InvalidSettings {
            reason: "task settings must be a JSON object".to_string(),
        }),
        Err(err) => Err(MiningError::InvalidSettings {
            reason: err.to_string(),
        }),
    }
}

fn ensure_solved(task: &Task) -> MiningResult<()> {
    if task.state.is_solved() {
        Ok(())
    } else {
        Err(MiningError::StateNotSolved {
            task_id: task.task_id,
            state: task.state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::task::test_task;

    #[test]
    fn test_settings_must_be_an_object() {
        assert!(parse_settings(r#"{"taskName": "x"}"#).is_ok());
        assert!(matches!(
            parse_settings("[1]"),
            Err(MiningError::InvalidSettings { .. })
        ));
        assert!(matches!(
            parse_settings("not json"),
            Err(MiningError::InvalidSettings { .. })
        ));
    }

    #[test]
    fn test_ensure_solved() {
        let mut task = test_task();
        assert_eq!(
            ensure_solved(&task),
            Err(MiningError::StateNotSolved {
                task_id: 1,
                state: TaskState::New
            })
        );
        task.state = TaskState::Solved;
        assert!(ensure_solved(&task).is_ok());
    }
}
