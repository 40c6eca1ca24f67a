use crate::constants::events;
use crate::state_machine::{ImportState, TaskState};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::trace;
use uuid::Uuid;

/// Broadcast publisher for task lifecycle events
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<PublishedEvent>,
}

/// Event that has been published
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedEvent {
    pub name: String,
    pub context: Value,
    pub published_at: chrono::DateTime<chrono::Utc>,
}

/// Task lifecycle notifications
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    /// A driver response was merged and persisted
    StateChanged {
        task_id: i64,
        task_uuid: Uuid,
        state: TaskState,
        import_state: ImportState,
        rules_count: i64,
    },
    /// A background import round was dispatched
    ImportScheduled { task_id: i64 },
    /// A background import round finished
    ImportRoundCompleted {
        task_id: i64,
        import_state: ImportState,
        rules_count: i64,
    },
    Renamed { task_id: i64, name: String },
}

impl TaskEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::StateChanged { .. } => events::TASK_STATE_CHANGED,
            Self::ImportScheduled { .. } => events::TASK_IMPORT_SCHEDULED,
            Self::ImportRoundCompleted { .. } => events::TASK_IMPORT_ROUND_COMPLETED,
            Self::Renamed { .. } => events::TASK_RENAMED,
        }
    }

    pub fn context(&self) -> Value {
        match self {
            Self::StateChanged {
                task_id,
                task_uuid,
                state,
                import_state,
                rules_count,
            } => serde_json::json!({
                "task_id": task_id,
                "task_uuid": task_uuid,
                "state": state,
                "import_state": import_state,
                "rules_count": rules_count,
            }),
            Self::ImportScheduled { task_id } => serde_json::json!({ "task_id": task_id }),
            Self::ImportRoundCompleted {
                task_id,
                import_state,
                rules_count,
            } => serde_json::json!({
                "task_id": task_id,
                "import_state": import_state,
                "rules_count": rules_count,
            }),
            Self::Renamed { task_id, name } => {
                serde_json::json!({ "task_id": task_id, "name": name })
            }
        }
    }
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a named event; having no subscribers is not an error
    pub fn publish(&self, event_name: impl Into<String>, context: Value) {
        let event = PublishedEvent {
            name: event_name.into(),
            context,
            published_at: chrono::Utc::now(),
        };

        if self.sender.send(event).is_err() {
            trace!("Lifecycle event published without subscribers");
        }
    }

    pub fn publish_task_event(&self, event: TaskEvent) {
        self.publish(event.name(), event.context());
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(1000)
    }
}
