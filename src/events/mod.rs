//! Task lifecycle event publishing.

pub mod publisher;

pub use publisher::{EventPublisher, PublishedEvent, TaskEvent};
