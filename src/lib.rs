#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, GUHA, PMML in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Miner Core
//!
//! Task mining lifecycle and GUHA-PMML serialization for association rule mining.
//!
//! ## Overview
//!
//! A mining task is handed to an external engine (LISp-Miner, R, ...) which
//! owns the task's state. The core merges every engine response into the
//! persisted task, schedules background import rounds while the engine reports
//! pending results, and serializes solved tasks into cross-referenced GUHA-PMML
//! documents.
//!
//! ## Module Organization
//!
//! - [`state_machine`] - Task and import states, response merge, import guards
//! - [`driver`] - Mining engine boundary and per-engine registry
//! - [`dispatch`] - Fire-and-forget import continuation triggers
//! - [`pmml`] - GUHA-PMML document serializer
//! - [`services`] - Caller-facing operation surface
//! - [`repository`] - Persistence traits, in-memory and PostgreSQL backends
//! - [`models`] - Tasks, miners, preprocessing definitions, rules, rule graph
//! - [`config`] - Layered configuration
//! - [`events`] - Lifecycle event publishing
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use miner_core::config::MinerConfig;
//! use miner_core::driver::MiningDriverRegistry;
//! use miner_core::repository::{
//!     InMemoryColumnStatistics, InMemoryMinerRepository, InMemoryRuleRepository,
//!     InMemoryTaskRepository,
//! };
//! use miner_core::services::{MiningRepositories, TaskIdentity, TaskMiningService};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MinerConfig::load()?;
//! let repositories = MiningRepositories {
//!     tasks: Arc::new(InMemoryTaskRepository::new()),
//!     rules: Arc::new(InMemoryRuleRepository::new()),
//!     miners: Arc::new(InMemoryMinerRepository::new()),
//!     statistics: Arc::new(InMemoryColumnStatistics::new()),
//! };
//! let drivers = Arc::new(MiningDriverRegistry::new());
//!
//! let (service, _worker) = TaskMiningService::from_config(repositories, drivers, &config)?;
//! let identity = TaskIdentity::new(1, uuid::Uuid::new_v4());
//! let state = service
//!     .start_or_check_mining(identity, r#"{"taskName": "Heart risk"}"#)
//!     .await?;
//! println!("task is {}", state.state);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod pmml;
pub mod repository;
pub mod services;
pub mod state_machine;

pub use config::{ConfigManager, MinerConfig};
pub use driver::{MiningDriver, MiningDriverRegistry};
pub use error::{MinerError, MinerResult, MiningError, MiningResult};
pub use events::{EventPublisher, TaskEvent};
pub use models::{Miner, Rule, RuleGraph, Task, TaskRuleSet};
pub use pmml::{GuhaPmmlSerializer, SerializerError};
pub use services::{TaskIdentity, TaskMiningService};
pub use state_machine::{ImportState, TaskState, TaskStateSnapshot};
