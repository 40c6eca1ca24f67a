//! # Services
//!
//! [`TaskMiningService`] is the operation surface exposed to transports.

pub mod task_mining_service;
pub mod views;

pub use task_mining_service::{ImportRoundOutcome, MiningRepositories, TaskMiningService};
pub use views::{
    RuleListTaskView, RuleListView, RuleView, TaskIdentity, TaskStateView, TaskView,
};
