//! # Background Import Dispatch
//!
//! Fire-and-forget triggers for the import continuation. A dispatch never
//! blocks the caller, is never retried and never reports failure back; lost or
//! duplicate triggers are absorbed by the import guard.

pub mod http;
pub mod queue;

pub use http::HttpImportDispatcher;
pub use queue::{
    ImportContinuation, ImportJob, ImportWorker, ImportWorkerHandle, QueueImportDispatcher,
};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DispatchError {
    #[error("Failed to create HTTP client: {0}")]
    ClientBuild(String),

    #[error("Invalid import URL: {0}")]
    InvalidUrl(String),
}

impl From<DispatchError> for crate::error::MinerError {
    fn from(err: DispatchError) -> Self {
        crate::error::MinerError::DispatchError(err.to_string())
    }
}

/// Outbound trigger of one background import round
pub trait ImportDispatcher: Send + Sync + fmt::Debug {
    /// Schedule a continuation for the task without waiting for it
    fn dispatch(&self, task_id: i64);

    /// Get a description of this dispatcher for logging
    fn description(&self) -> &'static str;
}

/// Dispatch transport selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Self-referential HTTP GET against the continue-import endpoint
    #[default]
    Http,
    /// In-process job queue drained by an [`ImportWorker`]
    Queue,
}
