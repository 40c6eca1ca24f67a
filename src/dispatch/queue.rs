//! In-process job queue for import continuations.
//!
//! [`QueueImportDispatcher`] enqueues without waiting; a full queue drops the
//! trigger. [`ImportWorker`] drains the queue and runs each continuation as an
//! independent unit of work until its cancellation token fires.

use super::ImportDispatcher;
use crate::error::MiningResult;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportJob {
    pub task_id: i64,
}

#[derive(Debug, Clone)]
pub struct QueueImportDispatcher {
    sender: mpsc::Sender<ImportJob>,
}

impl QueueImportDispatcher {
    /// Bounded queue; the receiver is handed to an [`ImportWorker`]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ImportJob>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

impl ImportDispatcher for QueueImportDispatcher {
    fn dispatch(&self, task_id: i64) {
        match self.sender.try_send(ImportJob { task_id }) {
            Ok(()) => debug!(task_id, "Import continuation queued"),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(task_id, "Import queue full, trigger dropped")
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(task_id, "Import queue closed, trigger dropped")
            }
        }
    }

    fn description(&self) -> &'static str {
        "in-process import queue"
    }
}

/// Work executed for each queued import job
#[async_trait]
pub trait ImportContinuation: Send + Sync {
    async fn continue_import(&self, task_id: i64) -> MiningResult<()>;
}

pub struct ImportWorker {
    receiver: mpsc::Receiver<ImportJob>,
    continuation: Arc<dyn ImportContinuation>,
}

/// Running worker; dropping it leaves the worker running
#[derive(Debug)]
pub struct ImportWorkerHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl ImportWorkerHandle {
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop accepting jobs and wait for the receive loop to exit
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.join.await {
            warn!(error = %e, "Import worker terminated abnormally");
        }
    }
}

impl ImportWorker {
    pub fn new(
        receiver: mpsc::Receiver<ImportJob>,
        continuation: Arc<dyn ImportContinuation>,
    ) -> Self {
        Self {
            receiver,
            continuation,
        }
    }

    /// Spawn the receive loop on the current runtime
    pub fn start(self) -> ImportWorkerHandle {
        self.start_on(&Handle::current())
    }

    pub fn start_on(self, runtime: &Handle) -> ImportWorkerHandle {
        let cancel = CancellationToken::new();
        let join = runtime.spawn(self.run(cancel.clone()));
        ImportWorkerHandle { cancel, join }
    }

    async fn run(mut self, cancel: CancellationToken) {
        info!("Import worker started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Import worker stopped");
                    break;
                }
                job = self.receiver.recv() => {
                    let Some(ImportJob { task_id }) = job else {
                        info!("Import queue closed, worker exiting");
                        break;
                    };
                    let continuation = Arc::clone(&self.continuation);
                    tokio::spawn(async move {
                        if let Err(e) = continuation.continue_import(task_id).await {
                            warn!(task_id, error = %e, "Import continuation ended with error");
                        }
                    });
                }
            }
        }
    }
}
