//! The background execution context that owns the engine.
//!
//! The worker is a spawned Tokio task reachable only through channels:
//! requests arrive on an unbounded mpsc queue, each reply leaves on the
//! job's own oneshot sender, and a `watch` flag reports whether engine
//! initialisation has completed. Nothing else is shared.
//!
//! Initialisation is created once per worker as a [`Shared`] future and
//! awaited before every job. The first job drives it; later jobs observe the
//! memoised result, so a failed initialisation fails each job with the same
//! [`EngineError`] instead of being retried.

use crate::engine::{EngineFactory, EngineRequest, EngineResponse};
use crate::error::EngineError;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub(crate) type Reply = Result<EngineResponse, EngineError>;

/// Messages accepted by the worker.
pub(crate) enum WorkerRequest {
    Extend {
        request: EngineRequest,
        reply: oneshot::Sender<Reply>,
    },
}

/// Owning handle to a running worker. Dropping it terminates the worker.
pub(crate) struct WorkerHandle {
    requests: mpsc::UnboundedSender<WorkerRequest>,
    ready: watch::Receiver<bool>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    /// Spawn a worker on the current Tokio runtime.
    pub(crate) fn spawn(factory: &EngineFactory) -> Self {
        let (requests, inbox) = mpsc::unbounded_channel();
        let (ready_tx, ready) = watch::channel(false);
        let task = tokio::spawn(run(factory.clone(), inbox, ready_tx));
        info!("Background worker started");
        Self {
            requests,
            ready,
            task,
        }
    }

    /// Queue a request. On failure the request (and its reply sender) is
    /// dropped, which the waiting side observes as a closed reply channel.
    pub(crate) fn send(&self, request: WorkerRequest) -> bool {
        self.requests.send(request).is_ok()
    }

    pub(crate) fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    pub(crate) fn is_alive(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if !self.task.is_finished() {
            debug!("Terminating background worker");
            self.task.abort();
        }
    }
}

async fn run(
    factory: EngineFactory,
    mut inbox: mpsc::UnboundedReceiver<WorkerRequest>,
    ready: watch::Sender<bool>,
) {
    let engine = factory();
    let init: Shared<BoxFuture<'static, Result<(), EngineError>>> = engine.initialize().shared();

    while let Some(message) = inbox.recv().await {
        match message {
            WorkerRequest::Extend { request, reply } => {
                let job = request.job;
                let result = match init.clone().await {
                    Ok(()) => {
                        ready.send_replace(true);
                        engine.extend(request).await
                    }
                    Err(e) => Err(e),
                };
                if let Err(e) = &result {
                    warn!("Job {}: engine error: {}", job, e);
                }
                if reply.send(result).is_err() {
                    debug!("Job {}: reply receiver dropped", job);
                }
            }
        }
    }
    debug!("Background worker inbox closed");
}
