//! Job dispatch: one background worker, at most one job in flight.
//!
//! ## Lifecycle
//!
//! ```text
//!            submit                 engine ready            reply / error / timeout
//!   Idle ───────────▶ Dispatching ───────────────▶ Waiting ─────────────────────────▶ Idle
//! ```
//!
//! * The worker is spawned on the first accepted submission and kept for the
//!   rest of the session. It is replaced only after it died or was torn down
//!   because a job timed out.
//! * The in-flight slot holds the oneshot receiver of the single pending job.
//!   While it is occupied, [`Dispatcher::submit`] is a no-op returning
//!   [`Submission::Busy`]; there is no queue.
//! * A reply is consumed with [`Dispatcher::next_response`] (awaits) or
//!   [`Dispatcher::poll_response`] (never blocks). Both clear the slot.
//! * [`Dispatcher::shutdown`] terminates the worker; a pending job is
//!   abandoned without any completion signal.

mod worker;

use crate::engine::{EngineFactory, EngineRequest, EngineResponse};
use crate::error::ExtendError;
use crate::model::SourceFile;
use crate::progress::ProgressCallback;
use std::time::{Duration, Instant};
use tokio::sync::oneshot::{self, error::TryRecvError};
use tracing::{debug, info, warn};
use worker::{Reply, WorkerHandle, WorkerRequest};

/// Identifier assigned to each accepted job, starting at 1.
pub type JobId = u64;

/// One request for the engine.
#[derive(Debug, Clone)]
pub struct Job {
    /// Space-joined command-argument sequence.
    pub command: String,
    pub source_file: SourceFile,
}

impl Job {
    pub fn new(command: impl Into<String>, source_file: SourceFile) -> Self {
        Self {
            command: command.into(),
            source_file,
        }
    }
}

/// Outcome of [`Dispatcher::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// The job was sent to the worker.
    Accepted(JobId),
    /// Another job is still in flight; nothing happened.
    Busy,
}

/// Where the dispatcher stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// No job in flight.
    Idle,
    /// A job is in flight and the engine is still initialising.
    Dispatching,
    /// A job is in flight on an initialised engine.
    Waiting,
}

/// A successful reply, tagged with the job it answers.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub job: JobId,
    /// Name of the source document the job was submitted with.
    pub source_name: String,
    pub response: EngineResponse,
    pub elapsed: Duration,
}

struct InFlight {
    job: JobId,
    source_name: String,
    started: Instant,
    reply: oneshot::Receiver<Reply>,
}

/// Owns the background worker and the single in-flight slot.
pub struct Dispatcher {
    factory: EngineFactory,
    worker: Option<WorkerHandle>,
    in_flight: Option<InFlight>,
    next_job: JobId,
    job_timeout: Duration,
    progress: Option<ProgressCallback>,
}

impl Dispatcher {
    /// Create a dispatcher. No worker is started until the first submission.
    pub fn new(factory: EngineFactory, job_timeout: Duration) -> Self {
        Self {
            factory,
            worker: None,
            in_flight: None,
            next_job: 1,
            job_timeout,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    pub fn state(&self) -> JobState {
        match (&self.in_flight, &self.worker) {
            (None, _) => JobState::Idle,
            (Some(_), Some(w)) if w.is_ready() => JobState::Waiting,
            (Some(_), _) => JobState::Dispatching,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Id of the job currently in flight.
    pub fn in_flight(&self) -> Option<JobId> {
        self.in_flight.as_ref().map(|p| p.job)
    }

    /// `true` once a worker has been spawned and is still running.
    pub fn has_worker(&self) -> bool {
        self.worker.as_ref().is_some_and(WorkerHandle::is_alive)
    }

    /// Send `job` to the worker, spawning it first if needed.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(&mut self, job: Job) -> Submission {
        if let Some(pending) = &self.in_flight {
            debug!("Job {} still in flight; ignoring submission", pending.job);
            if let Some(cb) = &self.progress {
                cb.on_submission_ignored(pending.job);
            }
            return Submission::Busy;
        }

        if !self.has_worker() {
            self.worker = Some(WorkerHandle::spawn(&self.factory));
        }

        let id = self.next_job;
        self.next_job += 1;

        info!("Submitting job {}: {}", id, job.command);
        if let Some(cb) = &self.progress {
            cb.on_job_submitted(id, &job.command);
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        let source_name = job.source_file.name().to_string();
        let request = WorkerRequest::Extend {
            request: EngineRequest {
                job: id,
                command: job.command,
                source_file: job.source_file,
            },
            reply: reply_tx,
        };
        let sent = self
            .worker
            .as_ref()
            .is_some_and(|w| w.send(request));
        if !sent {
            // The reply sender went down with the request; the next poll
            // reports WorkerGone.
            warn!("Job {}: worker rejected the request", id);
        }

        self.in_flight = Some(InFlight {
            job: id,
            source_name,
            started: Instant::now(),
            reply: reply_rx,
        });
        Submission::Accepted(id)
    }

    /// Await the reply of the in-flight job.
    ///
    /// Cancel safe: dropping the future leaves the job in flight.
    pub async fn next_response(&mut self) -> Result<Delivery, ExtendError> {
        let timeout = self.job_timeout;
        let pending = self.in_flight.as_mut().ok_or(ExtendError::NoJobInFlight)?;
        let remaining = timeout.saturating_sub(pending.started.elapsed());

        let outcome = tokio::time::timeout(remaining, &mut pending.reply).await;
        let pending = self
            .in_flight
            .take()
            .ok_or_else(|| ExtendError::Internal("in-flight slot vanished".into()))?;

        match outcome {
            Err(_elapsed) => Err(self.time_out(pending)),
            Ok(Err(_closed)) => Err(self.worker_gone(pending)),
            Ok(Ok(reply)) => self.finish(pending, reply),
        }
    }

    /// Check for a reply without blocking.
    ///
    /// Returns `None` while the job is still running (or nothing is in
    /// flight). A job past its timeout is failed here as well.
    pub fn poll_response(&mut self) -> Option<Result<Delivery, ExtendError>> {
        let pending = self.in_flight.as_mut()?;
        let received = pending.reply.try_recv();
        let expired = pending.started.elapsed() >= self.job_timeout;

        match received {
            Err(TryRecvError::Empty) if !expired => None,
            Err(TryRecvError::Empty) => {
                let pending = self.in_flight.take()?;
                Some(Err(self.time_out(pending)))
            }
            Err(TryRecvError::Closed) => {
                let pending = self.in_flight.take()?;
                Some(Err(self.worker_gone(pending)))
            }
            Ok(reply) => {
                let pending = self.in_flight.take()?;
                Some(self.finish(pending, reply))
            }
        }
    }

    /// Terminate the worker. Any in-flight job is abandoned silently.
    pub fn shutdown(&mut self) {
        if let Some(pending) = self.in_flight.take() {
            info!("Abandoning job {} at shutdown", pending.job);
        }
        if self.worker.take().is_some() {
            info!("Background worker shut down");
        }
    }

    fn finish(&mut self, pending: InFlight, reply: Reply) -> Result<Delivery, ExtendError> {
        let elapsed = pending.started.elapsed();
        match reply {
            Ok(response) => {
                info!("Job {} completed in {}ms", pending.job, elapsed.as_millis());
                if let Some(cb) = &self.progress {
                    cb.on_job_complete(pending.job, elapsed.as_millis() as u64);
                }
                Ok(Delivery {
                    job: pending.job,
                    source_name: pending.source_name,
                    response,
                    elapsed,
                })
            }
            Err(source) => {
                let err = ExtendError::Engine {
                    job: pending.job,
                    source,
                };
                self.report(pending.job, &err);
                Err(err)
            }
        }
    }

    /// The engine is presumed hung; tear the worker down so the next
    /// submission starts from a fresh one.
    fn time_out(&mut self, pending: InFlight) -> ExtendError {
        let elapsed_ms = pending.started.elapsed().as_millis() as u64;
        warn!(
            "Job {} timed out after {}ms; terminating worker",
            pending.job, elapsed_ms
        );
        self.worker = None;
        let err = ExtendError::JobTimeout {
            job: pending.job,
            elapsed_ms,
        };
        self.report(pending.job, &err);
        err
    }

    fn worker_gone(&mut self, pending: InFlight) -> ExtendError {
        warn!("Job {}: worker exited without replying", pending.job);
        self.worker = None;
        let err = ExtendError::WorkerGone { job: pending.job };
        self.report(pending.job, &err);
        err
    }

    fn report(&self, job: JobId, err: &ExtendError) {
        if let Some(cb) = &self.progress {
            cb.on_job_error(job, &err.to_string());
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}
