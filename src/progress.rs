//! Progress-callback trait for job lifecycle events.
//!
//! Inject an [`Arc<dyn JobProgressCallback>`] via
//! [`crate::config::SessionConfigBuilder::progress_callback`] to observe jobs
//! as the dispatcher accepts, rejects and completes them.
//!
//! # Example
//!
//! ```rust
//! use pdfextend_jobs::{JobProgressCallback, SessionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl JobProgressCallback for CountingCallback {
//!     fn on_job_complete(&self, job: u64, elapsed_ms: u64) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("job {job} done in {elapsed_ms}ms");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//!
//! let config = SessionConfig::builder()
//!     .progress_callback(counter as Arc<dyn JobProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the dispatcher as jobs move through their lifecycle.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Callbacks run on the caller's side, never inside
/// the background worker.
pub trait JobProgressCallback: Send + Sync {
    /// A job was accepted and sent to the worker.
    ///
    /// # Arguments
    /// * `job`:     id assigned by the dispatcher
    /// * `command`: the space-joined command string
    fn on_job_submitted(&self, job: u64, command: &str) {
        let _ = (job, command);
    }

    /// A submission arrived while `in_flight` was still running and was ignored.
    fn on_submission_ignored(&self, in_flight: u64) {
        let _ = in_flight;
    }

    /// The engine replied successfully.
    fn on_job_complete(&self, job: u64, elapsed_ms: u64) {
        let _ = (job, elapsed_ms);
    }

    /// The job failed, timed out or lost its worker.
    fn on_job_error(&self, job: u64, error: &str) {
        let _ = (job, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl JobProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::SessionConfig`].
pub type ProgressCallback = Arc<dyn JobProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        submitted: AtomicUsize,
        ignored: AtomicUsize,
        completes: AtomicUsize,
        errors: Mutex<Vec<String>>,
    }

    impl JobProgressCallback for TrackingCallback {
        fn on_job_submitted(&self, _job: u64, _command: &str) {
            self.submitted.fetch_add(1, Ordering::SeqCst);
        }

        fn on_submission_ignored(&self, _in_flight: u64) {
            self.ignored.fetch_add(1, Ordering::SeqCst);
        }

        fn on_job_complete(&self, _job: u64, _elapsed_ms: u64) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_job_error(&self, _job: u64, error: &str) {
            self.errors.lock().unwrap().push(error.to_string());
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_job_submitted(1, "pdfextend in.pdf out.pdf");
        cb.on_submission_ignored(1);
        cb.on_job_complete(1, 42);
        cb.on_job_error(2, "timeout");
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_job_submitted(1, "cmd");
        tracker.on_submission_ignored(1);
        tracker.on_job_complete(1, 10);
        tracker.on_job_submitted(2, "cmd");
        tracker.on_job_error(2, "engine failed");

        assert_eq!(tracker.submitted.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.ignored.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(*tracker.errors.lock().unwrap(), vec!["engine failed"]);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_job_submitted(1, "cmd");
        cb.on_job_complete(1, 5);
    }
}
