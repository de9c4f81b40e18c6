//! One editing session: the parameter model, its dispatcher and the latest
//! result, wired together.
//!
//! ## Submission
//!
//! ```text
//! model ──validate──▶ encode ──▶ dispatch ──Accepted──▶ save preferences (if allowed)
//!   │                               │
//!   └─ invalid: InvalidParameters   ├─ Busy: nothing saved, nothing queued
//!      nothing dispatched           ▼
//!                  next_response / poll_response ──▶ ResponseHandler
//! ```

use crate::command::{self, Command};
use crate::config::SessionConfig;
use crate::dispatch::{Dispatcher, Job, JobState, Submission};
use crate::engine::EngineFactory;
use crate::error::ExtendError;
use crate::model::{ParameterModel, Validation};
use crate::preferences::PreferenceStore;
use crate::response::{CompletedJob, ResponseHandler};
use tracing::{debug, warn};

/// Owns everything one user session needs. Dropping it terminates the
/// background worker.
pub struct Session {
    config: SessionConfig,
    model: ParameterModel,
    preferences: PreferenceStore,
    dispatcher: Dispatcher,
    responses: ResponseHandler,
}

impl Session {
    /// Start a session whose model is seeded from `preferences`.
    ///
    /// No worker is spawned until the first submission.
    pub fn new(config: SessionConfig, factory: EngineFactory, preferences: PreferenceStore) -> Self {
        let model = preferences.load();
        let dispatcher = Dispatcher::new(factory, config.job_timeout)
            .with_progress(config.progress_callback.clone());
        let responses =
            ResponseHandler::new(config.output_suffix.clone()).with_preview_pixels(config.preview_pixels);
        Self {
            config,
            model,
            preferences,
            dispatcher,
            responses,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn model(&self) -> &ParameterModel {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut ParameterModel {
        &mut self.model
    }

    pub fn preferences(&self) -> &PreferenceStore {
        &self.preferences
    }

    pub fn validation(&self) -> Validation {
        self.model.validate()
    }

    /// `true` when the model is valid and no job is in flight.
    pub fn can_submit(&self) -> bool {
        !self.dispatcher.is_busy() && self.model.is_valid()
    }

    /// The command the current model encodes to, if it is valid.
    pub fn command(&self) -> Option<Command> {
        self.model.is_valid().then(|| command::encode(&self.model))
    }

    /// Validate, encode and dispatch the current model.
    ///
    /// Returns [`Submission::Busy`] without side effects while a job is in
    /// flight. Preferences are saved on every accepted submission when the
    /// user has opted in; a failing store is logged and does not block the
    /// job.
    pub fn submit(&mut self) -> Result<Submission, ExtendError> {
        let validation = self.model.validate();
        if !validation.is_ok() {
            debug!("Submission blocked: {}", validation);
            return Err(ExtendError::InvalidParameters(validation));
        }
        let Some(file) = self.model.file.clone() else {
            return Err(ExtendError::Internal("validated model has no file".into()));
        };

        let command = command::encode(&self.model).to_command_string();
        let submission = self.dispatcher.submit(Job::new(command, file));

        if matches!(submission, Submission::Accepted(_)) {
            if let Err(e) = self
                .preferences
                .save(&self.preferences.config(), &self.model)
            {
                warn!("Preferences not saved: {}", e);
            }
        }
        Ok(submission)
    }

    /// Await the in-flight job and publish its result.
    pub async fn next_response(&mut self) -> Result<&CompletedJob, ExtendError> {
        let delivery = self.dispatcher.next_response().await?;
        Ok(self
            .responses
            .handle(delivery.job, &delivery.source_name, delivery.response))
    }

    /// Non-blocking variant of [`Session::next_response`].
    pub fn poll_response(&mut self) -> Option<Result<&CompletedJob, ExtendError>> {
        match self.dispatcher.poll_response()? {
            Ok(delivery) => Some(Ok(self.responses.handle(
                delivery.job,
                &delivery.source_name,
                delivery.response,
            ))),
            Err(e) => Some(Err(e)),
        }
    }

    /// The most recent result, if any.
    pub fn latest(&self) -> Option<&CompletedJob> {
        self.responses.latest()
    }

    pub fn state(&self) -> JobState {
        self.dispatcher.state()
    }

    /// Terminate the background worker, abandoning any in-flight job.
    pub fn shutdown(&mut self) {
        self.dispatcher.shutdown();
    }
}
