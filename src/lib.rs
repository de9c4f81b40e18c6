//! # pdfextend-jobs
//!
//! Configure a margin-extension job for a PDF document, hand it to a
//! background engine and collect a preview plus the extended document.
//!
//! The PDF work itself is done by an opaque [`Engine`]. This crate is the
//! protocol around it: a validated [`ParameterModel`], a deterministic
//! [`encode`] into the engine's command string, a [`Dispatcher`] that keeps
//! exactly one job in flight on a lazily started worker, a
//! [`ResponseHandler`] that turns replies into a [`Preview`] and a
//! [`Download`], and a [`PreferenceStore`] that remembers the user's settings
//! once they allow it.
//!
//! ## Flow
//!
//! ```text
//! ParameterModel ─ validate ─▶ encode ─▶ Dispatcher ──▶ worker task ──▶ Engine
//!        ▲                                                 (init once)     │
//!        │                                                                 ▼
//! PreferenceStore ◀── save on submit          ResponseHandler ◀── result + preview
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdfextend_jobs::{
//!     CommandEngine, CommandEngineConfig, Field, PreferenceStore, Session, SessionConfig,
//!     SourceFile,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = CommandEngine::factory(CommandEngineConfig::default());
//!     let mut session = Session::new(SessionConfig::default(), engine, PreferenceStore::in_memory());
//!
//!     session.model_mut().set(Field::LeftMargin, "20")?;
//!     session.model_mut().set(Field::Grid, "squares")?;
//!     session.model_mut().set_file(Some(SourceFile::from_path("notes.pdf").await?));
//!
//!     session.submit()?;
//!     let done = session.next_response().await?;
//!     done.download().save_to(".").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfextend-job` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdfextend-jobs = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod command;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod model;
pub mod preferences;
pub mod progress;
pub mod response;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use command::{encode, Command};
pub use config::{SessionConfig, SessionConfigBuilder};
pub use dispatch::{Delivery, Dispatcher, Job, JobId, JobState, Submission};
pub use engine::{
    Artifact, CommandEngine, CommandEngineConfig, Engine, EngineFactory, EngineRequest,
    EngineResponse, Raster,
};
pub use error::{EngineError, ExtendError, FieldError, ValidationError};
pub use model::{Field, Grid, ParameterModel, SourceFile, Unit, Validation};
pub use preferences::{FileStore, KeyValueStore, MemoryStore, PersistenceConfig, PreferenceStore};
pub use progress::{JobProgressCallback, NoopProgressCallback, ProgressCallback};
pub use response::{CompletedJob, Download, Preview, ResponseHandler};
pub use session::Session;
