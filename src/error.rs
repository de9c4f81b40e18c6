//! Error types for the pdfextend-jobs library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`ExtendError`] is **fatal** for the operation at hand: the job could not
//!   be submitted, the engine failed or timed out, or the preference store or
//!   the output file could not be written.
//!
//! * [`ValidationError`] is **field-level**: one form field holds a value the
//!   engine would reject. These are collected into a
//!   [`crate::model::Validation`] report so every offending field can show
//!   its own inline message. They block submission but never abort anything.
//!
//! * [`EngineError`] is raised inside the background worker and carried back
//!   over the job's reply channel. It is `Clone` because the memoised engine
//!   initialisation result is shared by every job that waits on it.

use crate::model::{Field, Validation};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdfextend-jobs library.
#[derive(Debug, Error)]
pub enum ExtendError {
    // ── Submission errors ─────────────────────────────────────────────────
    /// At least one field failed validation; no job was created.
    #[error("Invalid parameters: {0}")]
    InvalidParameters(Validation),

    /// A field was set to a value outside its enumeration.
    #[error("Unknown value '{value}' for field {field}")]
    UnknownValue { field: Field, value: String },

    /// `next_response` was called while no job was in flight.
    #[error("No job is in flight")]
    NoJobInFlight,

    // ── Engine errors ─────────────────────────────────────────────────────
    /// The engine reported a failure for job `job`.
    #[error("Job {job} failed: {source}")]
    Engine {
        job: u64,
        #[source]
        source: EngineError,
    },

    /// The engine did not answer within the configured timeout.
    #[error("Job {job} timed out after {elapsed_ms}ms\nIncrease --timeout for large documents.")]
    JobTimeout { job: u64, elapsed_ms: u64 },

    /// The background worker stopped before replying.
    #[error("Background worker exited before job {job} completed")]
    WorkerGone { job: u64 },

    // ── Storage errors ────────────────────────────────────────────────────
    /// The preference substrate could not be read or written.
    #[error("Preference store error for key '{key}': {detail}")]
    PreferenceStore { key: String, detail: String },

    /// Could not create or write the downloaded artifact or preview.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A validation failure for a single field of the parameter model.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum ValidationError {
    /// Not a decimal number (or empty where a value is required).
    #[error("invalid number")]
    InvalidNumber,

    /// The value is below the field's minimum.
    #[error("below minimum {min}")]
    BelowMinimum { min: f64 },

    /// The value exceeds the field's maximum.
    #[error("above maximum {max}")]
    AboveMaximum { max: f64 },

    /// Not a `#rgb`, `#rrggbb` or `#rrggbbaa` hex color.
    #[error("invalid color")]
    InvalidColor,

    /// No source document was chosen.
    #[error("no PDF file selected")]
    MissingFile,

    /// The chosen file name does not end in `.pdf`.
    #[error("'{name}' is not a PDF file")]
    NotAPdf { name: String },
}

/// A [`ValidationError`] tied to the field it was raised for.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
#[error("{field}: {error}")]
pub struct FieldError {
    pub field: Field,
    pub error: ValidationError,
}

/// Errors raised by an [`crate::engine::Engine`] inside the background worker.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Engine initialisation failed; every job sharing it fails the same way.
    #[error("engine unavailable: {0}")]
    Unavailable(String),

    /// The command string does not follow the expected grammar.
    #[error("invalid command '{command}': {reason}")]
    InvalidCommand { command: String, reason: String },

    /// The engine ran but reported failure.
    #[error("engine failed: {0}")]
    Failed(String),

    /// Reading or writing the engine's scratch files failed.
    #[error("engine I/O error: {0}")]
    Io(String),

    /// The preview raster could not be produced or decoded.
    #[error("preview failed: {0}")]
    Preview(String),
}
