//! Session configuration.
//!
//! Everything that tunes a [`crate::Session`] lives in [`SessionConfig`],
//! built via [`SessionConfigBuilder`]. The engine itself is configured
//! separately (see [`crate::engine::CommandEngineConfig`]) because tests and
//! embedders swap it out entirely.

use crate::error::ExtendError;
use crate::progress::ProgressCallback;
use crate::response::DEFAULT_OUTPUT_SUFFIX;
use std::fmt;
use std::time::Duration;

/// Smallest accepted preview budget; below this the preview is unreadable.
const MIN_PREVIEW_PIXELS: u32 = 10_000;
const MIN_JOB_TIMEOUT: Duration = Duration::from_millis(1);

/// Configuration for a [`crate::Session`].
///
/// # Example
/// ```rust
/// use pdfextend_jobs::SessionConfig;
///
/// let config = SessionConfig::builder()
///     .job_timeout_secs(30)
///     .output_suffix("_wide.pdf")
///     .build()
///     .unwrap();
/// assert_eq!(config.job_timeout.as_secs(), 30);
/// ```
#[derive(Clone)]
pub struct SessionConfig {
    /// How long a job may stay in flight before it is failed and the worker
    /// torn down. Includes engine initialisation on the first job.
    /// Default: 120 s.
    pub job_timeout: Duration,

    /// Pixel budget of preview rasters. Default: 1 000 000.
    pub preview_pixels: u32,

    /// Replaces a trailing `.pdf` in the download name. Default: `_ext.pdf`.
    pub output_suffix: String,

    /// Observer for job lifecycle events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            job_timeout: Duration::from_secs(120),
            preview_pixels: 1_000_000,
            output_suffix: DEFAULT_OUTPUT_SUFFIX.to_string(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("job_timeout", &self.job_timeout)
            .field("preview_pixels", &self.preview_pixels)
            .field("output_suffix", &self.output_suffix)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn JobProgressCallback>"),
            )
            .finish()
    }
}

impl SessionConfig {
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`SessionConfig`].
#[derive(Debug)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    pub fn job_timeout(mut self, timeout: Duration) -> Self {
        self.config.job_timeout = timeout;
        self
    }

    pub fn job_timeout_secs(self, secs: u64) -> Self {
        self.job_timeout(Duration::from_secs(secs))
    }

    pub fn preview_pixels(mut self, px: u32) -> Self {
        self.config.preview_pixels = px;
        self
    }

    pub fn output_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.config.output_suffix = suffix.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<SessionConfig, ExtendError> {
        let c = &self.config;
        if c.job_timeout < MIN_JOB_TIMEOUT {
            return Err(ExtendError::InvalidConfig(format!(
                "Job timeout must be at least 1ms, got {:?}",
                c.job_timeout
            )));
        }
        if c.preview_pixels < MIN_PREVIEW_PIXELS {
            return Err(ExtendError::InvalidConfig(format!(
                "Preview budget must be ≥ {MIN_PREVIEW_PIXELS} pixels, got {}",
                c.preview_pixels
            )));
        }
        if !c.output_suffix.to_ascii_lowercase().ends_with(".pdf") {
            return Err(ExtendError::InvalidConfig(format!(
                "Output suffix must end in .pdf, got '{}'",
                c.output_suffix
            )));
        }
        Ok(self.config)
    }
}
