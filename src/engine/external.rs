//! An engine that runs the `pdfextend` executable and a rasteriser.
//!
//! ## Flow per job
//!
//! ```text
//! command string ──▶ parse & check fixed tokens
//!   source bytes ──▶ tempdir/in.pdf
//!                    pdfextend <tmp>/in.pdf <tmp>/out.pdf --flags…
//!                    pdftoppm -png -singlefile -f 1 -l 1 out.pdf <tmp>/preview
//!                    preview.png ──▶ decode ──▶ scale to pixel budget
//! ```
//!
//! Children are spawned with `kill_on_drop`, so aborting the worker task at
//! session teardown also stops a running engine process.

use super::{Artifact, Engine, EngineFactory, EngineRequest, EngineResponse, Raster};
use crate::command::{INPUT_PLACEHOLDER, OUTPUT_PLACEHOLDER, PROGRAM_TOKEN};
use crate::error::EngineError;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info};

/// Configuration for [`CommandEngine`].
#[derive(Debug, Clone)]
pub struct CommandEngineConfig {
    /// The margin-extension executable. Default: `pdfextend` on `PATH`.
    pub program: PathBuf,
    /// Poppler-compatible rasteriser used for the preview. Default: `pdftoppm`.
    pub rasterizer: PathBuf,
    /// Resolution of the first-page render before scaling. Default: 100.
    pub preview_dpi: u32,
    /// Pixel budget of the preview raster. Default: 1 000 000 (1 Mpx).
    pub preview_pixels: u32,
}

impl Default for CommandEngineConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from(PROGRAM_TOKEN),
            rasterizer: PathBuf::from("pdftoppm"),
            preview_dpi: 100,
            preview_pixels: 1_000_000,
        }
    }
}

/// Runs the external executables; see the module docs.
#[derive(Debug, Clone)]
pub struct CommandEngine {
    config: Arc<CommandEngineConfig>,
}

impl CommandEngine {
    pub fn new(config: CommandEngineConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// A factory for [`crate::dispatch::Dispatcher`] building engines from `config`.
    pub fn factory(config: CommandEngineConfig) -> EngineFactory {
        let config = Arc::new(config);
        Arc::new(move || {
            Box::new(CommandEngine {
                config: Arc::clone(&config),
            }) as Box<dyn Engine>
        })
    }

    async fn run(&self, request: EngineRequest) -> Result<EngineResponse, EngineError> {
        let flags = parse_command(&request.command)?;

        let dir = tempfile::tempdir().map_err(|e| EngineError::Io(format!("tempdir: {e}")))?;
        let input = dir.path().join(INPUT_PLACEHOLDER);
        let output = dir.path().join(OUTPUT_PLACEHOLDER);

        tokio::fs::write(&input, request.source_file.data().as_ref())
            .await
            .map_err(|e| EngineError::Io(format!("write {}: {e}", input.display())))?;

        info!(
            "Job {}: running {} on '{}' ({} bytes)",
            request.job,
            self.config.program.display(),
            request.source_file.name(),
            request.source_file.len()
        );
        let out = Command::new(&self.config.program)
            .arg(&input)
            .arg(&output)
            .args(&flags)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| EngineError::Failed(format!("{}: {e}", self.config.program.display())))?;
        check_status(&self.config.program, &out)?;

        let result = tokio::fs::read(&output)
            .await
            .map_err(|e| EngineError::Io(format!("read {}: {e}", output.display())))?;

        let preview = self.render_preview(&output, dir.path()).await?;
        debug!(
            "Job {}: result {} bytes, preview {}x{}",
            request.job,
            result.len(),
            preview.width(),
            preview.height()
        );

        Ok(EngineResponse {
            result_file: Artifact::new(result),
            preview,
            file_name: None,
        })
    }

    /// Render page 1 of `pdf` and scale it to the preview budget.
    async fn render_preview(&self, pdf: &Path, scratch: &Path) -> Result<Raster, EngineError> {
        let prefix = scratch.join("preview");
        let out = Command::new(&self.config.rasterizer)
            .args(["-png", "-singlefile", "-f", "1", "-l", "1", "-r"])
            .arg(self.config.preview_dpi.to_string())
            .arg(pdf)
            .arg(&prefix)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                EngineError::Preview(format!("{}: {e}", self.config.rasterizer.display()))
            })?;
        check_status(&self.config.rasterizer, &out)
            .map_err(|e| EngineError::Preview(e.to_string()))?;

        let png_path = prefix.with_extension("png");
        let png = tokio::fs::read(&png_path)
            .await
            .map_err(|e| EngineError::Preview(format!("read {}: {e}", png_path.display())))?;
        let image = image::load_from_memory_with_format(&png, image::ImageFormat::Png)
            .map_err(|e| EngineError::Preview(format!("decode: {e}")))?;

        Ok(Raster::from_image_within(image, self.config.preview_pixels))
    }
}

impl Engine for CommandEngine {
    fn initialize(&self) -> BoxFuture<'static, Result<(), EngineError>> {
        let config = Arc::clone(&self.config);
        async move {
            let out = Command::new(&config.program)
                .arg("--version")
                .kill_on_drop(true)
                .output()
                .await
                .map_err(|e| {
                    EngineError::Unavailable(format!("{}: {e}", config.program.display()))
                })?;
            check_status(&config.program, &out)
                .map_err(|e| EngineError::Unavailable(e.to_string()))?;

            // pdftoppm's exit code for -v differs across poppler releases;
            // being able to spawn it is enough.
            Command::new(&config.rasterizer)
                .arg("-v")
                .kill_on_drop(true)
                .output()
                .await
                .map_err(|e| {
                    EngineError::Unavailable(format!("{}: {e}", config.rasterizer.display()))
                })?;

            info!(
                "Engine ready: {}",
                String::from_utf8_lossy(&out.stdout).trim()
            );
            Ok(())
        }
        .boxed()
    }

    fn extend(&self, request: EngineRequest) -> BoxFuture<'_, Result<EngineResponse, EngineError>> {
        self.run(request).boxed()
    }
}

/// Split a command string and return the flag tokens after the three fixed ones.
pub fn parse_command(command: &str) -> Result<Vec<String>, EngineError> {
    let invalid = |reason: &str| EngineError::InvalidCommand {
        command: command.to_string(),
        reason: reason.to_string(),
    };

    let tokens: Vec<&str> = command.split(' ').collect();
    if tokens.len() < 3 {
        return Err(invalid("expected <program> <input> <output>"));
    }
    if tokens[0] != PROGRAM_TOKEN {
        return Err(invalid("unexpected program token"));
    }
    if tokens[1] != INPUT_PLACEHOLDER || tokens[2] != OUTPUT_PLACEHOLDER {
        return Err(invalid("unexpected input/output placeholders"));
    }

    let flags = &tokens[3..];
    if let Some(bad) = flags.iter().find(|t| !t.starts_with("--")) {
        return Err(invalid(&format!("'{bad}' is not a flag")));
    }
    Ok(flags.iter().map(|t| t.to_string()).collect())
}

fn check_status(program: &Path, out: &Output) -> Result<(), EngineError> {
    if out.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&out.stderr);
    Err(EngineError::Failed(format!(
        "{} exited with {}: {}",
        program.display(),
        out.status,
        stderr.trim()
    )))
}
