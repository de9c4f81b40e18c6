//! CLI binary for pdfextend-jobs.
//!
//! A thin shim over the library crate: flags override the remembered
//! parameters, one job is submitted, and the result is saved next to the
//! source document (or wherever `--output` points).

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdfextend_jobs::{
    CommandEngine, CommandEngineConfig, Field, FileStore, JobProgressCallback, JobState,
    PreferenceStore, ProgressCallback, Session, SessionConfig, SourceFile,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner shown while the job is in flight.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        Arc::new(Self { bar })
    }

    fn show_state(&self, state: JobState) {
        match state {
            JobState::Dispatching => self.bar.set_prefix("Starting engine"),
            JobState::Waiting => self.bar.set_prefix("Extending"),
            JobState::Idle => {}
        }
    }
}

impl JobProgressCallback for CliProgressCallback {
    fn on_job_submitted(&self, job: u64, command: &str) {
        self.bar.enable_steady_tick(Duration::from_millis(80));
        self.bar.set_message(format!("job {job}: {}", dim(command)));
    }

    fn on_job_complete(&self, job: u64, elapsed_ms: u64) {
        self.bar
            .finish_with_message(format!("{} job {job} done in {elapsed_ms}ms", green("✔")));
    }

    fn on_job_error(&self, job: u64, error: &str) {
        self.bar
            .abandon_with_message(format!("{} job {job}: {error}", red("✗")));
    }
}

// ── CLI args ─────────────────────────────────────────────────────────────────

const AFTER_HELP: &str = r#"EXAMPLES:
  # Add 20 mm on the left, squared grid
  pdfextend-job notes.pdf --left 20 --grid squares

  # Mirror margins on even pages, write next to a preview
  pdfextend-job notes.pdf --left 15 --mirror -o out/ --preview out/preview.png

  # Show the command that would be sent to the engine
  pdfextend-job notes.pdf --left 10 --print-command

PREFERENCES:
  Parameters are remembered between runs once --allow-storage has been given.
  They are stored in ~/.config/pdfextend/ (override with PDFEXTEND_CONFIG_DIR).
  Flags given on the command line always win over remembered values.
"#;

/// Extend the margins of a PDF document and fill them with a grid.
#[derive(Parser, Debug)]
#[command(
    name = "pdfextend-job",
    version,
    about = "Extend PDF margins with a note-taking grid via the pdfextend engine",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Source PDF file.
    input: PathBuf,

    /// Output file or directory. Default: next to the input.
    #[arg(short, long, env = "PDFEXTEND_OUTPUT")]
    output: Option<PathBuf>,

    /// Also save the first-page preview as PNG.
    #[arg(long, env = "PDFEXTEND_PREVIEW")]
    preview: Option<PathBuf>,

    /// Extend left margin by this amount (empty string: leave unchanged).
    #[arg(long)]
    left: Option<String>,

    /// Extend right margin by this amount.
    #[arg(long)]
    right: Option<String>,

    /// Extend top margin by this amount.
    #[arg(long)]
    top: Option<String>,

    /// Extend bottom margin by this amount.
    #[arg(long)]
    bottom: Option<String>,

    /// Distance between grid lines.
    #[arg(long)]
    spacing: Option<String>,

    /// Stroke width of lines, or diameter of dots.
    #[arg(long)]
    line_width: Option<String>,

    /// Grid style: none, squares, lines, dots.
    #[arg(long)]
    grid: Option<String>,

    /// Unit of all lengths: mm, cm, in, pt.
    #[arg(long)]
    unit: Option<String>,

    /// Grid color as #rgb, #rrggbb or #rrggbbaa.
    #[arg(long)]
    color: Option<String>,

    /// Swap left and right margins on even pages.
    #[arg(long, require_equals = true, value_name = "BOOL")]
    mirror: Option<Option<bool>>,

    /// Append a page covered entirely by the grid.
    #[arg(long, require_equals = true, value_name = "BOOL")]
    extra_page: Option<Option<bool>>,

    /// Print the engine command and exit without running a job.
    #[arg(long)]
    print_command: bool,

    /// Remember parameters between runs (persists the opt-in).
    #[arg(long, env = "PDFEXTEND_ALLOW_STORAGE")]
    allow_storage: bool,

    /// Ignore remembered parameters and do not write any.
    #[arg(long, conflicts_with = "allow_storage")]
    no_preferences: bool,

    /// Engine executable.
    #[arg(long, env = "PDFEXTEND_ENGINE", default_value = "pdfextend")]
    engine: PathBuf,

    /// Rasteriser used for the preview.
    #[arg(long, env = "PDFEXTEND_RASTERIZER", default_value = "pdftoppm")]
    rasterizer: PathBuf,

    /// Job timeout in seconds.
    #[arg(long, env = "PDFEXTEND_TIMEOUT", default_value_t = 120)]
    timeout: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFEXTEND_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDFEXTEND_QUIET")]
    quiet: bool,
}

impl Cli {
    /// Command-line overrides in model terms.
    fn overrides(&self) -> Vec<(Field, String)> {
        let text = [
            (Field::LeftMargin, &self.left),
            (Field::RightMargin, &self.right),
            (Field::TopMargin, &self.top),
            (Field::BottomMargin, &self.bottom),
            (Field::Spacing, &self.spacing),
            (Field::LineWidth, &self.line_width),
            (Field::Grid, &self.grid),
            (Field::Unit, &self.unit),
            (Field::Color, &self.color),
        ];
        let flags = [(Field::Mirror, self.mirror), (Field::ExtraPage, self.extra_page)];

        text.into_iter()
            .filter_map(|(f, v)| v.clone().map(|v| (f, v)))
            .chain(
                flags
                    .into_iter()
                    .filter_map(|(f, v)| v.map(|v| (f, v.unwrap_or(true).to_string()))),
            )
            .collect()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner replaces INFO logs unless --verbose is given.
    let show_progress = !cli.quiet && !cli.print_command;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Preferences ──────────────────────────────────────────────────────
    let preferences = if cli.no_preferences {
        PreferenceStore::in_memory()
    } else {
        PreferenceStore::new(Box::new(FileStore::new(FileStore::default_dir())))
    };
    if cli.allow_storage {
        preferences
            .grant_consent()
            .context("Failed to record storage consent")?;
    }

    // ── Session ──────────────────────────────────────────────────────────
    let progress = show_progress.then(CliProgressCallback::new);
    let mut builder = SessionConfig::builder().job_timeout_secs(cli.timeout);
    if let Some(cb) = &progress {
        builder = builder.progress_callback(Arc::clone(cb) as ProgressCallback);
    }
    let config = builder.build()?;

    let engine = CommandEngine::factory(CommandEngineConfig {
        program: cli.engine.clone(),
        rasterizer: cli.rasterizer.clone(),
        preview_pixels: config.preview_pixels,
        ..Default::default()
    });
    let mut session = Session::new(config, engine, preferences);

    for (field, value) in cli.overrides() {
        session
            .model_mut()
            .set(field, &value)
            .with_context(|| format!("Invalid value for {}", field.label()))?;
    }
    let source = SourceFile::from_path(&cli.input)
        .await
        .with_context(|| format!("Failed to read {}", cli.input.display()))?;
    session.model_mut().set_file(Some(source));

    let validation = session.validation();
    if !validation.is_ok() {
        for e in validation.errors() {
            let label = session.model().label(e.field);
            eprintln!("{} {}: {}", red("✗"), bold(label), e.error);
        }
        bail!("Invalid parameters");
    }

    if cli.print_command {
        if let Some(command) = session.command() {
            println!("{command}");
        }
        return Ok(());
    }

    // ── Run job ──────────────────────────────────────────────────────────
    session.submit()?;
    let outcome = loop {
        if let Some(outcome) = session.poll_response().map(|r| r.map(|_| ())) {
            break outcome;
        }
        if let Some(cb) = &progress {
            cb.show_state(session.state());
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    };
    outcome.context("Job failed")?;

    let Some(done) = session.latest() else {
        bail!("Job finished without a result");
    };
    let written = save_download(done.download(), cli.output.as_deref(), &cli.input).await?;
    if let Some(ref preview) = cli.preview {
        done.preview()
            .save_png(preview)
            .await
            .context("Failed to save preview")?;
    }

    if !cli.quiet {
        eprintln!(
            "{}  {}  {}",
            green("✔"),
            bold(&written.display().to_string()),
            dim(&format!("{} bytes", done.download().bytes().len())),
        );
    }
    session.shutdown();
    Ok(())
}

/// Save to `output` (file or directory), defaulting to the input's directory.
async fn save_download(
    download: &pdfextend_jobs::Download,
    output: Option<&Path>,
    input: &Path,
) -> Result<PathBuf> {
    let target = match output {
        Some(path) if !path.is_dir() => {
            download.save_as(path).await?;
            return Ok(path.to_path_buf());
        }
        Some(dir) => dir.to_path_buf(),
        None => input
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    Ok(download.save_to(&target).await?)
}
