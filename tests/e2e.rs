//! End-to-end tests for the process-backed engine.
//!
//! `command_engine_with_stub_programs` always runs on Unix: it points
//! [`CommandEngine`] at two small shell scripts standing in for `pdfextend`
//! and `pdftoppm`, so the full spawn / read / rasterise path is exercised
//! without external tools.
//!
//! The remaining tests use the real `pdfextend` and `pdftoppm` executables
//! and a PDF in `./test_cases/`. They are gated behind the `E2E_ENABLED`
//! environment variable.
//!
//! Run with:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture

use pdfextend_jobs::{
    CommandEngine, CommandEngineConfig, EngineError, ExtendError, Field, PreferenceStore, Session,
    SessionConfig, SourceFile,
};
use std::path::{Path, PathBuf};

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

fn output_dir() -> PathBuf {
    let d = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases/output");
    std::fs::create_dir_all(&d).ok();
    d
}

/// Skip this test if E2E_ENABLED is not set *or* no PDF file at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP — test file not found: {}", p.display());
            return;
        }
        p
    }};
}

fn session_for(config: CommandEngineConfig) -> Session {
    Session::new(
        SessionConfig::default(),
        CommandEngine::factory(config),
        PreferenceStore::in_memory(),
    )
}

#[cfg(unix)]
fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

// ── Stub programs (always run) ───────────────────────────────────────────────

#[cfg(unix)]
#[tokio::test]
async fn command_engine_with_stub_programs() {
    let dir = tempfile::tempdir_in(env!("CARGO_TARGET_TMPDIR")).unwrap();

    let png = dir.path().join("page1.png");
    image::RgbaImage::from_pixel(30, 20, image::Rgba([10, 20, 30, 255]))
        .save(&png)
        .unwrap();

    // Writes its flags, then the input bytes, to the output file.
    let engine = write_script(
        dir.path(),
        "fake-pdfextend",
        r#"if [ "$1" = "--version" ]; then echo "fake-pdfextend 0.0"; exit 0; fi
in="$1"; out="$2"; shift 2
printf '%s ' "$@" > "$out"
cat "$in" >> "$out""#,
    );
    let rasterizer = write_script(
        dir.path(),
        "fake-pdftoppm",
        &format!(
            r#"if [ "$1" = "-v" ]; then exit 0; fi
for last; do :; done
cp "{}" "$last.png""#,
            png.display()
        ),
    );
    let failing = write_script(
        dir.path(),
        "broken-pdfextend",
        r#"if [ "$1" = "--version" ]; then exit 0; fi
echo "cannot parse input" >&2
exit 3"#,
    );

    // Success path.
    let mut session = session_for(CommandEngineConfig {
        program: engine,
        rasterizer: rasterizer.clone(),
        ..Default::default()
    });
    session.model_mut().set(Field::LeftMargin, "10").unwrap();
    session.model_mut().set(Field::Mirror, "true").unwrap();
    session
        .model_mut()
        .set_file(Some(SourceFile::from_bytes("Thesis.PDF", b"%PDF-1.4 body".to_vec())));

    session.submit().unwrap();
    let done = session.next_response().await.expect("stub engine should succeed");

    let body = String::from_utf8_lossy(done.download().bytes()).into_owned();
    assert!(
        body.starts_with("--left=10 --spacing=5 --line-width=0.3 --unit=mm --mirror --color=#f0f0f0 "),
        "unexpected engine input: {body:?}"
    );
    assert!(body.ends_with("%PDF-1.4 body"));
    assert_eq!(done.download().file_name(), "Thesis_ext.pdf");
    assert_eq!((done.preview().width(), done.preview().height()), (30, 20));
    assert_eq!(&done.preview().raster().pixels()[..4], &[10, 20, 30, 255]);

    let saved = done.download().save_to(dir.path()).await.unwrap();
    assert_eq!(saved, dir.path().join("Thesis_ext.pdf"));
    session.shutdown();

    // Engine exits non-zero: error carries its stderr, session returns to idle.
    let mut session = session_for(CommandEngineConfig {
        program: failing,
        rasterizer,
        ..Default::default()
    });
    session
        .model_mut()
        .set_file(Some(SourceFile::from_bytes("a.pdf", b"%PDF".to_vec())));
    session.submit().unwrap();
    match session.next_response().await {
        Err(ExtendError::Engine {
            source: EngineError::Failed(msg),
            ..
        }) => assert!(msg.contains("cannot parse input"), "stderr missing: {msg}"),
        other => panic!("expected engine failure, got {:?}", other.map(|d| d.job())),
    }
    assert!(session.can_submit());
}

// ── Real engine (E2E_ENABLED) ────────────────────────────────────────────────

#[tokio::test]
async fn test_extend_sample_with_squares_grid() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("sample.pdf"));

    let mut session = session_for(CommandEngineConfig::default());
    session.model_mut().set(Field::LeftMargin, "20").unwrap();
    session.model_mut().set(Field::RightMargin, "20").unwrap();
    session.model_mut().set(Field::Grid, "squares").unwrap();
    session.model_mut().set(Field::ExtraPage, "true").unwrap();
    session
        .model_mut()
        .set_file(Some(SourceFile::from_path(&path).await.expect("readable PDF")));

    session.submit().expect("valid parameters");
    let done = session.next_response().await.expect("engine should succeed");

    assert!(done.download().bytes().starts_with(b"%PDF"));
    assert_eq!(done.download().file_name(), "sample_ext.pdf");
    assert!(done.preview().width() > 0 && done.preview().height() > 0);
    assert!(done.preview().width() as u64 * done.preview().height() as u64 <= 1_000_000);

    let out = done.download().save_to(output_dir()).await.unwrap();
    done.preview()
        .save_png(output_dir().join("sample_preview.png"))
        .await
        .unwrap();
    println!("[squares] Saved to {}", out.display());
}

#[tokio::test]
async fn test_real_engine_rejects_non_pdf_bytes() {
    let _ = e2e_skip_unless_ready!(test_cases_dir());

    let mut session = session_for(CommandEngineConfig::default());
    session
        .model_mut()
        .set_file(Some(SourceFile::from_bytes("fake.pdf", b"not a pdf".to_vec())));
    session.submit().unwrap();

    let err = session.next_response().await.unwrap_err();
    assert!(
        matches!(err, ExtendError::Engine { .. }),
        "expected engine error, got {err}"
    );
}

#[tokio::test]
async fn test_missing_engine_is_unavailable() {
    let mut session = session_for(CommandEngineConfig {
        program: PathBuf::from("/nonexistent/pdfextend"),
        ..Default::default()
    });
    session
        .model_mut()
        .set_file(Some(SourceFile::from_bytes("a.pdf", b"%PDF".to_vec())));
    session.submit().unwrap();

    let err = session.next_response().await.unwrap_err();
    assert!(matches!(
        err,
        ExtendError::Engine {
            source: EngineError::Unavailable(_),
            ..
        }
    ));
}
