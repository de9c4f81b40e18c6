//! Turning an engine reply into something to show and something to save.
//!
//! The [`ResponseHandler`] keeps only the latest [`CompletedJob`]; a new reply
//! supersedes the previous one. A completed job exposes a [`Preview`] of the
//! first page and a [`Download`] bound to the result bytes and a file name
//! derived from the source document.

use crate::dispatch::JobId;
use crate::engine::{Artifact, EngineResponse, Raster};
use crate::error::ExtendError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, RgbaImage};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Suffix replacing the source's `.pdf` extension in the download name.
pub const DEFAULT_OUTPUT_SUFFIX: &str = "_ext.pdf";

/// Derive the download name for `source`.
///
/// A trailing `.pdf` (any case) is replaced by `suffix`; otherwise `suffix`
/// is appended.
///
/// ```
/// use pdfextend_jobs::response::suggested_file_name;
/// assert_eq!(suggested_file_name("notes.PDF", "_ext.pdf"), "notes_ext.pdf");
/// assert_eq!(suggested_file_name("notes", "_ext.pdf"), "notes_ext.pdf");
/// ```
pub fn suggested_file_name(source: &str, suffix: &str) -> String {
    let stem = source
        .len()
        .checked_sub(4)
        .filter(|&at| source.is_char_boundary(at))
        .filter(|&at| source[at..].eq_ignore_ascii_case(".pdf"))
        .map_or(source, |at| &source[..at]);
    format!("{stem}{suffix}")
}

/// Receives engine replies and holds the most recent one.
#[derive(Debug)]
pub struct ResponseHandler {
    suffix: String,
    preview_pixels: u32,
    latest: Option<CompletedJob>,
}

impl Default for ResponseHandler {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_SUFFIX)
    }
}

impl ResponseHandler {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
            preview_pixels: 1_000_000,
            latest: None,
        }
    }

    /// Downscale larger previews to at most `px` pixels.
    pub fn with_preview_pixels(mut self, px: u32) -> Self {
        self.preview_pixels = px;
        self
    }

    /// Publish the reply to `job`, replacing any earlier one.
    ///
    /// The engine's own file name wins over the derived one when present.
    pub fn handle(
        &mut self,
        job: JobId,
        source_name: &str,
        response: EngineResponse,
    ) -> &CompletedJob {
        let file_name = response
            .file_name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| suggested_file_name(source_name, &self.suffix));
        info!(
            "Job {}: '{}' ready ({} bytes, preview {}x{})",
            job,
            file_name,
            response.result_file.len(),
            response.preview.width(),
            response.preview.height()
        );
        let raster = fit_within(response.preview, self.preview_pixels);
        self.latest.insert(CompletedJob {
            job,
            preview: Preview { raster },
            download: Download {
                file_name,
                artifact: response.result_file,
            },
        })
    }

    pub fn latest(&self) -> Option<&CompletedJob> {
        self.latest.as_ref()
    }

    pub fn clear(&mut self) {
        self.latest = None;
    }
}

fn fit_within(raster: Raster, budget: u32) -> Raster {
    let area = raster.width() as u64 * raster.height() as u64;
    if area <= budget as u64 {
        return raster;
    }
    Raster::from_image_within(DynamicImage::ImageRgba8(raster.to_image()), budget)
}

/// The published outcome of one job.
#[derive(Debug, Clone)]
pub struct CompletedJob {
    job: JobId,
    preview: Preview,
    download: Download,
}

impl CompletedJob {
    pub fn job(&self) -> JobId {
        self.job
    }

    pub fn preview(&self) -> &Preview {
        &self.preview
    }

    pub fn download(&self) -> &Download {
        &self.download
    }
}

/// First-page preview raster.
#[derive(Debug, Clone)]
pub struct Preview {
    raster: Raster,
}

impl Preview {
    pub fn raster(&self) -> &Raster {
        &self.raster
    }

    pub fn width(&self) -> u32 {
        self.raster.width()
    }

    pub fn height(&self) -> u32 {
        self.raster.height()
    }

    pub fn to_image(&self) -> RgbaImage {
        self.raster.to_image()
    }

    /// Encode as PNG.
    pub fn to_png(&self) -> Result<Vec<u8>, image::ImageError> {
        let mut buf = Vec::new();
        self.to_image()
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
        Ok(buf)
    }

    /// `data:image/png;base64,…` URI for embedding in HTML.
    pub fn to_data_uri(&self) -> Result<String, image::ImageError> {
        let b64 = STANDARD.encode(self.to_png()?);
        debug!("Encoded preview → {} bytes base64", b64.len());
        Ok(format!("data:image/png;base64,{b64}"))
    }

    /// Write the preview as a PNG file.
    pub async fn save_png(&self, path: impl AsRef<Path>) -> Result<(), ExtendError> {
        let path = path.as_ref();
        let png = self.to_png().map_err(|e| ExtendError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: std::io::Error::other(e),
        })?;
        write_atomic(path, &png).await
    }
}

/// The downloadable result bound to its suggested name.
#[derive(Debug, Clone)]
pub struct Download {
    file_name: String,
    artifact: Artifact,
}

impl Download {
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn bytes(&self) -> &[u8] {
        self.artifact.bytes()
    }

    pub fn mime_type(&self) -> &'static str {
        self.artifact.mime_type()
    }

    /// Save under the suggested name inside `dir`; returns the written path.
    pub async fn save_to(&self, dir: impl AsRef<Path>) -> Result<PathBuf, ExtendError> {
        let path = dir.as_ref().join(&self.file_name);
        self.save_as(&path).await?;
        Ok(path)
    }

    /// Save at an explicit path.
    pub async fn save_as(&self, path: impl AsRef<Path>) -> Result<(), ExtendError> {
        let path = path.as_ref();
        write_atomic(path, self.bytes()).await?;
        info!("Saved {} bytes to {}", self.artifact.len(), path.display());
        Ok(())
    }
}

/// Write via a uniquely named sibling temp file and rename, so readers never
/// see a partial file.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ExtendError> {
    let failed = |source| ExtendError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    tokio::fs::create_dir_all(&parent).await.map_err(failed)?;

    let target = path.to_path_buf();
    let bytes = bytes.to_vec();
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
        tmp.write_all(&bytes)?;
        tmp.persist(&target).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| failed(std::io::Error::other(e)))?
    .map_err(failed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(name: Option<&str>) -> EngineResponse {
        EngineResponse {
            result_file: Artifact::new(b"%PDF-1.7 result".to_vec()),
            preview: Raster::new(2, 1, vec![255, 0, 0, 255, 0, 0, 255, 255]).unwrap(),
            file_name: name.map(String::from),
        }
    }

    #[test]
    fn file_name_replaces_pdf_extension() {
        assert_eq!(suggested_file_name("report.pdf", "_ext.pdf"), "report_ext.pdf");
        assert_eq!(suggested_file_name("Report.PdF", "_ext.pdf"), "Report_ext.pdf");
    }

    #[test]
    fn file_name_appends_without_extension() {
        assert_eq!(suggested_file_name("scan", "_ext.pdf"), "scan_ext.pdf");
        assert_eq!(suggested_file_name("a.pdf.txt", "_ext.pdf"), "a.pdf.txt_ext.pdf");
        assert_eq!(suggested_file_name("", "_ext.pdf"), "_ext.pdf");
    }

    #[test]
    fn file_name_only_strips_one_extension() {
        assert_eq!(suggested_file_name("x.pdf.pdf", "_ext.pdf"), "x.pdf_ext.pdf");
    }

    #[test]
    fn file_name_handles_multibyte_names() {
        assert_eq!(suggested_file_name("résumé.pdf", "_ext.pdf"), "résumé_ext.pdf");
        assert_eq!(suggested_file_name("日本", "_ext.pdf"), "日本_ext.pdf");
    }

    #[test]
    fn handler_derives_name_from_source() {
        let mut h = ResponseHandler::default();
        let done = h.handle(1, "paper.pdf", response(None));
        assert_eq!(done.download().file_name(), "paper_ext.pdf");
        assert_eq!(done.download().bytes(), b"%PDF-1.7 result");
        assert_eq!(done.download().mime_type(), "application/pdf");
        assert_eq!((done.preview().width(), done.preview().height()), (2, 1));
    }

    #[test]
    fn engine_name_takes_precedence() {
        let mut h = ResponseHandler::default();
        let done = h.handle(1, "paper.pdf", response(Some("custom.pdf")));
        assert_eq!(done.download().file_name(), "custom.pdf");
    }

    #[test]
    fn newer_response_supersedes() {
        let mut h = ResponseHandler::new("_wide.pdf");
        h.handle(1, "a.pdf", response(None));
        h.handle(2, "b.pdf", response(None));
        let latest = h.latest().unwrap();
        assert_eq!(latest.job(), 2);
        assert_eq!(latest.download().file_name(), "b_wide.pdf");
        h.clear();
        assert!(h.latest().is_none());
    }

    #[test]
    fn oversized_preview_is_scaled() {
        let mut h = ResponseHandler::default().with_preview_pixels(1);
        let done = h.handle(1, "a.pdf", response(None));
        assert_eq!((done.preview().width(), done.preview().height()), (1, 1));
    }

    #[test]
    fn preview_data_uri_is_png() {
        let mut h = ResponseHandler::default();
        let done = h.handle(1, "a.pdf", response(None));
        let uri = done.preview().to_data_uri().unwrap();
        let b64 = uri.strip_prefix("data:image/png;base64,").unwrap();
        let png = STANDARD.decode(b64).unwrap();
        assert_eq!(&png[..4], b"\x89PNG");
    }

    #[tokio::test]
    async fn download_saves_into_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = ResponseHandler::default();
        let done = h.handle(1, "in.pdf", response(None));

        let path = done.download().save_to(dir.path()).await.unwrap();
        assert_eq!(path, dir.path().join("in_ext.pdf"));
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.7 result");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn saving_keeps_unrelated_tmp_file() {
        let dir = tempfile::tempdir().unwrap();
        let theirs = dir.path().join("report.tmp");
        std::fs::write(&theirs, "user data").unwrap();
        let mut h = ResponseHandler::default();
        let done = h.handle(1, "in.pdf", response(None));

        let target = dir.path().join("report.pdf");
        done.download().save_as(&target).await.unwrap();
        done.preview().save_png(dir.path().join("report.png")).await.unwrap();

        assert_eq!(std::fs::read_to_string(&theirs).unwrap(), "user data");
        assert_eq!(std::fs::read(&target).unwrap(), b"%PDF-1.7 result");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 3);
    }

    #[tokio::test]
    async fn save_as_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.pdf");
        std::fs::write(&target, "old").unwrap();
        let mut h = ResponseHandler::default();
        let done = h.handle(1, "in.pdf", response(None));

        done.download().save_as(&target).await.unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"%PDF-1.7 result");
    }

    #[tokio::test]
    async fn preview_saves_png() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = ResponseHandler::default();
        let done = h.handle(1, "in.pdf", response(None));

        let path = dir.path().join("nested/preview.png");
        done.preview().save_png(&path).await.unwrap();
        let img = image::open(&path).unwrap();
        assert_eq!((img.width(), img.height()), (2, 1));
    }
}
