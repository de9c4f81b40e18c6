//! The engine seam: what the background worker drives.
//!
//! An [`Engine`] receives a command string plus the source document and
//! returns the extended document, a preview raster and optionally a name for
//! the download. How it does that is opaque to the rest of the crate; the
//! [`external::CommandEngine`] shipped here shells out to the `pdfextend`
//! executable and a rasteriser, tests plug in in-process fakes.
//!
//! ## Why boxed futures?
//!
//! The worker owns its engine as `Box<dyn Engine>`, so the trait must be
//! object safe. `initialize` returns a `'static` future because the worker
//! memoises it with [`futures::FutureExt::shared`] and every job awaits the
//! same shared result.

pub mod external;

use crate::dispatch::JobId;
use crate::error::EngineError;
use crate::model::SourceFile;
use futures::future::BoxFuture;
use image::{imageops::FilterType, DynamicImage, RgbaImage};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub use external::{CommandEngine, CommandEngineConfig};

/// MIME type of every result artifact.
pub const PDF_MIME: &str = "application/pdf";

/// Constructs the engine inside a freshly spawned worker.
pub type EngineFactory = Arc<dyn Fn() -> Box<dyn Engine> + Send + Sync>;

/// A document-extension engine.
pub trait Engine: Send + Sync {
    /// One-time setup (load libraries, probe executables).
    ///
    /// Called once per worker; the result is shared by every job.
    fn initialize(&self) -> BoxFuture<'static, Result<(), EngineError>>;

    /// Run one job.
    fn extend(&self, request: EngineRequest) -> BoxFuture<'_, Result<EngineResponse, EngineError>>;
}

/// The `extend` message sent to the worker.
#[derive(Debug, Clone)]
pub struct EngineRequest {
    pub job: JobId,
    /// Space-joined command-argument sequence.
    pub command: String,
    pub source_file: SourceFile,
}

/// The `extend` reply produced by the engine.
#[derive(Debug, Clone)]
pub struct EngineResponse {
    pub result_file: Artifact,
    pub preview: Raster,
    /// Engine-suggested download name; derived from the source name when absent.
    pub file_name: Option<String>,
}

/// The downloadable result document.
#[derive(Clone)]
pub struct Artifact {
    data: Arc<[u8]>,
}

impl Artifact {
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self { data: data.into() }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn mime_type(&self) -> &'static str {
        PDF_MIME
    }
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact").field("len", &self.data.len()).finish()
    }
}

/// A decoded RGBA8 bitmap, row-major, four bytes per pixel.
#[derive(Clone, PartialEq)]
pub struct Raster {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Raster {
    /// Wrap a pixel buffer, checking that its length matches the dimensions.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, EngineError> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(EngineError::Preview(format!(
                "{}x{} raster needs {} bytes, got {}",
                width,
                height,
                expected,
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Convert a decoded image, downscaling it to at most `pixel_budget` pixels.
    ///
    /// The aspect ratio is kept; images already within budget are not resized.
    pub fn from_image_within(image: DynamicImage, pixel_budget: u32) -> Self {
        let (w, h) = (image.width(), image.height());
        let area = w as f64 * h as f64;
        let rgba = if area > pixel_budget as f64 && area > 0.0 {
            let scale = (pixel_budget as f64 / area).sqrt();
            let nw = ((w as f64 * scale) as u32).max(1);
            let nh = ((h as f64 * scale) as u32).max(1);
            debug!("Scaling preview {}x{} → {}x{}", w, h, nw, nh);
            image::imageops::resize(&image.to_rgba8(), nw, nh, FilterType::Triangle)
        } else {
            image.to_rgba8()
        };
        Self::from(rgba)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn to_image(&self) -> RgbaImage {
        // Length was checked on construction.
        RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
            .unwrap_or_else(|| RgbaImage::new(self.width, self.height))
    }
}

impl From<RgbaImage> for Raster {
    fn from(img: RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            pixels: img.into_raw(),
        }
    }
}

impl fmt::Debug for Raster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Raster({}x{})", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn raster_rejects_wrong_length() {
        assert!(Raster::new(2, 2, vec![0; 15]).is_err());
        assert!(Raster::new(2, 2, vec![0; 16]).is_ok());
    }

    #[test]
    fn small_image_kept_as_is() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 20, Rgba([1, 2, 3, 255])));
        let r = Raster::from_image_within(img, 1_000_000);
        assert_eq!((r.width(), r.height()), (10, 20));
        assert_eq!(&r.pixels()[..4], &[1, 2, 3, 255]);
    }

    #[test]
    fn large_image_scaled_to_budget() {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(400, 100));
        let r = Raster::from_image_within(img, 10_000);
        assert_eq!((r.width(), r.height()), (200, 50));
        assert!(r.width() * r.height() <= 10_000);
    }

    #[test]
    fn raster_image_round_trip() {
        let img = RgbaImage::from_pixel(3, 2, Rgba([9, 8, 7, 6]));
        let r = Raster::from(img.clone());
        assert_eq!(r.to_image(), img);
    }
}
