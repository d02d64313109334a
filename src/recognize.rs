//! Page rasterization and glyph recognition collaborators.
//!
//! Both are only used when a page carries no embedded text. The crate ships
//! no engine of its own; hosts plug one in through [`Rasterizer`] and
//! [`Recognizer`].

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::PageGeometry;

/// A rasterized page image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Pixel data, row-major RGBA
    pub data: Vec<u8>,
}

impl PixelBuffer {
    /// Create a buffer from raw RGBA data.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
        }
    }

    /// Check whether the buffer holds no pixels.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A page of an opened document, as handed to a [`Rasterizer`].
#[derive(Debug, Clone, Copy)]
pub struct PageRef<'a> {
    /// Raw bytes of the whole document
    pub bytes: &'a [u8],
    /// 1-indexed page number
    pub page_index: u32,
    /// Intrinsic page dimensions
    pub geometry: PageGeometry,
}

impl PageRef<'_> {
    /// Pixel dimensions of this page at the given scale.
    pub fn scaled_size(&self, scale: f64) -> (u32, u32) {
        let w = (self.geometry.width * scale).round().max(0.0);
        let h = (self.geometry.height * scale).round().max(0.0);
        (w as u32, h as u32)
    }
}

/// Incremental recognition progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionProgress {
    /// Fraction complete, 0.0 to 1.0
    pub fraction: f32,
    /// Engine stage name (e.g. "recognizing text")
    pub stage: String,
}

impl RecognitionProgress {
    /// Create a progress notification.
    pub fn new(fraction: f32, stage: impl Into<String>) -> Self {
        Self {
            fraction: fraction.clamp(0.0, 1.0),
            stage: stage.into(),
        }
    }

    /// Progress as a whole percentage.
    pub fn percent(&self) -> u8 {
        (self.fraction * 100.0).round() as u8
    }
}

/// Renders a page to pixels.
pub trait Rasterizer: Send + Sync {
    /// Rasterize one page at `scale` pixels per page unit.
    fn rasterize(&self, page: &PageRef<'_>, scale: f64) -> Result<PixelBuffer>;
}

/// Recognizes text in a page image.
pub trait Recognizer: Send + Sync {
    /// Recognize the text of `image`, reporting progress as it goes.
    fn recognize(
        &self,
        image: &PixelBuffer,
        language: &str,
        progress: &mut dyn FnMut(RecognitionProgress),
    ) -> Result<String>;
}

/// Rasterizer used when no rendering engine is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableRasterizer;

impl Rasterizer for UnavailableRasterizer {
    fn rasterize(&self, page: &PageRef<'_>, _scale: f64) -> Result<PixelBuffer> {
        Err(Error::Rasterize(format!(
            "no rasterizer configured for page {}",
            page.page_index
        )))
    }
}

/// Recognizer used when no recognition engine is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableRecognizer;

impl Recognizer for UnavailableRecognizer {
    fn recognize(
        &self,
        _image: &PixelBuffer,
        _language: &str,
        _progress: &mut dyn FnMut(RecognitionProgress),
    ) -> Result<String> {
        Err(Error::Other("no recognition engine configured".to_string()))
    }
}
