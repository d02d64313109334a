//! Positioned text fragments.
//!
//! Content providers report text runs in their own coordinate conventions.
//! Everything downstream (reading order, overlay export) works in a single
//! page space: origin at the bottom-left corner of the page's view box,
//! X growing rightwards, Y growing upwards, in page units (points).

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::error::{Error, Result};

/// Direction of the Y axis as reported by a content provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum YAxis {
    /// Y grows upwards from the bottom edge (PDF user space)
    #[default]
    BottomUp,
    /// Y grows downwards from the top edge (raster/screen space)
    TopDown,
}

/// Intrinsic dimensions of one page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    /// Left edge of the view box in provider units
    pub origin_x: f64,
    /// Bottom (or top, for [`YAxis::TopDown`]) edge of the view box
    pub origin_y: f64,
    /// Page width in points
    pub width: f64,
    /// Page height in points
    pub height: f64,
    /// Y convention of the raw coordinates
    pub y_axis: YAxis,
}

impl PageGeometry {
    /// Create a bottom-up page anchored at (0, 0).
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            origin_x: 0.0,
            origin_y: 0.0,
            width,
            height,
            y_axis: YAxis::BottomUp,
        }
    }

    /// Standard Letter size (8.5 x 11 inches).
    pub fn letter() -> Self {
        Self::new(612.0, 792.0)
    }

    /// Set the view box origin (e.g. a MediaBox not starting at zero).
    pub fn with_origin(mut self, x: f64, y: f64) -> Self {
        self.origin_x = x;
        self.origin_y = y;
        self
    }

    /// Set the Y axis convention of raw coordinates.
    pub fn with_y_axis(mut self, y_axis: YAxis) -> Self {
        self.y_axis = y_axis;
        self
    }

    /// Map a raw provider point into page space.
    pub fn to_page_space(&self, x: f64, y: f64) -> (f64, f64) {
        let px = x - self.origin_x;
        let py = match self.y_axis {
            YAxis::BottomUp => y - self.origin_y,
            YAxis::TopDown => self.height - (y - self.origin_y),
        };
        (px, py)
    }
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self::letter()
    }
}

/// One text run exactly as a content provider reported it.
///
/// Every field is optional because providers are not trusted to fill them;
/// [`Fragment::from_raw`] decides what is usable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFragment {
    /// Decoded text of the run
    pub text: Option<String>,
    /// Text-space to page-space transform `[a, b, c, d, e, f]`
    pub transform: Option<[f64; 6]>,
    /// Glyph height in page units, if the provider knows it
    pub height: Option<f64>,
    /// Font resource or base font name
    pub font_name: Option<String>,
}

impl RawFragment {
    /// Create a raw fragment positioned at (x, y) with an identity scale of `size`.
    pub fn new(text: impl Into<String>, x: f64, y: f64, size: f64) -> Self {
        Self {
            text: Some(text.into()),
            transform: Some([size, 0.0, 0.0, size, x, y]),
            height: Some(size),
            font_name: None,
        }
    }

    /// Set the font name.
    pub fn with_font(mut self, font_name: impl Into<String>) -> Self {
        self.font_name = Some(font_name.into());
        self
    }

    /// Vertical scale of the transform, used when no explicit height is given.
    fn transform_height(&self) -> Option<f64> {
        self.transform.map(|t| t[2].hypot(t[3]))
    }
}

/// A normalized glyph run in page space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    /// Text content, including its own inter-glyph spacing
    pub text: String,
    /// Left edge in page space
    pub x: f64,
    /// Baseline in page space (bottom-up)
    pub y: f64,
    /// Glyph height in page units
    pub height: f64,
    /// Font name as reported by the provider
    pub font_name: String,
    /// 1-indexed page the fragment belongs to
    pub page_index: u32,
}

impl Fragment {
    /// Create a fragment directly in page space.
    pub fn new(text: impl Into<String>, x: f64, y: f64, height: f64) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            height,
            font_name: String::new(),
            page_index: 1,
        }
    }

    /// Set the font name.
    pub fn with_font(mut self, font_name: impl Into<String>) -> Self {
        self.font_name = font_name.into();
        self
    }

    /// Set the page index.
    pub fn on_page(mut self, page_index: u32) -> Self {
        self.page_index = page_index;
        self
    }

    /// Normalize a provider fragment into page space.
    ///
    /// Fails with [`Error::MalformedContent`] when the text or the position
    /// is missing, or the position is not a finite number.
    pub fn from_raw(raw: &RawFragment, geometry: &PageGeometry, page_index: u32) -> Result<Self> {
        let text = raw
            .text
            .as_deref()
            .ok_or_else(|| Error::MalformedContent(format!("page {}: missing text", page_index)))?;
        let transform = raw.transform.ok_or_else(|| {
            Error::MalformedContent(format!("page {}: missing position", page_index))
        })?;

        let (x, y) = geometry.to_page_space(transform[4], transform[5]);
        if !x.is_finite() || !y.is_finite() {
            return Err(Error::MalformedContent(format!(
                "page {}: non-finite position for {:?}",
                page_index, text
            )));
        }

        let height = raw
            .height
            .filter(|h| h.is_finite() && *h > 0.0)
            .or_else(|| raw.transform_height())
            .filter(|h| h.is_finite())
            .unwrap_or(0.0);

        Ok(Self {
            text: text.to_string(),
            x,
            y,
            height,
            font_name: raw.font_name.clone().unwrap_or_default(),
            page_index,
        })
    }
}

/// Fragments of one page after normalization.
#[derive(Debug, Clone, Default)]
pub struct NormalizedPage {
    /// Usable fragments, in provider order
    pub fragments: Vec<Fragment>,
    /// Number of fragments dropped as malformed
    pub dropped: usize,
}

/// Normalize every raw fragment of a page, skipping malformed ones.
///
/// A malformed fragment never aborts the page.
pub fn normalize_page(raw: &[RawFragment], geometry: &PageGeometry, page_index: u32) -> NormalizedPage {
    let mut page = NormalizedPage {
        fragments: Vec::with_capacity(raw.len()),
        dropped: 0,
    };

    for item in raw {
        match Fragment::from_raw(item, geometry, page_index) {
            Ok(fragment) => page.fragments.push(fragment),
            Err(e) => {
                log::warn!("Skipping fragment: {}", e);
                page.dropped += 1;
            }
        }
    }

    page
}

impl NormalizedPage {
    /// Recompose every fragment's text into Unicode NFC form.
    pub fn compose_text(&mut self) {
        for fragment in &mut self.fragments {
            fragment.text = fragment.text.nfc().collect();
        }
    }
}
