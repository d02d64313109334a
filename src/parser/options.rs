//! Transcription options and configuration.

/// Default vertical tolerance for treating two fragments as one line.
pub const DEFAULT_LINE_TOLERANCE: f64 = 2.0;

/// Default multiplier applied to a fragment's height for the line-break rule.
pub const DEFAULT_LINE_BREAK_FACTOR: f64 = 1.0;

/// Default rasterization scale for the recognition fallback.
pub const DEFAULT_OCR_SCALE: f64 = 2.0;

/// Default recognition language hint.
pub const DEFAULT_OCR_LANGUAGE: &str = "eng";

/// Options for transcribing documents.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscribeOptions {
    /// Vertical tolerance (page units) under which fragments are ordered left to right
    pub line_tolerance: f64,

    /// A line break is emitted when the vertical gap exceeds `height * line_break_factor`
    pub line_break_factor: f64,

    /// Scale passed to the rasterizer for pages without embedded text
    pub ocr_scale: f64,

    /// Language hint passed to the recognition engine
    pub ocr_language: String,

    /// Whether bulk exports run documents concurrently
    pub parallel: bool,

    /// Recompose fragment text into Unicode NFC; provider text is kept verbatim when off
    pub compose_unicode: bool,
}

impl TranscribeOptions {
    /// Create new options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the same-line vertical tolerance.
    pub fn with_line_tolerance(mut self, tolerance: f64) -> Self {
        self.line_tolerance = tolerance.max(0.0);
        self
    }

    /// Set the line-break factor.
    pub fn with_line_break_factor(mut self, factor: f64) -> Self {
        self.line_break_factor = factor.max(0.0);
        self
    }

    /// Set the rasterization scale for recognition.
    pub fn with_ocr_scale(mut self, scale: f64) -> Self {
        self.ocr_scale = scale;
        self
    }

    /// Set the recognition language hint.
    pub fn with_ocr_language(mut self, language: impl Into<String>) -> Self {
        self.ocr_language = language.into();
        self
    }

    /// Enable or disable concurrent bulk export.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Recompose fragment text into Unicode NFC before reconstruction.
    pub fn with_compose_unicode(mut self, compose: bool) -> Self {
        self.compose_unicode = compose;
        self
    }

    /// Run bulk exports one document after another.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }
}

impl Default for TranscribeOptions {
    fn default() -> Self {
        Self {
            line_tolerance: DEFAULT_LINE_TOLERANCE,
            line_break_factor: DEFAULT_LINE_BREAK_FACTOR,
            ocr_scale: DEFAULT_OCR_SCALE,
            ocr_language: DEFAULT_OCR_LANGUAGE.to_string(),
            parallel: true,
            compose_unicode: false,
        }
    }
}
