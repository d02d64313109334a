//! Page and document transcripts.

use serde::{Deserialize, Serialize};

/// Separator between pages of a plain-text transcript.
pub const PAGE_SEPARATOR: &str = "\n\n";

/// Marker between page blocks of an overlay transcript.
pub const OVERLAY_PAGE_SEPARATOR: &str = "\n<!-- page-break -->\n";

/// Separator between documents of a bulk plain-text export.
pub const DOCUMENT_SEPARATOR: &str = "\n\n---\n\n";

/// Separator between documents of a bulk overlay export.
pub const OVERLAY_DOCUMENT_SEPARATOR: &str = "<hr>";

/// Output format of an export request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Plain Unicode text in reading order
    #[default]
    Text,
    /// Positioned HTML blocks, one per page
    Overlay,
}

impl ExportFormat {
    /// MIME type handed to the clipboard sink.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Text => "text/plain",
            ExportFormat::Overlay => "text/html",
        }
    }

    /// Short user-facing label.
    pub fn label(&self) -> &'static str {
        match self {
            ExportFormat::Text => "Text",
            ExportFormat::Overlay => "HTML",
        }
    }

    /// Separator placed between pages of one document.
    pub fn page_separator(&self) -> &'static str {
        match self {
            ExportFormat::Text => PAGE_SEPARATOR,
            ExportFormat::Overlay => OVERLAY_PAGE_SEPARATOR,
        }
    }

    /// Separator placed between documents of a bulk export.
    pub fn document_separator(&self) -> &'static str {
        match self {
            ExportFormat::Text => DOCUMENT_SEPARATOR,
            ExportFormat::Overlay => OVERLAY_DOCUMENT_SEPARATOR,
        }
    }
}

/// How a page's content was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageOrigin {
    /// Built from embedded text fragments
    EmbeddedText,
    /// Built from glyph recognition of the rasterized page
    Recognition,
    /// Recognition was attempted and failed; content is empty
    RecognitionFailed,
}

/// Transcript of a single page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageTranscript {
    /// 1-indexed page number
    pub page_index: u32,
    /// Rendered page content (text or overlay markup)
    pub content: String,
    /// Which branch produced the content
    pub origin: PageOrigin,
}

impl PageTranscript {
    /// Create a page transcript.
    pub fn new(page_index: u32, content: impl Into<String>, origin: PageOrigin) -> Self {
        Self {
            page_index,
            content: content.into(),
            origin,
        }
    }

    /// Lines of a plain-text page.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.content.lines()
    }

    /// Check whether the page produced any content.
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// Transcript of a whole document, pages in ascending order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentTranscript {
    /// Format the pages were rendered in
    pub format: ExportFormat,
    /// Page transcripts in page order
    pub pages: Vec<PageTranscript>,
}

impl DocumentTranscript {
    /// Create an empty transcript.
    pub fn new(format: ExportFormat) -> Self {
        Self {
            format,
            pages: Vec::new(),
        }
    }

    /// Append the next page.
    pub fn push(&mut self, page: PageTranscript) {
        debug_assert!(
            self.pages
                .last()
                .map_or(true, |last| last.page_index < page.page_index),
            "pages must be appended in ascending order"
        );
        self.pages.push(page);
    }

    /// Join the pages into the final output.
    ///
    /// Plain text skips empty pages so that blank scans do not leave runs of
    /// separators; overlay output keeps every page block so the page count
    /// of the markup matches the document.
    pub fn assemble(&self) -> String {
        let separator = self.format.page_separator();
        let joined = match self.format {
            ExportFormat::Text => self
                .pages
                .iter()
                .filter(|p| !p.is_empty())
                .map(|p| p.content.as_str())
                .collect::<Vec<_>>()
                .join(separator),
            ExportFormat::Overlay => self
                .pages
                .iter()
                .map(|p| p.content.as_str())
                .collect::<Vec<_>>()
                .join(separator),
        };
        joined.trim().to_string()
    }

    /// Number of pages whose content came from recognition.
    pub fn recognized_pages(&self) -> usize {
        self.pages
            .iter()
            .filter(|p| p.origin == PageOrigin::Recognition)
            .count()
    }
}
