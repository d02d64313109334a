//! Error types for pdfhub library.

use std::io;
use thiserror::Error;

use crate::session::DocumentId;

/// Result type alias for pdfhub operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while loading, transcribing or exporting documents.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The input is not recognized as PDF.
    #[error("Unknown file format: not a valid PDF")]
    UnknownFormat,

    /// Error parsing PDF structure.
    #[error("PDF parsing error: {0}")]
    PdfParse(String),

    /// A single fragment lacked its text or position and was dropped.
    #[error("Malformed text fragment: {0}")]
    MalformedContent(String),

    /// Recognition of one page's rasterized image failed.
    #[error("Recognition failed on page {page}: {reason}")]
    PageRecognitionFailed {
        /// 1-indexed page number
        page: u32,
        /// Reason reported by the collaborator
        reason: String,
    },

    /// Rasterizing a page for recognition failed.
    #[error("Rasterization error: {0}")]
    Rasterize(String),

    /// The document as a whole cannot be opened.
    #[error("Document could not be read: {0}")]
    DocumentUnreadable(String),

    /// An export for this document is already running.
    #[error("Export already in progress for document {0}")]
    AlreadyInProgress(DocumentId),

    /// The clipboard or other export target refused the content.
    #[error("Export target unavailable: {0}")]
    SinkUnavailable(String),

    /// The document is not (or no longer) part of the session.
    #[error("Unknown document {0}")]
    UnknownDocument(DocumentId),

    /// A reorder request was not a permutation of the open documents.
    #[error("Invalid reorder: {0}")]
    InvalidReorder(String),

    /// Error producing an output representation.
    #[error("Rendering error: {0}")]
    Render(String),

    /// Page number is out of range.
    #[error("Page {0} is out of range (document has {1} pages)")]
    PageOutOfRange(u32, u32),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error rejects a whole document's export.
    ///
    /// Bulk exports substitute a placeholder segment for these instead of
    /// aborting the other documents.
    pub fn is_document_level(&self) -> bool {
        matches!(
            self,
            Error::DocumentUnreadable(_)
                | Error::UnknownFormat
                | Error::PdfParse(_)
                | Error::Io(_)
        )
    }
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::IO(e) => Error::Io(e),
            _ => Error::PdfParse(err.to_string()),
        }
    }
}
