//! Document model types shared by the transcription pipeline.
//!
//! Fragments are the provider-independent input of a page; transcripts are
//! the per-page and per-document output of an export request.

mod fragment;
mod transcript;

pub use fragment::{normalize_page, Fragment, NormalizedPage, PageGeometry, RawFragment, YAxis};
pub use transcript::{
    DocumentTranscript, ExportFormat, PageOrigin, PageTranscript, DOCUMENT_SEPARATOR,
    OVERLAY_DOCUMENT_SEPARATOR, OVERLAY_PAGE_SEPARATOR, PAGE_SEPARATOR,
};
