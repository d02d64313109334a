//! # pdfhub
//!
//! Multi-document PDF session with reading-order transcription.
//!
//! Open any number of PDF documents, reorder or close them freely, and turn
//! each one (or all of them at once) into plain text or positioned HTML.
//! Pages that carry no embedded text are rasterized and handed to a
//! pluggable recognition engine.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pdfhub::{ExportFormat, Origin, PdfHub};
//!
//! fn main() -> pdfhub::Result<()> {
//!     let hub = PdfHub::new();
//!     let report = hub.open_file("report.pdf")?;
//!     let appendix = hub.open_bytes("appendix.pdf", std::fs::read("appendix.pdf")?, Origin::User);
//!
//!     // One document as text
//!     println!("{}", hub.export_document(report.handle.id, ExportFormat::Text)?);
//!
//!     // Everything, in tab order
//!     hub.session().move_to(appendix.handle.id, 0)?;
//!     println!("{}", hub.export_all(ExportFormat::Text)?.join());
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Reading order**: fragments sorted top to bottom, left to right with a
//!   configurable same-line tolerance
//! - **Overlay export**: one positioned HTML block per page
//! - **Recognition fallback**: pages without text go through [`Rasterizer`]
//!   and [`Recognizer`]
//! - **Sessions**: stable document ids, reorder-safe exports, at most one
//!   export in flight per document
//! - **Parallel bulk export**: uses Rayon across documents

pub mod detect;
pub mod error;
pub mod model;
pub mod parser;
pub mod recognize;
pub mod render;
pub mod session;
pub mod transcribe;

// Re-export commonly used types
pub use detect::{detect_format_from_bytes, is_pdf_bytes, PdfFormat};
pub use error::{Error, Result};
pub use model::{
    DocumentTranscript, ExportFormat, Fragment, PageGeometry, PageOrigin, PageTranscript,
    RawFragment, YAxis,
};
pub use parser::{ContentProvider, DocumentContent, LopdfProvider, ReadingOrder, TranscribeOptions};
pub use recognize::{PageRef, PixelBuffer, Rasterizer, RecognitionProgress, Recognizer};
pub use render::{JsonFormat, OverlayExporter};
pub use session::{
    Added, BulkTranscript, ClipboardSink, CopyOutcome, DocumentHandle, DocumentId,
    DocumentSource, ExportCoordinator, Origin, PreparedCopy, PreviewHost, Segment, Session,
};
pub use transcribe::{ProgressEvent, ProgressHub, Transcriber, Transcription, TranscriptionState};

use std::path::Path;
use std::sync::Arc;

use crossbeam_channel::Receiver;

/// Transcribe PDF bytes with the bundled content provider.
///
/// Pages without embedded text come out empty, since no recognition engine
/// is configured.
///
/// # Example
///
/// ```no_run
/// use pdfhub::{transcribe_bytes, ExportFormat};
///
/// let data = std::fs::read("document.pdf").unwrap();
/// let text = transcribe_bytes(&data, ExportFormat::Text).unwrap();
/// ```
pub fn transcribe_bytes(data: &[u8], format: ExportFormat) -> Result<String> {
    let source = DocumentSource::new(DocumentId::from_raw(0), "document", data);
    Transcriber::default().transcribe(&source, format)
}

/// Extract reading-order text from a PDF file.
///
/// # Example
///
/// ```no_run
/// use pdfhub::extract_text;
///
/// let text = extract_text("document.pdf").unwrap();
/// println!("{}", text);
/// ```
pub fn extract_text<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    let source = DocumentSource::new(DocumentId::from_raw(0), display_name(path), data);
    Transcriber::default().transcribe(&source, ExportFormat::Text)
}

/// Convert a PDF file to a standalone overlay HTML page.
pub fn to_html<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    let name = display_name(path);
    let source = DocumentSource::new(DocumentId::from_raw(0), name.clone(), data);
    let body = Transcriber::default().transcribe(&source, ExportFormat::Overlay)?;
    Ok(render::document_markup(&name, &body))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Builder for a [`PdfHub`].
///
/// # Example
///
/// ```no_run
/// use pdfhub::{PdfHub, TranscribeOptions};
///
/// let hub = PdfHub::builder()
///     .with_options(TranscribeOptions::new().with_line_tolerance(3.0).sequential())
///     .build();
/// ```
pub struct PdfHubBuilder {
    provider: Arc<dyn ContentProvider>,
    rasterizer: Option<Arc<dyn Rasterizer>>,
    recognizer: Option<Arc<dyn Recognizer>>,
    preview_host: Option<Arc<dyn PreviewHost>>,
    options: TranscribeOptions,
    overlay: OverlayExporter,
}

impl PdfHubBuilder {
    /// Start from the bundled content provider and no recognition engine.
    pub fn new() -> Self {
        Self {
            provider: Arc::new(LopdfProvider::new()),
            rasterizer: None,
            recognizer: None,
            preview_host: None,
            options: TranscribeOptions::default(),
            overlay: OverlayExporter::default(),
        }
    }

    /// Use a different content provider.
    pub fn with_provider(mut self, provider: Arc<dyn ContentProvider>) -> Self {
        self.provider = provider;
        self
    }

    /// Set the page rasterizer for the recognition fallback.
    pub fn with_rasterizer(mut self, rasterizer: Arc<dyn Rasterizer>) -> Self {
        self.rasterizer = Some(rasterizer);
        self
    }

    /// Set the recognition engine for the recognition fallback.
    pub fn with_recognizer(mut self, recognizer: Arc<dyn Recognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    /// Set the host that creates document previews.
    pub fn with_preview_host(mut self, host: Arc<dyn PreviewHost>) -> Self {
        self.preview_host = Some(host);
        self
    }

    /// Set transcription options.
    pub fn with_options(mut self, options: TranscribeOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the overlay exporter.
    pub fn with_overlay(mut self, overlay: OverlayExporter) -> Self {
        self.overlay = overlay;
        self
    }

    /// Disable parallel bulk export.
    pub fn sequential(mut self) -> Self {
        self.options = self.options.sequential();
        self
    }

    /// Build the hub.
    pub fn build(self) -> PdfHub {
        let mut transcriber = Transcriber::new(self.provider)
            .with_options(self.options)
            .with_overlay(self.overlay);
        if let Some(rasterizer) = self.rasterizer {
            transcriber = transcriber.with_rasterizer(rasterizer);
        }
        if let Some(recognizer) = self.recognizer {
            transcriber = transcriber.with_recognizer(recognizer);
        }

        let mut session = Session::new();
        if let Some(host) = self.preview_host {
            session = session.with_preview_host(host);
        }

        let session = Arc::new(session);
        let coordinator = ExportCoordinator::new(Arc::clone(&session), Arc::new(transcriber));
        PdfHub {
            session,
            coordinator,
        }
    }
}

impl Default for PdfHubBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A session of open documents together with its export coordinator.
#[derive(Debug)]
pub struct PdfHub {
    session: Arc<Session>,
    coordinator: ExportCoordinator,
}

impl PdfHub {
    /// Create a hub with default settings.
    pub fn new() -> Self {
        PdfHubBuilder::new().build()
    }

    /// Start configuring a hub.
    pub fn builder() -> PdfHubBuilder {
        PdfHubBuilder::new()
    }

    /// The open documents.
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// The export coordinator.
    pub fn coordinator(&self) -> &ExportCoordinator {
        &self.coordinator
    }

    /// The progress hub every export publishes to.
    pub fn progress(&self) -> &Arc<ProgressHub> {
        self.coordinator.progress()
    }

    /// Subscribe to progress events.
    pub fn subscribe(&self) -> Receiver<ProgressEvent> {
        self.progress().subscribe()
    }

    /// Open a PDF file picked by the user.
    ///
    /// Files that are not PDF are rejected with [`Error::UnknownFormat`].
    pub fn open_file<P: AsRef<Path>>(&self, path: P) -> Result<Added> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        if !is_pdf_bytes(&data) {
            return Err(Error::UnknownFormat);
        }
        Ok(self.open_bytes(display_name(path), data, Origin::User))
    }

    /// Open a document from bytes.
    pub fn open_bytes(&self, name: impl Into<String>, data: impl Into<Arc<[u8]>>, origin: Origin) -> Added {
        self.session.add(name, data, origin)
    }

    /// Close a document.
    pub fn close(&self, id: DocumentId) -> Result<DocumentHandle> {
        self.session.remove(id)
    }

    /// Export one document.
    pub fn export_document(&self, id: DocumentId, format: ExportFormat) -> Result<String> {
        self.coordinator.export(id, format)
    }

    /// Export every open document in tab order.
    pub fn export_all(&self, format: ExportFormat) -> Result<BulkTranscript> {
        self.coordinator.export_all(format)
    }

    /// Prepare one document in both formats for copying.
    pub fn prepare_document(&self, id: DocumentId) -> Result<PreparedCopy> {
        self.coordinator.prepare(id)
    }

    /// Prepare every open document in both formats for copying.
    pub fn prepare_all(&self) -> Result<PreparedCopy> {
        self.coordinator.prepare_all()
    }

    /// Copy prepared content in the chosen format.
    pub fn copy(&self, prepared: &PreparedCopy, format: ExportFormat, sink: &dyn ClipboardSink) -> Result<CopyOutcome> {
        self.coordinator.copy(prepared, format, sink)
    }

    /// Prepare one document and copy it in `format`.
    pub fn copy_document(&self, id: DocumentId, format: ExportFormat, sink: &dyn ClipboardSink) -> Result<CopyOutcome> {
        let prepared = self.prepare_document(id)?;
        self.copy(&prepared, format, sink)
    }

    /// Prepare every open document and copy them in `format`.
    pub fn copy_all(&self, format: ExportFormat, sink: &dyn ClipboardSink) -> Result<CopyOutcome> {
        let prepared = self.prepare_all()?;
        self.copy(&prepared, format, sink)
    }
}

impl Default for PdfHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "async")]
impl PdfHub {
    /// Export one document on the blocking thread pool.
    pub async fn export_document_async(self: &Arc<Self>, id: DocumentId, format: ExportFormat) -> Result<String> {
        let hub = Arc::clone(self);
        tokio::task::spawn_blocking(move || hub.export_document(id, format))
            .await
            .map_err(|e| Error::Other(format!("export task failed: {}", e)))?
    }

    /// Export every open document on the blocking thread pool.
    pub async fn export_all_async(self: &Arc<Self>, format: ExportFormat) -> Result<BulkTranscript> {
        let hub = Arc::clone(self);
        tokio::task::spawn_blocking(move || hub.export_all(format))
            .await
            .map_err(|e| Error::Other(format!("export task failed: {}", e)))?
    }
}
