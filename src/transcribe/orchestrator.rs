//! Per-document transcription.
//!
//! A document is walked page by page in ascending order. Pages with at least
//! one text fragment are reconstructed from their fragments; pages with none
//! are rasterized and handed to the recognizer. A page that fails
//! recognition is left empty and reported, it never fails the document.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    normalize_page, DocumentTranscript, ExportFormat, PageGeometry, PageOrigin, PageTranscript,
};
use crate::parser::{ContentProvider, DocumentContent, LopdfProvider, ReadingOrder, TranscribeOptions};
use crate::recognize::{
    PageRef, Rasterizer, RecognitionProgress, Recognizer, UnavailableRasterizer,
    UnavailableRecognizer,
};
use crate::render::OverlayExporter;
use crate::session::DocumentSource;

use super::progress::{ProgressEvent, ProgressHub};

/// States of one document's transcription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptionState {
    /// Not started
    Idle,
    /// Selecting the next page
    PageLoop,
    /// Reconstructing a page from embedded fragments
    EmbeddedText,
    /// Recognizing a page without fragments
    FallbackRecognition,
    /// Joining page transcripts
    Assembling,
    /// Transcript ready
    Done,
    /// Document could not be opened
    Failed,
}

impl TranscriptionState {
    /// Whether moving from `self` to `next` is a legal step.
    pub fn can_transition_to(self, next: TranscriptionState) -> bool {
        use TranscriptionState::*;
        matches!(
            (self, next),
            (_, Failed)
                | (Idle, PageLoop)
                | (PageLoop, EmbeddedText)
                | (PageLoop, FallbackRecognition)
                | (PageLoop, Assembling)
                | (EmbeddedText, PageLoop)
                | (FallbackRecognition, PageLoop)
                | (Assembling, Done)
        ) && self != Done
            && self != Failed
    }
}

impl fmt::Display for TranscriptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TranscriptionState::Idle => "idle",
            TranscriptionState::PageLoop => "page loop",
            TranscriptionState::EmbeddedText => "embedded text",
            TranscriptionState::FallbackRecognition => "fallback recognition",
            TranscriptionState::Assembling => "assembling",
            TranscriptionState::Done => "done",
            TranscriptionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Outcome of a successful transcription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcription {
    /// Per-page transcripts
    pub transcript: DocumentTranscript,
    /// Every state entered, in order, starting with `Idle`
    pub states: Vec<TranscriptionState>,
}

impl Transcription {
    /// The assembled document output.
    pub fn output(&self) -> String {
        self.transcript.assemble()
    }

    /// Number of pages that went through the recognition branch.
    pub fn fallback_pages(&self) -> usize {
        self.states
            .iter()
            .filter(|s| **s == TranscriptionState::FallbackRecognition)
            .count()
    }
}

/// State tracker for one run.
struct Machine {
    state: TranscriptionState,
    visited: Vec<TranscriptionState>,
}

impl Machine {
    fn new() -> Self {
        Self {
            state: TranscriptionState::Idle,
            visited: vec![TranscriptionState::Idle],
        }
    }

    fn enter(&mut self, next: TranscriptionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        self.state = next;
        self.visited.push(next);
    }
}

/// Turns document bytes into a transcript.
pub struct Transcriber {
    provider: Arc<dyn ContentProvider>,
    rasterizer: Arc<dyn Rasterizer>,
    recognizer: Arc<dyn Recognizer>,
    options: TranscribeOptions,
    overlay: OverlayExporter,
    progress: Arc<ProgressHub>,
}

impl Transcriber {
    /// Create a transcriber over `provider` with no recognition engine.
    pub fn new(provider: Arc<dyn ContentProvider>) -> Self {
        Self {
            provider,
            rasterizer: Arc::new(UnavailableRasterizer),
            recognizer: Arc::new(UnavailableRecognizer),
            options: TranscribeOptions::default(),
            overlay: OverlayExporter::default(),
            progress: Arc::new(ProgressHub::new()),
        }
    }

    /// Set the page rasterizer used by the fallback branch.
    pub fn with_rasterizer(mut self, rasterizer: Arc<dyn Rasterizer>) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    /// Set the recognition engine used by the fallback branch.
    pub fn with_recognizer(mut self, recognizer: Arc<dyn Recognizer>) -> Self {
        self.recognizer = recognizer;
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

    /// Publish progress to an existing hub.
    pub fn with_progress(mut self, progress: Arc<ProgressHub>) -> Self {
        self.progress = progress;
        self
    }

    /// Current options.
    pub fn options(&self) -> &TranscribeOptions {
        &self.options
    }

    /// The hub progress events are published to.
    pub fn progress(&self) -> &Arc<ProgressHub> {
        &self.progress
    }

    /// Transcribe a document and return the assembled output.
    pub fn transcribe(&self, source: &DocumentSource, format: ExportFormat) -> Result<String> {
        self.run(source, format).map(|t| t.output())
    }

    /// Transcribe a document, keeping per-page results and visited states.
    ///
    /// Fails only when the document cannot be opened at all: with
    /// [`Error::DocumentUnreadable`] when the bytes are at fault, or with the
    /// provider's own error when it is not (see [`Error::is_document_level`]).
    pub fn run(&self, source: &DocumentSource, format: ExportFormat) -> Result<Transcription> {
        let mut machine = Machine::new();
        self.progress.publish(ProgressEvent::Started {
            document: source.id,
            name: source.name.clone(),
        });

        let doc = match self.provider.open(&source.bytes) {
            Ok(doc) => doc,
            Err(e) => {
                machine.enter(TranscriptionState::Failed);
                let err = match e {
                    Error::DocumentUnreadable(reason) => Error::DocumentUnreadable(reason),
                    e if e.is_document_level() => Error::DocumentUnreadable(e.to_string()),
                    other => other,
                };
                let reason = match &err {
                    Error::DocumentUnreadable(reason) => reason.clone(),
                    other => other.to_string(),
                };
                log::warn!("Cannot open '{}': {}", source.name, reason);
                self.progress.publish(ProgressEvent::Failed {
                    document: source.id,
                    reason,
                });
                return Err(err);
            }
        };

        let page_count = doc.page_count();
        log::debug!(
            "Transcribing '{}' ({} pages) via {} as {}",
            source.name,
            page_count,
            self.provider.name(),
            format.label()
        );

        let order = ReadingOrder::from_options(&self.options);
        let mut transcript = DocumentTranscript::new(format);
        machine.enter(TranscriptionState::PageLoop);

        for page in 1..=page_count {
            let page_transcript = self.transcribe_page(
                source,
                &*doc,
                page,
                format,
                &order,
                &mut machine,
            );
            transcript.push(page_transcript);
            machine.enter(TranscriptionState::PageLoop);
        }

        machine.enter(TranscriptionState::Assembling);
        let recognized_pages = transcript.recognized_pages();
        machine.enter(TranscriptionState::Done);

        self.progress.publish(ProgressEvent::Completed {
            document: source.id,
            pages: page_count,
            recognized_pages,
        });

        Ok(Transcription {
            transcript,
            states: machine.visited,
        })
    }

    fn transcribe_page(
        &self,
        source: &DocumentSource,
        doc: &dyn DocumentContent,
        page: u32,
        format: ExportFormat,
        order: &ReadingOrder,
        machine: &mut Machine,
    ) -> PageTranscript {
        let geometry = doc.page_geometry(page).unwrap_or_else(|e| {
            log::warn!("Page {} geometry unavailable: {}", page, e);
            PageGeometry::default()
        });
        let raw = doc.page_fragments(page).unwrap_or_else(|e| {
            log::warn!("Page {} content unreadable: {}", page, e);
            Vec::new()
        });

        let mut normalized = normalize_page(&raw, &geometry, page);
        if self.options.compose_unicode {
            normalized.compose_text();
        }
        if normalized.dropped > 0 {
            self.progress.publish(ProgressEvent::FragmentDropped {
                document: source.id,
                page,
                count: normalized.dropped,
            });
        }

        if !normalized.fragments.is_empty() {
            machine.enter(TranscriptionState::EmbeddedText);
            let content = match format {
                ExportFormat::Text => order.reconstruct_page(&normalized.fragments),
                ExportFormat::Overlay => {
                    self.overlay
                        .page_block(page, &geometry, &normalized.fragments)
                }
            };
            return PageTranscript::new(page, content, PageOrigin::EmbeddedText);
        }

        machine.enter(TranscriptionState::FallbackRecognition);
        let page_ref = PageRef {
            bytes: &source.bytes,
            page_index: page,
            geometry,
        };
        match self.recognize_page(source, &page_ref) {
            Ok(text) => {
                let content = match format {
                    ExportFormat::Text => text,
                    ExportFormat::Overlay => self.overlay.recognized_block(page, &geometry, &text),
                };
                PageTranscript::new(page, content, PageOrigin::Recognition)
            }
            Err(e) => {
                log::warn!("Page {} of '{}' left empty: {}", page, source.name, e);
                let reason = match e {
                    Error::PageRecognitionFailed { reason, .. } => reason,
                    other => other.to_string(),
                };
                self.progress.publish(ProgressEvent::PageFailed {
                    document: source.id,
                    page,
                    reason,
                });
                let content = match format {
                    ExportFormat::Text => String::new(),
                    ExportFormat::Overlay => self.overlay.page_block(page, &geometry, &[]),
                };
                PageTranscript::new(page, content, PageOrigin::RecognitionFailed)
            }
        }
    }

    /// Rasterize and recognize one page.
    fn recognize_page(&self, source: &DocumentSource, page: &PageRef<'_>) -> Result<String> {
        let fail = |reason: String| Error::PageRecognitionFailed {
            page: page.page_index,
            reason,
        };

        let image = self
            .rasterizer
            .rasterize(page, self.options.ocr_scale)
            .map_err(|e| fail(e.to_string()))?;

        let mut on_progress = |p: RecognitionProgress| {
            self.progress.publish(ProgressEvent::PageRecognition {
                document: source.id,
                page: page.page_index,
                percent: p.percent(),
                stage: p.stage,
            });
        };

        let text = self
            .recognizer
            .recognize(&image, &self.options.ocr_language, &mut on_progress)
            .map_err(|e| fail(e.to_string()))?;

        Ok(text.trim().to_string())
    }
}

impl Default for Transcriber {
    fn default() -> Self {
        Self::new(Arc::new(LopdfProvider::new()))
    }
}

impl fmt::Debug for Transcriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transcriber")
            .field("provider", &self.provider.name())
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawFragment;
    use crate::recognize::PixelBuffer;
    use crate::session::DocumentId;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Pages given as raw fragment lists; an empty list is a scanned page.
    struct FakeProvider {
        pages: Vec<Vec<RawFragment>>,
    }

    struct FakeContent {
        pages: Vec<Vec<RawFragment>>,
    }

    impl ContentProvider for FakeProvider {
        fn name(&self) -> &str {
            "fake"
        }

        fn open(&self, bytes: &[u8]) -> Result<Box<dyn DocumentContent>> {
            if bytes.starts_with(b"bad") {
                return Err(Error::DocumentUnreadable("corrupt".into()));
            }
            Ok(Box::new(FakeContent {
                pages: self.pages.clone(),
            }))
        }
    }

    impl DocumentContent for FakeContent {
        fn page_count(&self) -> u32 {
            self.pages.len() as u32
        }

        fn page_geometry(&self, _page: u32) -> Result<PageGeometry> {
            Ok(PageGeometry::new(200.0, 100.0))
        }

        fn page_fragments(&self, page: u32) -> Result<Vec<RawFragment>> {
            Ok(self.pages[page as usize - 1].clone())
        }
    }

    struct BlankRasterizer;

    impl Rasterizer for BlankRasterizer {
        fn rasterize(&self, page: &PageRef<'_>, scale: f64) -> Result<PixelBuffer> {
            let (w, h) = page.scaled_size(scale);
            Ok(PixelBuffer::new(w, h, vec![255; (w * h * 4) as usize]))
        }
    }

    /// Returns "scan N" on its Nth call, or fails every call when `fail` is set.
    struct CountingRecognizer {
        calls: AtomicUsize,
        fail: bool,
    }

    impl Recognizer for CountingRecognizer {
        fn recognize(
            &self,
            image: &PixelBuffer,
            language: &str,
            progress: &mut dyn FnMut(RecognitionProgress),
        ) -> Result<String> {
            assert_eq!(language, "eng");
            assert_eq!((image.width, image.height), (400, 200));
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            progress(RecognitionProgress::new(0.5, "recognizing text"));
            if self.fail {
                return Err(Error::Other("engine crashed".into()));
            }
            progress(RecognitionProgress::new(1.0, "recognizing text"));
            Ok(format!("  scan {}\n", n))
        }
    }

    fn source(bytes: &[u8]) -> DocumentSource {
        DocumentSource::new(DocumentId::from_raw(1), "doc.pdf", bytes.to_vec())
    }

    fn transcriber(pages: Vec<Vec<RawFragment>>, fail: bool) -> (Transcriber, Arc<CountingRecognizer>) {
        let recognizer = Arc::new(CountingRecognizer {
            calls: AtomicUsize::new(0),
            fail,
        });
        let t = Transcriber::new(Arc::new(FakeProvider { pages }))
            .with_rasterizer(Arc::new(BlankRasterizer))
            .with_recognizer(recognizer.clone());
        (t, recognizer)
    }

    #[test]
    fn test_embedded_pages_skip_recognition() {
        let (t, recognizer) = transcriber(
            vec![
                vec![RawFragment::new("Hello", 0.0, 50.0, 10.0)],
                vec![RawFragment::new("World", 0.0, 50.0, 10.0)],
            ],
            false,
        );
        let result = t.run(&source(b"%PDF"), ExportFormat::Text).unwrap();
        assert_eq!(result.output(), "Hello\n\nWorld");
        assert_eq!(result.fallback_pages(), 0);
        assert_eq!(recognizer.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_empty_page_takes_fallback() {
        let (t, recognizer) = transcriber(
            vec![vec![RawFragment::new("Typed", 0.0, 50.0, 10.0)], vec![]],
            false,
        );
        let result = t.run(&source(b"%PDF"), ExportFormat::Text).unwrap();

        use TranscriptionState::*;
        assert_eq!(
            result.states,
            vec![
                Idle,
                PageLoop,
                EmbeddedText,
                PageLoop,
                FallbackRecognition,
                PageLoop,
                Assembling,
                Done
            ]
        );
        assert_eq!(result.output(), "Typed\n\nscan 1");
        assert_eq!(result.transcript.pages[1].origin, PageOrigin::Recognition);
        assert_eq!(recognizer.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_recognition_failure_leaves_page_empty() {
        let (t, _) = transcriber(
            vec![vec![], vec![RawFragment::new("after", 0.0, 50.0, 10.0)]],
            true,
        );
        let events = t.progress().subscribe();
        let result = t.run(&source(b"%PDF"), ExportFormat::Text).unwrap();

        assert_eq!(result.output(), "after");
        assert_eq!(
            result.transcript.pages[0].origin,
            PageOrigin::RecognitionFailed
        );

        let events: Vec<ProgressEvent> = events.try_iter().collect();
        assert!(events.iter().any(|e| matches!(
            e,
            ProgressEvent::PageFailed { page: 1, reason, .. } if reason.contains("engine crashed")
        )));
        assert!(matches!(events.last(), Some(ProgressEvent::Completed { pages: 2, .. })));
    }

    #[test]
    fn test_unreadable_document_fails() {
        let (t, _) = transcriber(vec![], false);
        let events = t.progress().subscribe();
        let err = t.run(&source(b"bad bytes"), ExportFormat::Text).unwrap_err();
        assert!(matches!(err, Error::DocumentUnreadable(ref r) if r == "corrupt"));

        let events: Vec<ProgressEvent> = events.try_iter().collect();
        assert!(matches!(events[0], ProgressEvent::Started { .. }));
        assert!(matches!(events[1], ProgressEvent::Failed { .. }));
    }

    #[test]
    fn test_recognition_progress_is_published() {
        let (t, _) = transcriber(vec![vec![]], false);
        let events = t.progress().subscribe();
        t.run(&source(b"%PDF"), ExportFormat::Text).unwrap();

        let percents: Vec<u8> = events
            .try_iter()
            .filter_map(|e| match e {
                ProgressEvent::PageRecognition { percent, .. } => Some(percent),
                _ => None,
            })
            .collect();
        assert_eq!(percents, vec![50, 100]);
    }

    #[test]
    fn test_overlay_format() {
        let (t, _) = transcriber(
            vec![vec![RawFragment::new("a<b", 10.0, 50.0, 10.0)], vec![]],
            false,
        );
        let t = t.with_overlay(OverlayExporter::new().plain());
        let html = t.transcribe(&source(b"%PDF"), ExportFormat::Overlay).unwrap();

        assert!(html.contains("a&lt;b"));
        assert!(html.contains("top:50px"));
        assert!(html.contains("<!-- page-break -->"));
        assert!(html.contains("scan 1"));
        assert_eq!(html.matches("class=\"page\"").count(), 2);
    }

    #[test]
    fn test_malformed_fragments_are_dropped_and_reported() {
        let (t, recognizer) = transcriber(
            vec![vec![
                RawFragment::default(),
                RawFragment::new("kept", 0.0, 50.0, 10.0),
            ]],
            false,
        );
        let events = t.progress().subscribe();
        let text = t.transcribe(&source(b"%PDF"), ExportFormat::Text).unwrap();
        assert_eq!(text, "kept");
        assert_eq!(recognizer.calls.load(Ordering::SeqCst), 0);
        assert!(events
            .try_iter()
            .any(|e| matches!(e, ProgressEvent::FragmentDropped { count: 1, .. })));
    }

    #[test]
    fn test_zero_page_document() {
        let (t, _) = transcriber(vec![], false);
        let result = t.run(&source(b"%PDF"), ExportFormat::Text).unwrap();
        assert_eq!(result.output(), "");
        use TranscriptionState::*;
        assert_eq!(result.states, vec![Idle, PageLoop, Assembling, Done]);
    }

    #[test]
    fn test_transitions() {
        use TranscriptionState::*;
        assert!(Idle.can_transition_to(PageLoop));
        assert!(PageLoop.can_transition_to(Failed));
        assert!(!Idle.can_transition_to(Done));
        assert!(!Done.can_transition_to(Failed));
        assert!(!EmbeddedText.can_transition_to(FallbackRecognition));
    }
}
