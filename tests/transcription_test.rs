//! Integration tests for transcription over real and scripted documents.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::{build_pdf, BlankRasterizer, FixedRecognizer, ScriptProvider};
use pdfhub::model::normalize_page;
use pdfhub::{
    transcribe_bytes, DocumentId, DocumentSource, ExportFormat, Fragment, LopdfProvider,
    PageGeometry, PageOrigin, PdfHub, ProgressEvent, RawFragment, ReadingOrder,
    TranscribeOptions, Transcriber, TranscriptionState,
};

fn source(bytes: &[u8]) -> DocumentSource {
    DocumentSource::new(DocumentId::from_raw(1), "doc.pdf", bytes)
}

#[test]
fn test_lopdf_text_in_reading_order() {
    let pdf = build_pdf(&[&[
        (100, 540, 24, "Second line"),
        (100, 600, 24, "Hello"),
        (172, 601, 24, " World"),
    ]]);

    let text = transcribe_bytes(&pdf, ExportFormat::Text).unwrap();
    assert_eq!(text, "Hello World\nSecond line");
}

#[test]
fn test_lopdf_overlay_uses_media_box() {
    let pdf = build_pdf(&[&[(100, 600, 24, "Title")]]);
    let html = transcribe_bytes(&pdf, ExportFormat::Overlay).unwrap();

    assert!(html.contains("width:595px; height:842px;"));
    assert!(html.contains("left:100px; top:242px; font-size:24px; font-family:Courier"));
    assert!(html.contains(">Title</span>"));
}

#[test]
fn test_lopdf_pages_are_separated() {
    let pdf = build_pdf(&[&[(50, 700, 12, "one")], &[(50, 700, 12, "two")]]);
    let text = transcribe_bytes(&pdf, ExportFormat::Text).unwrap();
    assert_eq!(text, "one\n\ntwo");
}

#[test]
fn test_lopdf_blank_page_falls_back_to_recognition() {
    let pdf = build_pdf(&[&[(50, 700, 12, "typed")], &[]]);
    let rasterizer = Arc::new(BlankRasterizer::default());
    let recognizer = Arc::new(FixedRecognizer::new("scanned words"));

    let transcriber = Transcriber::new(Arc::new(LopdfProvider::new()))
        .with_rasterizer(rasterizer.clone())
        .with_recognizer(recognizer.clone());
    let result = transcriber.run(&source(&pdf), ExportFormat::Text).unwrap();

    assert_eq!(result.output(), "typed\n\nscanned words");
    assert_eq!(result.transcript.pages[0].origin, PageOrigin::EmbeddedText);
    assert_eq!(result.transcript.pages[1].origin, PageOrigin::Recognition);
    assert_eq!(rasterizer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(recognizer.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_fallback_taken_exactly_for_pages_without_fragments() {
    // Pages 2, 4 and 5 have no fragments; page 3 has a single space.
    let script = b"0,10,5,a||0,10,5, |||0,10,5,e";
    let recognizer = Arc::new(FixedRecognizer::new("ocr"));
    let transcriber = Transcriber::new(Arc::new(ScriptProvider::new()))
        .with_rasterizer(Arc::new(BlankRasterizer::default()))
        .with_recognizer(recognizer.clone());

    let result = transcriber.run(&source(script), ExportFormat::Text).unwrap();
    let origins: Vec<PageOrigin> = result.transcript.pages.iter().map(|p| p.origin).collect();
    assert_eq!(
        origins,
        vec![
            PageOrigin::EmbeddedText,
            PageOrigin::Recognition,
            PageOrigin::EmbeddedText,
            PageOrigin::Recognition,
            PageOrigin::Recognition,
            PageOrigin::EmbeddedText,
        ]
    );
    assert_eq!(result.fallback_pages(), 3);
    assert_eq!(recognizer.calls.load(Ordering::SeqCst), 3);
    assert_eq!(result.states.first(), Some(&TranscriptionState::Idle));
    assert_eq!(result.states.last(), Some(&TranscriptionState::Done));
}

#[test]
fn test_failed_recognition_does_not_fail_document() {
    let hub = PdfHub::builder()
        .with_provider(Arc::new(ScriptProvider::new()))
        .with_rasterizer(Arc::new(BlankRasterizer::default()))
        .with_recognizer(Arc::new(FixedRecognizer::failing()))
        .build();
    let events = hub.subscribe();
    let id = hub
        .open_bytes("mixed.pdf", b"|0,10,5,after".to_vec(), pdfhub::Origin::User)
        .handle
        .id;

    let text = hub.export_document(id, ExportFormat::Text).unwrap();
    assert_eq!(text, "after");

    let events: Vec<ProgressEvent> = events.try_iter().collect();
    assert!(events.iter().any(|e| matches!(
        e,
        ProgressEvent::PageRecognition { page: 1, percent: 25, .. }
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        ProgressEvent::PageFailed { page: 1, reason, .. } if reason.contains("out of memory")
    )));
}

#[test]
fn test_same_line_order_is_independent_of_input_order() {
    let base = vec![
        Fragment::new("c", 30.0, 100.4, 10.0),
        Fragment::new("a", 10.0, 101.2, 10.0),
        Fragment::new("b", 20.0, 99.9, 10.0),
        Fragment::new("next", 10.0, 80.0, 10.0),
    ];
    let order = ReadingOrder::default();

    let mut permutations = vec![base.clone()];
    let mut reversed = base.clone();
    reversed.reverse();
    permutations.push(reversed);
    let mut rotated = base.clone();
    rotated.rotate_left(2);
    permutations.push(rotated);

    for fragments in permutations {
        assert_eq!(order.reconstruct_page(&fragments), "abc\nnext");
    }
}

#[test]
fn test_single_fragment_text_is_verbatim() {
    let raw = [RawFragment::new("Cafe\u{0301}", 10.0, 100.0, 10.0)];
    let page = normalize_page(&raw, &PageGeometry::letter(), 1);
    assert_eq!(ReadingOrder::default().reconstruct_page(&page.fragments), "Cafe\u{0301}");

    let script = "0,10,5,Cafe\u{0301}".as_bytes();
    let plain = Transcriber::new(Arc::new(ScriptProvider::new()));
    assert_eq!(
        plain.transcribe(&source(script), ExportFormat::Text).unwrap(),
        "Cafe\u{0301}"
    );

    let composed = Transcriber::new(Arc::new(ScriptProvider::new()))
        .with_options(TranscribeOptions::new().with_compose_unicode(true));
    assert_eq!(
        composed.transcribe(&source(script), ExportFormat::Text).unwrap(),
        "Caf\u{00E9}"
    );
}
