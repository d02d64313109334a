//! Shared test collaborators.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;

use pdfhub::{
    ClipboardSink, ContentProvider, DocumentContent, Error, ExportFormat, PageGeometry, PageRef,
    PixelBuffer, Rasterizer, RawFragment, RecognitionProgress, Recognizer, Result,
};

/// Content provider reading a tiny text format instead of PDF.
///
/// Pages are separated by `|`, fragments by `;`, and a fragment is
/// `x,y,height,text`. An empty page has no fragments. Bytes starting with
/// `BAD` cannot be opened; bytes starting with `OFFLINE` make the provider
/// itself fail.
#[derive(Default)]
pub struct ScriptProvider {
    gate: Option<Gate>,
}

/// Blocks `open` until the test releases it.
pub struct Gate {
    entered: Sender<()>,
    release: Receiver<()>,
}

/// Test side of a [`Gate`].
pub struct GateControl {
    pub entered: Receiver<()>,
    pub release: Sender<()>,
}

impl ScriptProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider whose every `open` waits for a release signal.
    pub fn gated() -> (Self, GateControl) {
        let (entered_tx, entered_rx) = bounded(16);
        let (release_tx, release_rx) = bounded(16);
        let provider = Self {
            gate: Some(Gate {
                entered: entered_tx,
                release: release_rx,
            }),
        };
        let control = GateControl {
            entered: entered_rx,
            release: release_tx,
        };
        (provider, control)
    }
}

impl ContentProvider for ScriptProvider {
    fn name(&self) -> &str {
        "script"
    }

    fn open(&self, bytes: &[u8]) -> Result<Box<dyn DocumentContent>> {
        if let Some(gate) = &self.gate {
            let _ = gate.entered.send(());
            let _ = gate.release.recv();
        }

        if bytes.starts_with(b"BAD") {
            return Err(Error::DocumentUnreadable("corrupt header".into()));
        }
        if bytes.starts_with(b"OFFLINE") {
            return Err(Error::Other("provider offline".into()));
        }
        let script = String::from_utf8_lossy(bytes).to_string();
        let pages = script.split('|').map(parse_page).collect();
        Ok(Box::new(ScriptContent { pages }))
    }
}

fn parse_page(page: &str) -> Vec<RawFragment> {
    page.split(';')
        .filter(|f| !f.is_empty())
        .map(|f| {
            let parts: Vec<&str> = f.splitn(4, ',').collect();
            let num = |i: usize| parts.get(i).and_then(|p| p.parse::<f64>().ok()).unwrap_or(0.0);
            RawFragment::new(parts.get(3).copied().unwrap_or(""), num(0), num(1), num(2))
        })
        .collect()
}

struct ScriptContent {
    pages: Vec<Vec<RawFragment>>,
}

impl DocumentContent for ScriptContent {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_geometry(&self, _page: u32) -> Result<PageGeometry> {
        Ok(PageGeometry::new(300.0, 400.0))
    }

    fn page_fragments(&self, page: u32) -> Result<Vec<RawFragment>> {
        self.pages
            .get(page as usize - 1)
            .cloned()
            .ok_or(Error::PageOutOfRange(page, self.pages.len() as u32))
    }
}

/// Rasterizer producing a blank image and counting calls.
#[derive(Default)]
pub struct BlankRasterizer {
    pub calls: AtomicUsize,
}

impl Rasterizer for BlankRasterizer {
    fn rasterize(&self, page: &PageRef<'_>, scale: f64) -> Result<PixelBuffer> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (w, h) = page.scaled_size(scale);
        Ok(PixelBuffer::new(w, h, Vec::new()))
    }
}

/// Recognizer returning a fixed text, or failing.
pub struct FixedRecognizer {
    pub text: String,
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl FixedRecognizer {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new("")
        }
    }
}

impl Recognizer for FixedRecognizer {
    fn recognize(
        &self,
        _image: &PixelBuffer,
        _language: &str,
        progress: &mut dyn FnMut(RecognitionProgress),
    ) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        progress(RecognitionProgress::new(0.25, "loading"));
        if self.fail {
            return Err(Error::Other("out of memory".into()));
        }
        progress(RecognitionProgress::new(1.0, "recognizing text"));
        Ok(self.text.clone())
    }
}

/// Clipboard that records writes, or refuses them.
#[derive(Default)]
pub struct MemoryClipboard {
    pub writes: Mutex<Vec<(String, ExportFormat)>>,
    pub deny: bool,
}

impl MemoryClipboard {
    pub fn denying() -> Self {
        Self {
            deny: true,
            ..Self::default()
        }
    }
}

impl ClipboardSink for MemoryClipboard {
    fn write(&self, content: &str, format: ExportFormat) -> Result<()> {
        if self.deny {
            return Err(Error::SinkUnavailable("permission denied".into()));
        }
        self.writes.lock().push((content.to_string(), format));
        Ok(())
    }
}

/// Build a real PDF with one page per entry; each entry lists
/// `(x, y, size, text)` runs. An empty entry yields a page without content.
pub fn build_pdf(pages: &[&[(i64, i64, i64, &str)]]) -> Vec<u8> {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for runs in pages {
        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
        };
        if !runs.is_empty() {
            let mut operations = Vec::new();
            for &(x, y, size, text) in runs.iter() {
                operations.push(Operation::new("BT", vec![]));
                operations.push(Operation::new("Tf", vec!["F1".into(), size.into()]));
                operations.push(Operation::new("Td", vec![x.into(), y.into()]));
                operations.push(Operation::new("Tj", vec![Object::string_literal(text)]));
                operations.push(Operation::new("ET", vec![]));
            }
            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            page.set("Contents", content_id);
        }
        kids.push(doc.add_object(page).into());
    }

    let count = kids.len() as i64;
    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => count,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}
