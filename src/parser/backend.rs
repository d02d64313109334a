//! Content provider abstraction.
//!
//! The transcription pipeline never touches a PDF library directly. It asks a
//! [`ContentProvider`] to open raw bytes and then reads page counts, page
//! geometry and raw text fragments through [`DocumentContent`].
//! [`LopdfProvider`] is the bundled implementation.

use std::collections::BTreeMap;

use lopdf::{Dictionary, Document as LopdfDocument, Object, ObjectId};

use crate::detect::detect_format_from_bytes;
use crate::error::{Error, Result};
use crate::model::{PageGeometry, RawFragment};

use super::content::{decode_text_simple, walk_operations, TextDecoder};

/// Opens raw document bytes.
pub trait ContentProvider: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &str;

    /// Open a document. Fails with [`Error::DocumentUnreadable`] when the
    /// bytes cannot be interpreted at all.
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn DocumentContent>>;
}

/// Page-level access to an opened document.
pub trait DocumentContent: Send {
    /// Number of pages.
    fn page_count(&self) -> u32;

    /// Intrinsic dimensions of a 1-indexed page.
    fn page_geometry(&self, page: u32) -> Result<PageGeometry>;

    /// Raw text fragments of a 1-indexed page, in stream order.
    fn page_fragments(&self, page: u32) -> Result<Vec<RawFragment>>;
}

/// [`ContentProvider`] backed by `lopdf`.
#[derive(Debug, Clone, Default)]
pub struct LopdfProvider {
    _private: (),
}

impl LopdfProvider {
    /// Create a new provider.
    pub fn new() -> Self {
        Self { _private: () }
    }
}

impl ContentProvider for LopdfProvider {
    fn name(&self) -> &str {
        "lopdf"
    }

    fn open(&self, bytes: &[u8]) -> Result<Box<dyn DocumentContent>> {
        detect_format_from_bytes(bytes)
            .map_err(|e| Error::DocumentUnreadable(e.to_string()))?;

        let doc = LopdfDocument::load_mem(bytes)
            .map_err(|e| Error::DocumentUnreadable(e.to_string()))?;

        if doc.is_encrypted() {
            log::warn!("Document is encrypted; text may not decode");
        }

        let pages = doc.get_pages();
        log::debug!("Opened PDF {} with {} pages", doc.version, pages.len());
        Ok(Box::new(LopdfContent { doc, pages }))
    }
}

/// An opened `lopdf` document.
struct LopdfContent {
    doc: LopdfDocument,
    pages: BTreeMap<u32, ObjectId>,
}

impl LopdfContent {
    fn page_id(&self, page: u32) -> Result<ObjectId> {
        self.pages
            .get(&page)
            .copied()
            .ok_or(Error::PageOutOfRange(page, self.pages.len() as u32))
    }

    /// Look up a page attribute, following `Parent` links for inherited keys.
    fn inherited<'a>(&'a self, mut dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
        // Page trees are shallow; the bound only guards against cycles.
        for _ in 0..32 {
            if let Ok(value) = dict.get(key) {
                return Some(value);
            }
            let parent = dict.get(b"Parent").ok()?.as_reference().ok()?;
            dict = self.doc.get_dictionary(parent).ok()?;
        }
        None
    }

    fn resolve_array<'a>(&'a self, obj: &'a Object) -> Option<&'a Vec<Object>> {
        match obj {
            Object::Reference(r) => self.doc.get_object(*r).ok()?.as_array().ok(),
            other => other.as_array().ok(),
        }
    }

    fn page_content(&self, page_id: ObjectId) -> Result<Vec<u8>> {
        let page_dict = self.doc.get_dictionary(page_id)?;

        let contents = match page_dict.get(b"Contents") {
            Ok(contents) => contents,
            // A page without a content stream is blank.
            Err(_) => return Ok(Vec::new()),
        };

        match contents {
            Object::Reference(r) => match self.doc.get_object(*r) {
                Ok(Object::Stream(s)) => {
                    Ok(s.decompressed_content().unwrap_or_else(|_| s.content.clone()))
                }
                Ok(Object::Array(arr)) => Ok(self.concat_streams(arr)),
                _ => Err(Error::PdfParse("Invalid content stream".to_string())),
            },
            Object::Array(arr) => Ok(self.concat_streams(arr)),
            _ => Err(Error::PdfParse("Invalid content stream".to_string())),
        }
    }

    fn concat_streams(&self, arr: &[Object]) -> Vec<u8> {
        let mut content = Vec::new();
        for obj in arr {
            if let Object::Reference(r) = obj {
                if let Ok(Object::Stream(s)) = self.doc.get_object(*r) {
                    match s.decompressed_content() {
                        Ok(data) => content.extend_from_slice(&data),
                        Err(_) => content.extend_from_slice(&s.content),
                    }
                    content.push(b' ');
                }
            }
        }
        content
    }
}

impl DocumentContent for LopdfContent {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_geometry(&self, page: u32) -> Result<PageGeometry> {
        let page_id = self.page_id(page)?;
        let page_dict = self.doc.get_dictionary(page_id)?;

        let view_box = self
            .inherited(page_dict, b"CropBox")
            .or_else(|| self.inherited(page_dict, b"MediaBox"))
            .and_then(|obj| self.resolve_array(obj))
            .and_then(|arr| {
                let nums: Vec<f64> = arr
                    .iter()
                    .filter_map(|o| o.as_float().ok().map(f64::from))
                    .collect();
                (nums.len() >= 4).then(|| [nums[0], nums[1], nums[2], nums[3]])
            });

        Ok(match view_box {
            Some([x0, y0, x1, y1]) => {
                PageGeometry::new((x1 - x0).abs(), (y1 - y0).abs()).with_origin(x0.min(x1), y0.min(y1))
            }
            None => {
                log::debug!("Page {} has no view box, assuming Letter", page);
                PageGeometry::letter()
            }
        })
    }

    fn page_fragments(&self, page: u32) -> Result<Vec<RawFragment>> {
        let page_id = self.page_id(page)?;
        let data = self.page_content(page_id)?;
        if data.is_empty() {
            return Ok(Vec::new());
        }

        let content = lopdf::content::Content::decode(&data)?;

        let fonts = self.doc.get_page_fonts(page_id)?;
        let decoder = PageFonts {
            doc: &self.doc,
            fonts,
        };

        Ok(walk_operations(&content.operations, &decoder))
    }
}

/// Font dictionaries of one page.
struct PageFonts<'a> {
    doc: &'a LopdfDocument,
    fonts: BTreeMap<Vec<u8>, &'a Dictionary>,
}

impl TextDecoder for PageFonts<'_> {
    fn base_font(&self, resource: &[u8]) -> String {
        self.fonts
            .get(resource)
            .and_then(|font| font.get(b"BaseFont").ok())
            .and_then(|o| o.as_name().ok())
            .map(|n| String::from_utf8_lossy(n).to_string())
            .unwrap_or_else(|| String::from_utf8_lossy(resource).to_string())
    }

    fn decode(&self, resource: &[u8], bytes: &[u8]) -> String {
        if let Some(font) = self.fonts.get(resource) {
            if let Ok(enc) = font.get_font_encoding(self.doc) {
                if let Ok(text) = LopdfDocument::decode_text(&enc, bytes) {
                    return text;
                }
            }
        }
        decode_text_simple(bytes)
    }
}
