//! Positioned-HTML overlay export.
//!
//! Each page becomes a relatively positioned container of the page's size
//! holding one absolutely positioned span per fragment. Fragments are placed
//! independently; no ordering or line inference happens here.

use std::fmt::Write as _;

use crate::model::{Fragment, PageGeometry};

/// Inline style of a page container, after its size.
const PAGE_CHROME: &str = "border: 1px solid #ccc; margin: 1rem auto; \
background-color: white; box-shadow: 0 2px 8px rgba(0,0,0,0.1);";

/// Builds overlay markup for pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayExporter {
    /// Decorate page containers with a border and shadow
    pub page_chrome: bool,
}

impl OverlayExporter {
    /// Create an exporter with page decoration enabled.
    pub fn new() -> Self {
        Self { page_chrome: true }
    }

    /// Disable page decoration (bare containers).
    pub fn plain(mut self) -> Self {
        self.page_chrome = false;
        self
    }

    /// Render one page block.
    ///
    /// The container's width and height equal the page geometry. Each span's
    /// `left` is the fragment's X and its `top` is the fragment's baseline
    /// flipped into top-down space (`height - y`), with `font-size` equal to
    /// the fragment height.
    pub fn page_block(&self, page_index: u32, geometry: &PageGeometry, fragments: &[Fragment]) -> String {
        let mut html = String::with_capacity(128 + fragments.len() * 96);
        self.open_page(&mut html, page_index, geometry);

        for fragment in fragments {
            let top = geometry.height - fragment.y;
            let _ = write!(
                html,
                "<span style=\"position: absolute; left:{}px; top:{}px; font-size:{}px",
                px(fragment.x),
                px(top),
                px(fragment.height)
            );
            if !fragment.font_name.is_empty() {
                let _ = write!(html, "; font-family:{}", escape_html(&fragment.font_name));
            }
            html.push_str("\">");
            html.push_str(&escape_html(&fragment.text));
            html.push_str("</span>");
        }

        html.push_str("</div>");
        html
    }

    /// Render a page whose text came from recognition rather than fragments.
    ///
    /// Recognized text carries no positions, so it is laid out as one
    /// pre-wrapped block at the top-left of the page container.
    pub fn recognized_block(&self, page_index: u32, geometry: &PageGeometry, text: &str) -> String {
        let mut html = String::with_capacity(160 + text.len());
        self.open_page(&mut html, page_index, geometry);
        if !text.is_empty() {
            html.push_str(
                "<div class=\"recognized\" style=\"position: absolute; left:0px; top:0px; white-space: pre-wrap;\">",
            );
            html.push_str(&escape_html(text));
            html.push_str("</div>");
        }
        html.push_str("</div>");
        html
    }

    fn open_page(&self, html: &mut String, page_index: u32, geometry: &PageGeometry) {
        let _ = write!(
            html,
            "<div class=\"page\" data-page=\"{}\" style=\"position: relative; width:{}px; height:{}px;",
            page_index,
            px(geometry.width),
            px(geometry.height)
        );
        if self.page_chrome {
            html.push(' ');
            html.push_str(PAGE_CHROME);
        }
        html.push_str("\">");
    }
}

impl Default for OverlayExporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Wrap overlay output in a standalone HTML document.
pub fn document_markup(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        escape_html(title),
        body
    )
}

/// Escape HTML special characters.
///
/// Replaces &, <, >, ", and ' with their entity equivalents.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Format a coordinate with at most two decimals and no trailing zeros.
fn px(value: f64) -> String {
    let s = format!("{:.2}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" || s.is_empty() {
        "0".to_string()
    } else {
        s.to_string()
    }
}
