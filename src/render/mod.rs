//! Output representations of transcripts.

mod json;
mod overlay;

pub use json::{to_json, JsonFormat};
pub use overlay::{document_markup, escape_html, OverlayExporter};
