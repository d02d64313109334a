//! Page content access and reading-order reconstruction.

mod backend;
mod content;
mod options;
mod reading_order;

pub use backend::{ContentProvider, DocumentContent, LopdfProvider};
pub use content::{decode_text_simple, walk_operations, TextDecoder};
pub use options::{
    TranscribeOptions, DEFAULT_LINE_BREAK_FACTOR, DEFAULT_LINE_TOLERANCE, DEFAULT_OCR_LANGUAGE,
    DEFAULT_OCR_SCALE,
};
pub use reading_order::{compare, ReadingOrder};
