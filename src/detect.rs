//! PDF header sniffing.
//!
//! Used to reject obviously foreign input before handing bytes to the
//! content provider, so a dropped image or text file is reported as an
//! unreadable document rather than a parser failure deep in a page loop.

use crate::error::{Error, Result};

/// PDF format information read from the file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfFormat {
    /// PDF version (e.g., "1.7", "2.0")
    pub version: String,
}

impl std::fmt::Display for PdfFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PDF {}", self.version)
    }
}

/// PDF magic bytes: %PDF-
const PDF_MAGIC: &[u8] = b"%PDF-";
const PDF_MAGIC_LEN: usize = 5;
const VERSION_LEN: usize = 3; // e.g., "1.7"

/// Header search window. Some producers emit junk before the magic.
const HEADER_SEARCH_LEN: usize = 1024;

/// Detect PDF format from bytes.
///
/// The magic may appear anywhere in the first kilobyte, as readers
/// commonly tolerate leading garbage.
///
/// # Returns
/// * `Ok(PdfFormat)` if the data carries a valid PDF header
/// * `Err(Error::UnknownFormat)` if the data is not a PDF
pub fn detect_format_from_bytes(data: &[u8]) -> Result<PdfFormat> {
    let window = &data[..data.len().min(HEADER_SEARCH_LEN)];
    let start = window
        .windows(PDF_MAGIC_LEN)
        .position(|w| w == PDF_MAGIC)
        .ok_or(Error::UnknownFormat)?;

    let version_start = start + PDF_MAGIC_LEN;
    let version_bytes = data
        .get(version_start..version_start + VERSION_LEN)
        .ok_or(Error::UnknownFormat)?;
    let version = String::from_utf8_lossy(version_bytes).to_string();

    if !is_valid_version(&version) {
        return Err(Error::UnknownFormat);
    }

    Ok(PdfFormat { version })
}

/// Check if a version string is valid.
fn is_valid_version(version: &str) -> bool {
    let chars: Vec<char> = version.chars().collect();
    chars.len() == 3 && chars[0].is_ascii_digit() && chars[1] == '.' && chars[2].is_ascii_digit()
}

/// Check if bytes represent a PDF.
pub fn is_pdf_bytes(data: &[u8]) -> bool {
    detect_format_from_bytes(data).is_ok()
}
