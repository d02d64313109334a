//! Content stream walking.
//!
//! Interprets the text-positioning and text-showing operators of a decoded
//! page content stream and emits one [`RawFragment`] per shown string.
//! Glyph advances are not computed: consecutive strings shown without
//! repositioning share an origin, and their relative order is the stream
//! order.

use lopdf::content::Operation;
use lopdf::Object;

use crate::model::RawFragment;

/// Decodes shown strings for the fonts of one page.
pub trait TextDecoder {
    /// Base font name for a font resource name (e.g. `F1` -> `Helvetica`).
    fn base_font(&self, resource: &[u8]) -> String;

    /// Decode a shown string using the font's encoding.
    fn decode(&self, resource: &[u8], bytes: &[u8]) -> String;
}

/// Kerning adjustment (thousandths of text space) treated as a word gap in `TJ`.
const TJ_SPACE_THRESHOLD: f64 = 200.0;

/// 2D affine matrix `[a, b, c, d, e, f]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Matrix([f64; 6]);

impl Matrix {
    pub(crate) const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    fn translation(tx: f64, ty: f64) -> Self {
        Matrix([1.0, 0.0, 0.0, 1.0, tx, ty])
    }

    fn scale(s: f64) -> Self {
        Matrix([s, 0.0, 0.0, s, 0.0, 0.0])
    }

    /// `self × other`, i.e. apply `self` first, then `other`.
    fn concat(&self, other: &Matrix) -> Matrix {
        let [a1, b1, c1, d1, e1, f1] = self.0;
        let [a2, b2, c2, d2, e2, f2] = other.0;
        Matrix([
            a1 * a2 + b1 * c2,
            a1 * b2 + b1 * d2,
            c1 * a2 + d1 * c2,
            c1 * b2 + d1 * d2,
            e1 * a2 + f1 * c2 + e2,
            e1 * b2 + f1 * d2 + f2,
        ])
    }

    fn from_operands(operands: &[Object]) -> Option<Matrix> {
        if operands.len() < 6 {
            return None;
        }
        let mut m = [0.0; 6];
        for (slot, operand) in m.iter_mut().zip(operands) {
            *slot = get_number(operand)?;
        }
        Some(Matrix(m))
    }
}

/// Text state tracked while walking a stream.
#[derive(Debug, Clone)]
struct TextState {
    ctm: Matrix,
    text_matrix: Matrix,
    line_matrix: Matrix,
    font_resource: Vec<u8>,
    font_name: String,
    font_size: f64,
    leading: f64,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            text_matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
            font_resource: Vec::new(),
            font_name: String::new(),
            font_size: 12.0,
            leading: 0.0,
        }
    }
}

impl TextState {
    fn move_line(&mut self, tx: f64, ty: f64) {
        self.line_matrix = Matrix::translation(tx, ty).concat(&self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.leading);
    }

    fn fragment(&self, text: String) -> RawFragment {
        let rendering = Matrix::scale(self.font_size)
            .concat(&self.text_matrix)
            .concat(&self.ctm);
        let [_, _, c, d, _, _] = rendering.0;
        RawFragment {
            text: Some(text),
            transform: Some(rendering.0),
            height: Some(c.hypot(d)),
            font_name: Some(self.font_name.clone()),
        }
    }
}

/// Walk decoded operations and collect the shown text runs.
pub fn walk_operations(operations: &[Operation], decoder: &dyn TextDecoder) -> Vec<RawFragment> {
    let mut fragments = Vec::new();
    let mut state = TextState::default();
    let mut saved: Vec<Matrix> = Vec::new();
    let mut in_text_block = false;

    for op in operations {
        let operands = &op.operands;
        match op.operator.as_str() {
            "q" => saved.push(state.ctm),
            "Q" => {
                if let Some(ctm) = saved.pop() {
                    state.ctm = ctm;
                }
            }
            "cm" => {
                if let Some(m) = Matrix::from_operands(operands) {
                    state.ctm = m.concat(&state.ctm);
                }
            }
            "BT" => {
                in_text_block = true;
                state.text_matrix = Matrix::IDENTITY;
                state.line_matrix = Matrix::IDENTITY;
            }
            "ET" => in_text_block = false,
            "Tf" => {
                if let Some(Object::Name(resource)) = operands.first() {
                    state.font_name = decoder.base_font(resource);
                    state.font_resource = resource.clone();
                }
                if let Some(size) = operands.get(1).and_then(get_number) {
                    state.font_size = size;
                }
            }
            "TL" => {
                if let Some(leading) = operands.first().and_then(get_number) {
                    state.leading = leading;
                }
            }
            "Td" | "TD" => {
                let tx = operands.first().and_then(get_number).unwrap_or(0.0);
                let ty = operands.get(1).and_then(get_number).unwrap_or(0.0);
                if op.operator == "TD" {
                    state.leading = -ty;
                }
                state.move_line(tx, ty);
            }
            "Tm" => {
                if let Some(m) = Matrix::from_operands(operands) {
                    state.line_matrix = m;
                    state.text_matrix = m;
                }
            }
            "T*" => state.next_line(),
            "Tj" if in_text_block => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    push_text(&mut fragments, &state, decoder.decode(&state.font_resource, bytes));
                }
            }
            "TJ" if in_text_block => {
                if let Some(Object::Array(items)) = operands.first() {
                    let text = combine_tj(items, &state.font_resource, decoder);
                    push_text(&mut fragments, &state, text);
                }
            }
            "'" | "\"" => {
                state.next_line();
                let text_idx = if op.operator == "\"" { 2 } else { 0 };
                if in_text_block {
                    if let Some(Object::String(bytes, _)) = operands.get(text_idx) {
                        push_text(&mut fragments, &state, decoder.decode(&state.font_resource, bytes));
                    }
                }
            }
            _ => {}
        }
    }

    fragments
}

fn push_text(fragments: &mut Vec<RawFragment>, state: &TextState, text: String) {
    if !text.is_empty() {
        fragments.push(state.fragment(text));
    }
}

/// Join the strings of a `TJ` array, turning large kerning gaps into spaces.
fn combine_tj(items: &[Object], resource: &[u8], decoder: &dyn TextDecoder) -> String {
    let mut combined = String::new();
    for item in items {
        match item {
            Object::String(bytes, _) => combined.push_str(&decoder.decode(resource, bytes)),
            Object::Integer(_) | Object::Real(_) => {
                let adjustment = -get_number(item).unwrap_or(0.0);
                if adjustment > TJ_SPACE_THRESHOLD
                    && !combined.is_empty()
                    && !combined.ends_with(' ')
                    && !combined.ends_with('\u{00A0}')
                {
                    if let Some(c) = combined.chars().last() {
                        if !is_spaceless_script_char(c) {
                            combined.push(' ');
                        }
                    }
                }
            }
            _ => {}
        }
    }
    combined
}

/// Helper to extract a number from a PDF object.
fn get_number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

/// Check if a character is from a script written without word spaces.
///
/// Chinese and Japanese don't use spaces between words; Korean does.
fn is_spaceless_script_char(c: char) -> bool {
    let code = c as u32;

    // CJK Unified Ideographs and Extension A
    (0x4E00..=0x9FFF).contains(&code)
    || (0x3400..=0x4DBF).contains(&code)
    // Extensions B-F
    || (0x20000..=0x2EBEF).contains(&code)
    // Hiragana, Katakana
    || (0x3040..=0x30FF).contains(&code)
    // CJK Symbols and Punctuation
    || (0x3000..=0x303F).contains(&code)
}

/// Simple text decoding fallback when no encoding is available.
pub fn decode_text_simple(bytes: &[u8]) -> String {
    // UTF-16BE with BOM
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&utf16);
    }

    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }

    // Latin-1
    bytes.iter().map(|&b| b as char).collect()
}
