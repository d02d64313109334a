//! Reading-order reconstruction.
//!
//! Turns the unordered fragments of one page into a text blob that reads
//! top to bottom, left to right. This is a local geometric rule, not a layout
//! analysis: columns and tables are not detected.

use std::cmp::Ordering;

use crate::model::Fragment;

use super::options::{TranscribeOptions, DEFAULT_LINE_BREAK_FACTOR, DEFAULT_LINE_TOLERANCE};

/// Pairwise reading-order comparison with a same-line tolerance.
///
/// Fragments whose baselines differ by less than `tolerance` compare by X
/// (left first); otherwise the higher baseline comes first.
///
/// This relation is not transitive across chains of nearly aligned
/// fragments, so it is not used as a sort comparator directly; see
/// [`ReadingOrder::sort_fragments`].
pub fn compare(a: &Fragment, b: &Fragment, tolerance: f64) -> Ordering {
    let dy = b.y - a.y;
    if dy.abs() < tolerance {
        a.x.total_cmp(&b.x)
    } else {
        dy.total_cmp(&0.0)
    }
}

/// Reading-order reconstructor for a single page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadingOrder {
    /// Same-line vertical tolerance (ε_y)
    pub line_tolerance: f64,
    /// Multiplier of a fragment's height for the line-break rule
    pub line_break_factor: f64,
}

impl ReadingOrder {
    /// Create a reconstructor with explicit parameters.
    pub fn new(line_tolerance: f64, line_break_factor: f64) -> Self {
        Self {
            line_tolerance,
            line_break_factor,
        }
    }

    /// Create a reconstructor from transcription options.
    pub fn from_options(options: &TranscribeOptions) -> Self {
        Self::new(options.line_tolerance, options.line_break_factor)
    }

    /// Sort fragments into reading order.
    ///
    /// Fragments are first ordered by baseline, top first. Consecutive
    /// fragments closer than the tolerance are chained into one band, and
    /// each band is ordered left to right. Any two fragments within the
    /// tolerance of each other always end up in the same band, so they are
    /// ordered by X regardless of input order; the result is a total order
    /// that the standard sort can rely on.
    pub fn sort_fragments<'a>(&self, fragments: &'a [Fragment]) -> Vec<&'a Fragment> {
        let mut by_y: Vec<&Fragment> = fragments.iter().collect();
        by_y.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));

        let mut ordered = Vec::with_capacity(by_y.len());
        let mut band: Vec<&Fragment> = Vec::new();
        let mut prev_y: Option<f64> = None;

        for fragment in by_y {
            if let Some(y) = prev_y {
                if (y - fragment.y).abs() >= self.line_tolerance {
                    flush_band(&mut band, &mut ordered);
                }
            }
            prev_y = Some(fragment.y);
            band.push(fragment);
        }
        flush_band(&mut band, &mut ordered);

        ordered
    }

    /// Reconstruct the text of one page.
    ///
    /// A line break is emitted whenever the vertical gap to the previous
    /// fragment exceeds the current fragment's own height; otherwise texts
    /// are concatenated with no separator. The result is trimmed. An empty
    /// input yields an empty string, which callers treat as "no embedded
    /// text".
    pub fn reconstruct_page(&self, fragments: &[Fragment]) -> String {
        let sorted = self.sort_fragments(fragments);
        let Some(first) = sorted.first() else {
            return String::new();
        };

        let mut text = String::new();
        let mut last_y = first.y;
        for fragment in sorted {
            if (fragment.y - last_y).abs() > fragment.height * self.line_break_factor {
                text.push('\n');
            }
            text.push_str(&fragment.text);
            last_y = fragment.y;
        }

        text.trim().to_string()
    }
}

impl Default for ReadingOrder {
    fn default() -> Self {
        Self::new(DEFAULT_LINE_TOLERANCE, DEFAULT_LINE_BREAK_FACTOR)
    }
}

/// Move a band into the output, ordered left to right.
fn flush_band<'a>(band: &mut Vec<&'a Fragment>, out: &mut Vec<&'a Fragment>) {
    band.sort_by(|a, b| a.x.total_cmp(&b.x));
    out.append(band);
}
