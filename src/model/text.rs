//! Span and line types produced by the extraction adapter.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Minimum size ratio between a leading glyph and the next span for the glyph
/// to count as a drop cap.
pub const DROP_CAP_RATIO: f32 = 1.6;

/// An axis-aligned rectangle in page coordinates (origin top-left, y grows down).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge
    pub x0: f32,
    /// Top edge
    pub y0: f32,
    /// Right edge
    pub x1: f32,
    /// Bottom edge
    pub y1: f32,
}

impl BoundingBox {
    /// Create a bounding box from its edges.
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Width of the box.
    pub fn width(&self) -> f32 {
        (self.x1 - self.x0).max(0.0)
    }

    /// Height of the box.
    pub fn height(&self) -> f32 {
        (self.y1 - self.y0).max(0.0)
    }

    /// Horizontal centre.
    pub fn center_x(&self) -> f32 {
        (self.x0 + self.x1) / 2.0
    }

    /// Vertical centre.
    pub fn center_y(&self) -> f32 {
        (self.y0 + self.y1) / 2.0
    }

    /// Smallest box containing both boxes.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Whether every coordinate is a finite number.
    pub fn is_finite(&self) -> bool {
        self.x0.is_finite() && self.y0.is_finite() && self.x1.is_finite() && self.y1.is_finite()
    }

    /// Union of a sequence of boxes, or `None` if the sequence is empty.
    pub fn enclosing<'a>(boxes: impl IntoIterator<Item = &'a BoundingBox>) -> Option<BoundingBox> {
        boxes.into_iter().fold(None, |acc, b| match acc {
            None => Some(*b),
            Some(a) => Some(a.union(b)),
        })
    }
}

/// A text run with font and position information.
///
/// When deserialized without explicit `bold`/`italic` flags, the style is
/// inferred from the font name as in [`Span::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SpanRecord")]
pub struct Span {
    /// Resolved Unicode text
    pub text: String,
    /// Font name (e.g., "Helvetica-Bold")
    #[serde(default)]
    pub font_name: String,
    /// Font size in points
    pub font_size: f32,
    /// Whether the font is bold
    #[serde(default)]
    pub bold: bool,
    /// Whether the font is italic
    #[serde(default)]
    pub italic: bool,
    /// Position on the page
    pub bbox: BoundingBox,
}

impl Span {
    /// Create a span, inferring bold/italic from the font name.
    pub fn new(
        text: impl Into<String>,
        font_name: impl Into<String>,
        font_size: f32,
        bbox: BoundingBox,
    ) -> Self {
        let font_name = font_name.into();
        let (bold, italic) = font_style(&font_name);

        Self {
            text: text.into(),
            font_name,
            font_size,
            bold,
            italic,
            bbox,
        }
    }

    /// Number of characters in the span.
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    /// Whether the span's geometry and font size are usable.
    pub fn is_well_formed(&self) -> bool {
        self.bbox.is_finite() && self.font_size.is_finite() && self.font_size > 0.0
    }
}

/// Span as written by an extraction adapter; style flags are optional.
#[derive(Deserialize)]
struct SpanRecord {
    text: String,
    #[serde(default)]
    font_name: String,
    font_size: f32,
    #[serde(default)]
    bold: Option<bool>,
    #[serde(default)]
    italic: Option<bool>,
    bbox: BoundingBox,
}

impl From<SpanRecord> for Span {
    fn from(record: SpanRecord) -> Self {
        let (bold, italic) = font_style(&record.font_name);
        Self {
            text: record.text,
            font_name: record.font_name,
            font_size: record.font_size,
            bold: record.bold.unwrap_or(bold),
            italic: record.italic.unwrap_or(italic),
            bbox: record.bbox,
        }
    }
}

/// Bold and italic flags implied by a font name such as "Helvetica-BoldOblique".
fn font_style(font_name: &str) -> (bool, bool) {
    let lower = font_name.to_lowercase();
    let bold = lower.contains("bold") || lower.contains("black") || lower.contains("heavy");
    let italic = lower.contains("italic") || lower.contains("oblique");
    (bold, italic)
}

/// A sequence of spans sharing a vertical band.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Line {
    /// Spans ordered left to right
    pub spans: Vec<Span>,
}

impl Line {
    /// Create a line from spans, ordering them by their left edge.
    pub fn new(mut spans: Vec<Span>) -> Self {
        spans.sort_by(|a, b| {
            a.bbox
                .x0
                .partial_cmp(&b.bbox.x0)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Self { spans }
    }

    /// Whether the line has no visible text.
    pub fn is_empty(&self) -> bool {
        self.spans.iter().all(|s| s.text.trim().is_empty())
    }

    /// Bounding box of all spans.
    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::enclosing(self.spans.iter().map(|s| &s.bbox)).unwrap_or_default()
    }

    /// Left edge of the line.
    pub fn x0(&self) -> f32 {
        self.bbox().x0
    }

    /// Whether the first span is a single oversized letter (a drop cap).
    pub fn has_drop_cap(&self) -> bool {
        if self.spans.len() < 2 {
            return false;
        }
        let first = &self.spans[0];
        let next = &self.spans[1];
        let mut chars = first.text.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => {
                c.is_alphabetic() && first.font_size >= next.font_size * DROP_CAP_RATIO
            }
            _ => false,
        }
    }

    /// Spans that carry the line's typography (a drop cap is excluded).
    fn body_spans(&self) -> &[Span] {
        if self.has_drop_cap() {
            &self.spans[1..]
        } else {
            &self.spans
        }
    }

    /// Most common font size, weighted by character count.
    pub fn dominant_font_size(&self) -> f32 {
        dominant_size(self.body_spans())
    }

    /// Number of non-whitespace characters.
    pub fn char_count(&self) -> usize {
        self.spans
            .iter()
            .map(|s| s.text.chars().filter(|c| !c.is_whitespace()).count())
            .sum()
    }

    /// Whether most characters are set in a bold font.
    pub fn is_bold(&self) -> bool {
        let total = self.char_count();
        if total == 0 {
            return false;
        }
        let bold: usize = self
            .spans
            .iter()
            .filter(|s| s.bold)
            .map(|s| s.text.chars().filter(|c| !c.is_whitespace()).count())
            .sum();
        bold * 2 > total
    }

    /// Concatenated text with spaces inserted at horizontal gaps.
    ///
    /// A drop cap is joined to the following span without a space.
    /// No space is inserted between adjacent CJK characters.
    pub fn text(&self) -> String {
        if self.spans.is_empty() {
            return String::new();
        }
        if self.spans.len() == 1 {
            return self.spans[0].text.clone();
        }

        let drop_cap = self.has_drop_cap();
        let mut result = String::new();

        for (i, span) in self.spans.iter().enumerate() {
            if i == 0 {
                if drop_cap {
                    result.push_str(span.text.trim());
                } else {
                    result.push_str(&span.text);
                }
                continue;
            }
            if i == 1 && drop_cap {
                result.push_str(span.text.trim_start());
                continue;
            }

            let prev = &self.spans[i - 1];
            let gap = span.bbox.x0 - prev.bbox.x1;
            let char_count = span.char_count();
            let avg_char_width = if char_count > 0 && span.bbox.width() > 0.0 {
                span.bbox.width() / char_count as f32
            } else {
                span.font_size * 0.5
            };

            let prev_ends_with_space = prev.text.ends_with(' ') || prev.text.ends_with('\u{00A0}');
            let curr_starts_with_space =
                span.text.starts_with(' ') || span.text.starts_with('\u{00A0}');

            let spaceless = prev
                .text
                .chars()
                .last()
                .map(is_spaceless_script_char)
                .unwrap_or(false)
                && span
                    .text
                    .chars()
                    .next()
                    .map(is_spaceless_script_char)
                    .unwrap_or(false);

            if gap > avg_char_width * 0.2
                && !spaceless
                && !prev_ends_with_space
                && !curr_starts_with_space
            {
                result.push(' ');
            }
            result.push_str(&span.text);
        }

        result
    }
}

/// Character-weighted most common font size of a run of spans.
///
/// Sizes are compared at 0.1pt precision; ties go to the larger size.
pub fn dominant_size(spans: &[Span]) -> f32 {
    let mut histogram: BTreeMap<i32, usize> = BTreeMap::new();
    for span in spans {
        let weight = span.text.chars().filter(|c| !c.is_whitespace()).count();
        if weight == 0 {
            continue;
        }
        *histogram.entry(size_key(span.font_size)).or_insert(0) += weight;
    }
    histogram
        .iter()
        .max_by_key(|(_, count)| **count)
        .map(|(key, _)| *key as f32 / 10.0)
        .or_else(|| spans.first().map(|s| s.font_size))
        .unwrap_or(0.0)
}

/// Histogram key for a font size at 0.1pt precision.
pub(crate) fn size_key(size: f32) -> i32 {
    (size * 10.0).round() as i32
}

/// Scripts written without inter-word spaces.
fn is_spaceless_script_char(c: char) -> bool {
    matches!(c,
        '\u{3040}'..='\u{309F}'   // Hiragana
        | '\u{30A0}'..='\u{30FF}' // Katakana
        | '\u{4E00}'..='\u{9FFF}' // CJK Unified Ideographs
        | '\u{3400}'..='\u{4DBF}' // CJK Extension A
        | '\u{AC00}'..='\u{D7AF}' // Hangul Syllables
        | '\u{0E00}'..='\u{0E7F}' // Thai
    )
}
