//! Page and block types.

use super::{BoundingBox, Line};
use serde::{Deserialize, Serialize};

/// Structural label attached to a block by the classifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    /// Running prose
    Paragraph,
    /// Section heading (see `Block::level`)
    Heading,
    /// Bulleted, numbered or lettered item
    ListItem,
    /// Short isolated fragment, merge candidate
    Orphan,
    /// Looks tabular; the table engine decides
    TableCandidate,
    /// Math-only lines
    EquationCandidate,
    /// Repeating page furniture
    HeaderFooter,
    /// Image placeholder from the extraction adapter
    Image,
    /// Not yet classified
    #[default]
    Unknown,
}

/// A geometrically grouped run of lines. The unit of classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Bounding box on the page
    pub bbox: BoundingBox,
    /// Lines, top to bottom
    #[serde(default)]
    pub lines: Vec<Line>,
    /// Classification label
    #[serde(default)]
    pub kind: BlockKind,
    /// Heading level (1-6) when `kind` is `Heading`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
    /// Asset path for image blocks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Block {
    /// Create an unclassified block; the bounding box encloses the lines.
    pub fn new(lines: Vec<Line>) -> Self {
        let boxes: Vec<BoundingBox> = lines
            .iter()
            .filter(|l| !l.spans.is_empty())
            .map(|l| l.bbox())
            .collect();
        let bbox = BoundingBox::enclosing(&boxes).unwrap_or_default();
        Self {
            bbox,
            lines,
            kind: BlockKind::Unknown,
            level: None,
            image: None,
        }
    }

    /// Create an image block pointing at an asset path.
    pub fn image(path: impl Into<String>, bbox: BoundingBox) -> Self {
        Self {
            bbox,
            lines: Vec::new(),
            kind: BlockKind::Image,
            level: None,
            image: Some(path.into()),
        }
    }

    /// Return a copy with a different kind.
    pub fn with_kind(mut self, kind: BlockKind) -> Self {
        self.kind = kind;
        if kind != BlockKind::Heading {
            self.level = None;
        }
        self
    }

    /// Return a copy labelled as a heading of the given level.
    pub fn with_heading_level(mut self, level: u8) -> Self {
        self.kind = BlockKind::Heading;
        self.level = Some(level.clamp(1, 6));
        self
    }

    /// Return a block holding a subset of this block's lines with the same labels.
    pub fn with_lines(&self, lines: Vec<Line>) -> Self {
        let mut block = Block::new(lines);
        block.kind = self.kind;
        block.level = self.level;
        block
    }

    /// Whether this block references an image.
    pub fn is_image(&self) -> bool {
        self.image.is_some() || self.kind == BlockKind::Image
    }

    /// Lines joined with newlines.
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.text())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Whether the block has no visible text and no image.
    pub fn is_empty(&self) -> bool {
        !self.is_image() && self.lines.iter().all(|l| l.is_empty())
    }

    /// Character-weighted dominant font size of all lines.
    pub fn dominant_font_size(&self) -> f32 {
        let spans: Vec<_> = self
            .lines
            .iter()
            .enumerate()
            .flat_map(|(i, l)| {
                let skip = usize::from(i == 0 && l.has_drop_cap());
                l.spans.iter().skip(skip).cloned()
            })
            .collect();
        super::text::dominant_size(&spans)
    }

    /// Total number of non-whitespace characters.
    pub fn char_count(&self) -> usize {
        self.lines.iter().map(|l| l.char_count()).sum()
    }
}

/// A single page of the raw document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Page number (1-indexed)
    pub number: u32,

    /// Page width in points
    #[serde(default)]
    pub width: f32,

    /// Page height in points
    #[serde(default)]
    pub height: f32,

    /// Blocks as delivered by the extraction adapter
    #[serde(default)]
    pub blocks: Vec<Block>,

    /// Set when extraction failed upstream for this page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_error: Option<String>,
}

impl Page {
    /// Create a new empty page with the given dimensions.
    pub fn new(number: u32, width: f32, height: f32) -> Self {
        Self {
            number,
            width,
            height,
            blocks: Vec::new(),
            extraction_error: None,
        }
    }

    /// Create a new page with standard Letter size.
    pub fn letter(number: u32) -> Self {
        Self::new(number, 612.0, 792.0)
    }

    /// Create a page recording an upstream extraction failure.
    pub fn failed(number: u32, reason: impl Into<String>) -> Self {
        Self {
            extraction_error: Some(reason.into()),
            ..Self::letter(number)
        }
    }

    /// Add a block to the page.
    pub fn add_block(&mut self, block: Block) {
        self.blocks.push(block);
    }

    /// Builder form of `add_block`.
    pub fn with_block(mut self, block: Block) -> Self {
        self.blocks.push(block);
        self
    }

    /// Check that the page can be structured.
    ///
    /// Returns the reason the page is unusable, if any.
    pub fn defect(&self) -> Option<String> {
        if let Some(ref reason) = self.extraction_error {
            return Some(format!("extraction failed: {}", reason));
        }
        if self.blocks.iter().all(|b| b.is_empty()) {
            return Some("no extractable content".to_string());
        }
        let malformed = self.blocks.iter().any(|b| {
            !b.bbox.is_finite()
                || b
                    .lines
                    .iter()
                    .flat_map(|l| &l.spans)
                    .any(|s| !s.is_well_formed())
        });
        if malformed {
            return Some("malformed block geometry".to_string());
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Span;

    fn line(text: &str, y: f32) -> Line {
        Line::new(vec![Span::new(
            text,
            "Helvetica",
            11.0,
            BoundingBox::new(72.0, y, 72.0 + text.len() as f32 * 5.5, y + 11.0),
        )])
    }

    #[test]
    fn test_block_bbox_encloses_lines() {
        let block = Block::new(vec![line("first", 100.0), line("second line", 114.0)]);
        assert_eq!(block.bbox.y0, 100.0);
        assert_eq!(block.bbox.y1, 125.0);
        assert_eq!(block.text(), "first\nsecond line");
    }

    #[test]
    fn test_with_kind_clears_level() {
        let block = Block::new(vec![line("Title", 10.0)]).with_heading_level(9);
        assert_eq!(block.level, Some(6));
        let block = block.with_kind(BlockKind::Paragraph);
        assert_eq!(block.level, None);
    }

    #[test]
    fn test_page_defects() {
        assert!(Page::failed(2, "ocr timeout").defect().is_some());
        assert!(Page::letter(1).defect().is_some());

        let page = Page::letter(1).with_block(Block::new(vec![line("Hello", 100.0)]));
        assert!(page.defect().is_none());

        let mut bad = line("Hello", 100.0);
        bad.spans[0].font_size = f32::NAN;
        let page = Page::letter(1).with_block(Block::new(vec![bad]));
        assert_eq!(page.defect().as_deref(), Some("malformed block geometry"));
    }

    #[test]
    fn test_image_block_is_not_empty() {
        let block = Block::image("fig1.png", BoundingBox::new(0.0, 0.0, 10.0, 10.0));
        assert!(block.is_image());
        assert!(!block.is_empty());
    }
}
