//! Structural classifier.
//!
//! Labels each block with a [`BlockKind`]. Tests run in a fixed priority
//! order and the first match wins:
//! size heading → equation candidate → table candidate → list item →
//! caps heading → orphan → paragraph.

use std::sync::OnceLock;

use regex::Regex;

use crate::model::{Block, BlockKind, ListMarker};
use crate::options::ConvertOptions;

use super::equation::EquationEngine;
use super::stats::FontStatistics;
use super::table_detector::TableEngine;

/// Minimum share of uppercase letters for a caps heading.
const CAPS_RATIO: f32 = 0.8;

/// Classify a block against a body font size.
///
/// Heading levels are not assigned here; see [`Classifier`].
pub fn classify(block: &Block, body_font_size: f32, options: &ConvertOptions) -> BlockKind {
    let tables = TableEngine::new(options.table.clone());
    let equations = EquationEngine::new(options.equation.clone());
    classify_with(block, body_font_size, options, &tables, &equations)
}

fn classify_with(
    block: &Block,
    body_font_size: f32,
    options: &ConvertOptions,
    tables: &TableEngine,
    equations: &EquationEngine,
) -> BlockKind {
    if block.is_image() {
        return BlockKind::Image;
    }
    if block.kind == BlockKind::HeaderFooter {
        return BlockKind::HeaderFooter;
    }
    if block.is_empty() {
        return BlockKind::Unknown;
    }

    if block.dominant_font_size() >= body_font_size * options.heading_size_ratio {
        return BlockKind::Heading;
    }

    let lines: Vec<String> = block
        .lines
        .iter()
        .filter(|l| !l.is_empty())
        .map(|l| l.text())
        .collect();

    if lines.iter().all(|l| equations.is_math_line(l)) {
        return BlockKind::EquationCandidate;
    }

    if tables.looks_tabular(block) {
        return BlockKind::TableCandidate;
    }

    if lines.first().is_some_and(|l| parse_list_marker(l).is_some()) {
        return BlockKind::ListItem;
    }

    let text = lines.join(" ");
    if options.caps_to_headings && is_caps_heading_text(&text, options.caps_heading_max_words) {
        return BlockKind::Heading;
    }

    if lines.len() <= options.orphan_max_lines && text.trim().chars().count() <= options.orphan_max_len
    {
        return BlockKind::Orphan;
    }

    BlockKind::Paragraph
}

/// Classifier bound to document-wide font statistics.
#[derive(Debug, Clone)]
pub struct Classifier {
    stats: FontStatistics,
    options: ConvertOptions,
    tables: TableEngine,
    equations: EquationEngine,
}

impl Classifier {
    /// Create a classifier from pass-1 statistics.
    pub fn new(stats: FontStatistics, options: &ConvertOptions) -> Self {
        Self {
            stats,
            options: options.clone(),
            tables: TableEngine::new(options.table.clone()),
            equations: EquationEngine::new(options.equation.clone()),
        }
    }

    /// Statistics this classifier ranks headings with.
    pub fn stats(&self) -> &FontStatistics {
        &self.stats
    }

    /// Label a block and assign a heading level where it applies.
    pub fn classify_block(&self, block: Block) -> Block {
        let kind = classify_with(
            &block,
            self.stats.body_size,
            &self.options,
            &self.tables,
            &self.equations,
        );
        if kind != BlockKind::Heading {
            return block.with_kind(kind);
        }

        let size = block.dominant_font_size();
        let level = if size >= self.stats.body_size * self.options.heading_size_ratio {
            self.stats.heading_level(size)
        } else {
            self.stats.caps_heading_level()
        };
        log::debug!("Classifier: heading level {} ({:.1}pt): {:?}", level, size, block.text());
        block.with_heading_level(level)
    }

    /// Label every block of a page.
    pub fn classify_page(&self, blocks: Vec<Block>) -> Vec<Block> {
        blocks
            .into_iter()
            .filter(|b| !b.is_empty())
            .map(|b| self.classify_block(b))
            .collect()
    }
}

/// Whether text reads as an ALL-CAPS or mostly-caps heading.
pub fn is_caps_heading_text(text: &str, max_words: usize) -> bool {
    let letters: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
    let cased: Vec<&char> = letters
        .iter()
        .filter(|c| c.is_uppercase() || c.is_lowercase())
        .collect();
    if cased.len() < 2 {
        return false;
    }
    let upper = cased.iter().filter(|c| c.is_uppercase()).count();
    if (upper as f32) / (cased.len() as f32) < CAPS_RATIO {
        return false;
    }
    let words = text.split_whitespace().count();
    words > 0 && words <= max_words
}

/// Recognize a list marker at the start of a line.
///
/// Returns the marker and the item text after it.
pub fn parse_list_marker(text: &str) -> Option<(ListMarker, &str)> {
    if let Some(caps) = bullet_regex().captures(text) {
        let body = caps.get(1)?;
        return Some((ListMarker::Bullet, body.as_str()));
    }
    if let Some(caps) = numbered_regex().captures(text) {
        let number = caps.get(1)?.as_str().parse().ok()?;
        let body = caps.get(2)?;
        return Some((ListMarker::Numbered { number }, body.as_str()));
    }
    if let Some(caps) = lettered_regex().captures(text) {
        let letter = caps.get(1)?.as_str().chars().next()?;
        let body = caps.get(2)?;
        return Some((ListMarker::Lettered { letter }, body.as_str()));
    }
    None
}

fn bullet_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?:[•◦·○▪●]\s*|[-–—]\s+)(\S.*)$").expect("bullet pattern is valid")
    })
}

fn numbered_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(\d{1,3})[.)]\s+(\S.*)$").expect("numbered pattern is valid"))
}

fn lettered_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*([a-z])[.)]\s+(\S.*)$").expect("lettered pattern is valid"))
}
