//! Pass-1 font statistics.
//!
//! Body size and heading ranks are computed once over the whole document
//! so that heading levels never depend on which page a heading sits on.

use std::collections::BTreeMap;

use crate::model::{Block, Page};
use crate::options::ConvertOptions;

use super::classifier::is_caps_heading_text;

/// Body size used when a document has no measurable text.
pub const FALLBACK_BODY_SIZE: f32 = 12.0;

/// Document-wide font statistics for heading detection.
#[derive(Debug, Clone, Default)]
pub struct FontStatistics {
    /// Body text font size (most common line size)
    pub body_size: f32,
    /// Distinct heading sizes, largest first, in 0.5pt buckets
    pub heading_sizes: Vec<f32>,
    /// Line counts per font size at 0.1pt precision
    size_histogram: BTreeMap<i32, usize>,
}

impl FontStatistics {
    /// Scan every page and compute body size and heading ranks.
    pub fn collect(pages: &[Page], options: &ConvertOptions) -> Self {
        let mut stats = FontStatistics::default();

        for block in text_blocks(pages) {
            let caps_candidate = options.caps_to_headings
                && is_caps_heading_text(&block.text(), options.caps_heading_max_words);
            if caps_candidate {
                continue;
            }
            for line in block.lines.iter().filter(|l| !l.is_empty()) {
                stats.add_size(line.dominant_font_size());
            }
        }
        stats.analyze();

        let threshold = stats.body_size * options.heading_size_ratio;
        let mut buckets: Vec<i32> = text_blocks(pages)
            .map(|b| b.dominant_font_size())
            .filter(|size| *size >= threshold)
            .map(heading_bucket)
            .collect();
        buckets.sort_unstable_by(|a, b| b.cmp(a));
        buckets.dedup();
        stats.heading_sizes = buckets.into_iter().map(|b| b as f32 / 2.0).collect();

        log::debug!(
            "FontStatistics: body_size={:.1}, heading_sizes={:?}",
            stats.body_size,
            stats.heading_sizes
        );
        stats
    }

    /// Add a line's font size observation.
    pub fn add_size(&mut self, size: f32) {
        if size.is_finite() && size > 0.0 {
            let key = (size * 10.0).round() as i32;
            *self.size_histogram.entry(key).or_insert(0) += 1;
        }
    }

    /// Compute body size as the mode of the histogram.
    ///
    /// Ties go to the smaller size.
    pub fn analyze(&mut self) {
        let mut best: Option<(i32, usize)> = None;
        for (&key, &count) in &self.size_histogram {
            if best.map_or(true, |(_, c)| count > c) {
                best = Some((key, count));
            }
        }
        self.body_size = best
            .map(|(key, _)| key as f32 / 10.0)
            .unwrap_or(FALLBACK_BODY_SIZE);
    }

    /// Heading level (1-6) for a size that passed the size test.
    pub fn heading_level(&self, size: f32) -> u8 {
        let bucket = heading_bucket(size) as f32 / 2.0;
        self.heading_sizes
            .iter()
            .position(|s| (*s - bucket).abs() < f32::EPSILON)
            .map(|rank| (rank + 1).min(6) as u8)
            .unwrap_or(6)
    }

    /// Level for ALL-CAPS headings, one below the smallest size heading.
    pub fn caps_heading_level(&self) -> u8 {
        (self.heading_sizes.len() + 1).min(6) as u8
    }
}

/// Text-bearing blocks of every page.
fn text_blocks(pages: &[Page]) -> impl Iterator<Item = &Block> {
    pages
        .iter()
        .flat_map(|p| p.blocks.iter())
        .filter(|b| !b.is_image() && !b.is_empty())
}

/// 0.5pt bucket used for heading ranks.
fn heading_bucket(size: f32) -> i32 {
    (size * 2.0).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoundingBox, Line, Span};

    fn block(text: &str, size: f32) -> Block {
        Block::new(vec![Line::new(vec![Span::new(
            text,
            "Times",
            size,
            BoundingBox::new(72.0, 100.0, 300.0, 100.0 + size),
        )])])
    }

    fn page(blocks: Vec<Block>) -> Page {
        let mut page = Page::letter(1);
        page.blocks = blocks;
        page
    }

    #[test]
    fn test_body_size_is_mode() {
        let mut stats = FontStatistics::default();
        for _ in 0..100 {
            stats.add_size(12.0);
        }
        for _ in 0..5 {
            stats.add_size(18.0);
        }
        stats.analyze();
        assert!((stats.body_size - 12.0).abs() < 0.01);
    }

    #[test]
    fn test_body_size_tie_prefers_smaller() {
        let mut stats = FontStatistics::default();
        stats.add_size(10.0);
        stats.add_size(14.0);
        stats.analyze();
        assert!((stats.body_size - 10.0).abs() < 0.01);
    }

    #[test]
    fn test_empty_document_fallback() {
        let stats = FontStatistics::collect(&[], &ConvertOptions::default());
        assert!((stats.body_size - FALLBACK_BODY_SIZE).abs() < 0.01);
        assert!(stats.heading_sizes.is_empty());
    }

    #[test]
    fn test_heading_ranks_document_wide() {
        let pages = vec![
            page(vec![
                block("Title", 24.0),
                block("body text one", 11.0),
                block("body text two", 11.0),
            ]),
            page(vec![
                block("Section", 16.0),
                block("more body text", 11.0),
                block("Other Section", 16.2),
            ]),
        ];
        let stats = FontStatistics::collect(&pages, &ConvertOptions::default());
        assert!((stats.body_size - 11.0).abs() < 0.01);
        assert_eq!(stats.heading_sizes, vec![24.0, 16.0]);
        assert_eq!(stats.heading_level(24.0), 1);
        assert_eq!(stats.heading_level(16.2), 2);
        assert_eq!(stats.caps_heading_level(), 3);
    }

    #[test]
    fn test_caps_lines_excluded_from_body() {
        let pages = vec![page(vec![
            block("INTRODUCTION", 14.0),
            block("CHAPTER ONE", 14.0),
            block("CHAPTER TWO", 14.0),
            block("plain body", 10.0),
        ])];
        let stats = FontStatistics::collect(&pages, &ConvertOptions::default());
        assert!((stats.body_size - 10.0).abs() < 0.01);
    }

    #[test]
    fn test_rank_beyond_six_collapses() {
        let mut stats = FontStatistics::default();
        stats.heading_sizes = vec![40.0, 36.0, 32.0, 28.0, 24.0, 20.0, 16.0];
        assert_eq!(stats.heading_level(16.0), 6);
        assert_eq!(stats.heading_level(40.0), 1);
    }
}
