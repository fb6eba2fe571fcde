//! Repeating header/footer removal.
//!
//! Only the first and last text block of each page are considered. Their
//! text is normalized so that page numbers and dates compare equal, then
//! grouped by position band. Groups that cover enough pages are removed.

use std::collections::{HashMap, HashSet};

use crate::model::{Block, Page};

/// Fewer pages than this and repetition is not meaningful.
pub const MIN_PAGES: usize = 3;

/// Position band of a candidate block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Band {
    /// First block on the page
    Top,
    /// Last block on the page
    Bottom,
}

/// Detects and strips repeating page furniture.
#[derive(Debug, Clone)]
pub struct HeaderFooterDetector {
    min_repeat_fraction: f32,
}

impl HeaderFooterDetector {
    /// Create a detector with the given page coverage threshold.
    pub fn new(min_repeat_fraction: f32) -> Self {
        Self {
            min_repeat_fraction,
        }
    }

    /// Return the pages with repeating first/last blocks removed.
    pub fn detect_and_strip(&self, pages: &[Page]) -> Vec<Page> {
        let repeated = self.find_repeats(pages);
        if repeated.is_empty() {
            return pages.to_vec();
        }

        pages
            .iter()
            .map(|page| {
                let (first, last) = edge_indices(page);
                let mut stripped = page.clone();
                stripped.blocks = page
                    .blocks
                    .iter()
                    .enumerate()
                    .filter(|(i, block)| {
                        let band = if Some(*i) == first {
                            Band::Top
                        } else if Some(*i) == last {
                            Band::Bottom
                        } else {
                            return true;
                        };
                        let drop = repeated.contains(&(band, normalize(&block.text())));
                        if drop {
                            log::debug!(
                                "HeaderFooter: removing {:?} block on page {}: {:?}",
                                band,
                                page.number,
                                block.text()
                            );
                        }
                        !drop
                    })
                    .map(|(_, b)| b.clone())
                    .collect();
                stripped
            })
            .collect()
    }

    /// (band, normalized text) keys that repeat on enough pages.
    pub fn find_repeats(&self, pages: &[Page]) -> HashSet<(Band, String)> {
        let total = pages.len();
        if total < MIN_PAGES {
            return HashSet::new();
        }

        let mut coverage: HashMap<(Band, String), HashSet<u32>> = HashMap::new();
        for page in pages {
            let (first, last) = edge_indices(page);
            let candidates = [(Band::Top, first), (Band::Bottom, last)];
            for (band, index) in candidates {
                let Some(block) = index.map(|i| &page.blocks[i]) else {
                    continue;
                };
                let key = normalize(&block.text());
                if key.is_empty() {
                    continue;
                }
                coverage
                    .entry((band, key))
                    .or_default()
                    .insert(page.number);
            }
        }

        let required = (self.min_repeat_fraction * total as f32)
            .ceil()
            .max(MIN_PAGES as f32) as usize;
        coverage
            .into_iter()
            .filter(|(_, pages)| pages.len() >= required)
            .map(|(key, _)| key)
            .collect()
    }
}

impl Default for HeaderFooterDetector {
    fn default() -> Self {
        Self::new(0.6)
    }
}

/// Indices of the first and last text blocks. The same block is only
/// reported as first when a page has one text block.
fn edge_indices(page: &Page) -> (Option<usize>, Option<usize>) {
    let text_blocks: Vec<usize> = page
        .blocks
        .iter()
        .enumerate()
        .filter(|(_, b)| is_text(b))
        .map(|(i, _)| i)
        .collect();
    let first = text_blocks.first().copied();
    let last = text_blocks.last().copied().filter(|l| Some(*l) != first);
    (first, last)
}

fn is_text(block: &Block) -> bool {
    !block.is_image() && !block.is_empty()
}

/// Lowercase, collapse whitespace and replace digit runs with `#`.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_digits = false;
    for word in text.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        for c in word.chars() {
            if c.is_ascii_digit() {
                if !in_digits {
                    out.push('#');
                }
                in_digits = true;
            } else {
                in_digits = false;
                out.extend(c.to_lowercase());
            }
        }
        in_digits = false;
    }
    out
}
