//! Column-aware reading order.
//!
//! Blocks are delivered in whatever order the extraction adapter found them.
//! This module finds a column gutter by scanning vertical slices of the page
//! for a run of empty slices, then orders blocks left column first, right
//! column second, with full-width blocks acting as section separators.

use std::cmp::Ordering;

use crate::model::Block;

/// Width of a vertical slice when looking for a gutter (points).
const SLICE_WIDTH: f32 = 3.0;

/// Narrowest gap that counts as a gutter (points).
const MIN_GUTTER_WIDTH: f32 = 10.0;

/// Pages narrower than this are treated as single column.
const MIN_MULTI_COLUMN_EXTENT: f32 = 250.0;

/// Blocks wider than this share of the text extent span both columns.
const SPANNING_WIDTH_RATIO: f32 = 0.6;

/// A detected gutter between two columns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gutter {
    /// Left edge of the gap
    pub left: f32,
    /// Right edge of the gap
    pub right: f32,
}

impl Gutter {
    /// Centre of the gap.
    pub fn center(&self) -> f32 {
        (self.left + self.right) / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
    Spanning,
}

/// Return the blocks in reading order.
pub fn reading_order(blocks: &[Block]) -> Vec<Block> {
    let mut ordered: Vec<Block> = blocks.to_vec();
    ordered.sort_by(by_position);

    let Some(gutter) = detect_gutter(blocks) else {
        return ordered;
    };

    let center = gutter.center();
    let side_of = |b: &Block| {
        if b.bbox.x1 <= center {
            Side::Left
        } else if b.bbox.x0 >= center {
            Side::Right
        } else {
            Side::Spanning
        }
    };

    let has_left = ordered.iter().any(|b| side_of(b) == Side::Left);
    let has_right = ordered.iter().any(|b| side_of(b) == Side::Right);
    if !has_left || !has_right {
        return ordered;
    }

    log::debug!(
        "Layout: two columns split at x={:.1} (gap {:.1}..{:.1})",
        center,
        gutter.left,
        gutter.right
    );

    let mut result = Vec::with_capacity(ordered.len());
    let mut left = Vec::new();
    let mut right = Vec::new();

    for block in ordered {
        match side_of(&block) {
            Side::Left => left.push(block),
            Side::Right => right.push(block),
            Side::Spanning => {
                result.append(&mut left);
                result.append(&mut right);
                result.push(block);
            }
        }
    }
    result.append(&mut left);
    result.append(&mut right);
    result
}

/// Find the widest empty vertical band in the middle of the page.
///
/// Full-width blocks are ignored while scanning so that a title spanning
/// both columns does not hide the gutter.
pub fn detect_gutter(blocks: &[Block]) -> Option<Gutter> {
    let boxes: Vec<_> = blocks.iter().map(|b| b.bbox).collect();
    let min_x = boxes
        .iter()
        .map(|b| b.x0)
        .min_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))?;
    let max_x = boxes
        .iter()
        .map(|b| b.x1)
        .max_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))?;

    let extent = max_x - min_x;
    if !extent.is_finite() || extent < MIN_MULTI_COLUMN_EXTENT {
        return None;
    }

    let num_slices = (extent / SLICE_WIDTH) as usize + 1;
    let mut occupancy = vec![0usize; num_slices];

    let narrow: Vec<_> = boxes
        .iter()
        .filter(|b| b.width() < extent * SPANNING_WIDTH_RATIO)
        .collect();
    if narrow.len() < 2 {
        return None;
    }

    for bbox in narrow {
        let start = ((bbox.x0 - min_x) / SLICE_WIDTH) as usize;
        let end = ((bbox.x1 - min_x) / SLICE_WIDTH) as usize;
        for slot in occupancy
            .iter_mut()
            .take(end.min(num_slices - 1) + 1)
            .skip(start)
        {
            *slot += 1;
        }
    }

    let search_start = num_slices * 15 / 100;
    let search_end = num_slices * 85 / 100;
    let page_center = num_slices as f32 / 2.0;

    let mut best: Option<(usize, usize)> = None;
    let mut run_start = 0;
    let mut run_len = 0;

    let consider = |start: usize, len: usize, best: &mut Option<(usize, usize)>| {
        if (len as f32) * SLICE_WIDTH < MIN_GUTTER_WIDTH {
            return;
        }
        let dist = |s: usize, l: usize| ((s + l / 2) as f32 - page_center).abs();
        let better = match *best {
            None => true,
            Some((bs, bl)) => {
                len > bl * 3 / 2 || (len * 10 >= bl * 7 && dist(start, len) < dist(bs, bl))
            }
        };
        if better {
            *best = Some((start, len));
        }
    };

    for (i, &count) in occupancy
        .iter()
        .enumerate()
        .take(search_end)
        .skip(search_start)
    {
        if count == 0 {
            if run_len == 0 {
                run_start = i;
            }
            run_len += 1;
        } else if run_len > 0 {
            consider(run_start, run_len, &mut best);
            run_len = 0;
        }
    }
    if run_len > 0 {
        consider(run_start, run_len, &mut best);
    }

    best.map(|(start, len)| Gutter {
        left: min_x + start as f32 * SLICE_WIDTH,
        right: min_x + (start + len) as f32 * SLICE_WIDTH,
    })
}

/// Top-to-bottom, then left-to-right.
fn by_position(a: &Block, b: &Block) -> Ordering {
    a.bbox
        .y0
        .partial_cmp(&b.bbox.y0)
        .unwrap_or(Ordering::Equal)
        .then(a.bbox.x0.partial_cmp(&b.bbox.x0).unwrap_or(Ordering::Equal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoundingBox, Line, Span};

    fn block(text: &str, x0: f32, y0: f32, x1: f32) -> Block {
        Block::new(vec![Line::new(vec![Span::new(
            text,
            "Times",
            10.0,
            BoundingBox::new(x0, y0, x1, y0 + 10.0),
        )])])
    }

    fn texts(blocks: &[Block]) -> Vec<String> {
        blocks.iter().map(|b| b.text()).collect()
    }

    #[test]
    fn test_single_column_sorted_by_y() {
        let blocks = vec![
            block("second", 72.0, 200.0, 540.0),
            block("first", 72.0, 100.0, 540.0),
        ];
        assert_eq!(texts(&reading_order(&blocks)), vec!["first", "second"]);
        assert!(detect_gutter(&blocks).is_none());
    }

    #[test]
    fn test_two_columns_left_first() {
        let blocks = vec![
            block("L1", 72.0, 100.0, 290.0),
            block("R1", 322.0, 100.0, 540.0),
            block("L2", 72.0, 200.0, 290.0),
            block("R2", 322.0, 200.0, 540.0),
        ];
        let gutter = detect_gutter(&blocks).unwrap();
        assert!(gutter.left >= 285.0 && gutter.right <= 330.0);
        assert_eq!(texts(&reading_order(&blocks)), vec!["L1", "L2", "R1", "R2"]);
    }

    #[test]
    fn test_spanning_block_separates_sections() {
        let blocks = vec![
            block("Title", 72.0, 50.0, 540.0),
            block("L1", 72.0, 100.0, 290.0),
            block("R1", 322.0, 100.0, 540.0),
            block("Figure caption", 72.0, 300.0, 540.0),
            block("L2", 72.0, 400.0, 290.0),
            block("R2", 322.0, 400.0, 540.0),
        ];
        assert_eq!(
            texts(&reading_order(&blocks)),
            vec!["Title", "L1", "R1", "Figure caption", "L2", "R2"]
        );
    }

    #[test]
    fn test_empty_input() {
        assert!(reading_order(&[]).is_empty());
        assert!(detect_gutter(&[]).is_none());
    }
}
