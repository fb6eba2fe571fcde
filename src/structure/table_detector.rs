//! Table engine.
//!
//! Rebuilds tables from text lines. Three strategies run in priority order
//! over each run of neighbouring text blocks:
//!
//! 1. bordered: explicit `|` or `¦` delimiters
//! 2. stitched: span positions that line up into one column grid across
//!    several blocks (extraction often splits a table into a block per row)
//! 3. whitespace: cells separated by runs of spaces, tabs or wide gaps
//!
//! Lines claimed by one strategy are not offered to the next. A region no
//! strategy is confident about stays as ordinary text.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;

use crate::model::{Block, BlockKind, ColumnAlignment, DocumentNode, Line, Table};
use crate::options::TableConfig;

use super::PageItem;

/// Detection strategy, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// `|`-delimited rows
    Bordered,
    /// Column grid assembled from several blocks
    Stitched,
    /// Whitespace-aligned columns
    Whitespace,
}

impl Strategy {
    /// All strategies, highest priority first.
    pub const ALL: [Strategy; 3] = [Strategy::Bordered, Strategy::Stitched, Strategy::Whitespace];
}

/// A cell with its horizontal extent.
///
/// Cells cut out of a single span get an extent estimated from their
/// character offset; `pitch` is the average glyph width used for that.
#[derive(Debug, Clone)]
struct Cell {
    x0: f32,
    x1: f32,
    pitch: f32,
    text: String,
}

impl Cell {
    /// Left edges, right edges or centres agree.
    fn lines_up_with(&self, other: &Cell, tolerance: f32) -> bool {
        let tolerance = tolerance.max(1.5 * self.pitch.max(other.pitch));
        (self.x0 - other.x0).abs() <= tolerance
            || (self.x1 - other.x1).abs() <= tolerance
            || ((self.x0 + self.x1) - (other.x0 + other.x1)).abs() / 2.0 <= tolerance
    }
}

/// One line split into cells.
#[derive(Debug, Clone)]
enum Row {
    Cells { cells: Vec<Cell>, bold: bool },
    /// A `|---|:---:|` rule under a header
    Separator,
}

/// Detects and rebuilds tables.
#[derive(Debug, Clone)]
pub struct TableEngine {
    config: TableConfig,
}

impl TableEngine {
    /// Create an engine with the given thresholds.
    pub fn new(config: TableConfig) -> Self {
        Self { config }
    }

    /// Quick check used by the classifier: would the block alone form a table?
    pub fn looks_tabular(&self, block: &Block) -> bool {
        let lines: Vec<&Line> = block.lines.iter().filter(|l| !l.is_empty()).collect();
        if lines.len() < self.config.min_rows {
            return false;
        }
        [Strategy::Bordered, Strategy::Whitespace]
            .into_iter()
            .any(|strategy| {
                let rows: Option<Vec<Row>> =
                    lines.iter().map(|l| self.split(strategy, l)).collect();
                rows.is_some_and(|rows| self.build(strategy, &rows, 1).is_some())
            })
    }

    /// Split blocks into detected tables and the blocks left over.
    pub fn detect_tables(&self, blocks: Vec<Block>) -> (Vec<Table>, Vec<Block>) {
        let mut tables = Vec::new();
        let mut remaining = Vec::new();
        for item in self.apply(blocks.into_iter().map(PageItem::Block).collect()) {
            match item {
                PageItem::Node(DocumentNode::Table(table)) => tables.push(table),
                PageItem::Block(block) => remaining.push(block),
                PageItem::Node(_) => {}
            }
        }
        (tables, remaining)
    }

    /// Replace tabular lines with table nodes, keeping everything else in place.
    pub fn apply(&self, items: Vec<PageItem>) -> Vec<PageItem> {
        let mut out = Vec::with_capacity(items.len());
        let mut run: Vec<Block> = Vec::new();
        for item in items {
            match item {
                PageItem::Block(block) if is_eligible(&block) => run.push(block),
                other => {
                    out.extend(self.process_run(std::mem::take(&mut run)));
                    out.push(other);
                }
            }
        }
        out.extend(self.process_run(run));
        out
    }

    fn process_run(&self, blocks: Vec<Block>) -> Vec<PageItem> {
        if blocks.is_empty() {
            return Vec::new();
        }

        let flat: Vec<(usize, &Line)> = blocks
            .iter()
            .enumerate()
            .flat_map(|(i, b)| b.lines.iter().filter(|l| !l.is_empty()).map(move |l| (i, l)))
            .collect();

        let mut claimed: Vec<Option<usize>> = vec![None; flat.len()];
        let mut tables: Vec<Option<Table>> = Vec::new();

        for strategy in Strategy::ALL {
            let splits: Vec<Option<Row>> = flat
                .iter()
                .zip(&claimed)
                .map(|((_, line), c)| match c {
                    Some(_) => None,
                    None => self.split(strategy, line),
                })
                .collect();

            let mut start = 0;
            while start < flat.len() {
                if splits[start].is_none() {
                    start += 1;
                    continue;
                }
                let mut end = start;
                while end < flat.len() && splits[end].is_some() {
                    end += 1;
                }

                let rows: Vec<Row> = splits[start..end].iter().flatten().cloned().collect();
                let block_span: HashSet<usize> = flat[start..end].iter().map(|(b, _)| *b).collect();
                if let Some(table) = self.build(strategy, &rows, block_span.len()) {
                    log::debug!(
                        "TableEngine: {:?} table with {} rows x {} columns",
                        strategy,
                        table.row_count(),
                        table.column_count()
                    );
                    let index = tables.len();
                    tables.push(Some(table));
                    for slot in &mut claimed[start..end] {
                        *slot = Some(index);
                    }
                }
                start = end;
            }
        }

        if tables.is_empty() {
            return blocks.into_iter().map(|b| PageItem::Block(demote(b))).collect();
        }

        let mut out = Vec::new();
        let mut pending: Vec<Line> = Vec::new();
        let mut pending_block: Option<usize> = None;

        let flush = |out: &mut Vec<PageItem>, pending: &mut Vec<Line>, block: Option<usize>| {
            if let Some(bi) = block {
                if !pending.is_empty() {
                    let rest = blocks[bi].with_lines(std::mem::take(pending));
                    out.push(PageItem::Block(demote(rest)));
                }
            }
        };

        for (k, (bi, line)) in flat.iter().enumerate() {
            match claimed[k] {
                Some(t) => {
                    flush(&mut out, &mut pending, pending_block);
                    pending_block = None;
                    if let Some(table) = tables[t].take() {
                        out.push(PageItem::Node(DocumentNode::Table(table)));
                    }
                }
                None => {
                    if pending_block != Some(*bi) {
                        flush(&mut out, &mut pending, pending_block);
                        pending_block = Some(*bi);
                    }
                    pending.push((*line).clone());
                }
            }
        }
        flush(&mut out, &mut pending, pending_block);
        out
    }

    /// Split one line into cells for a strategy, or `None` if the line does not fit.
    fn split(&self, strategy: Strategy, line: &Line) -> Option<Row> {
        let row = match strategy {
            Strategy::Bordered => split_bordered(line)?,
            Strategy::Stitched => self.split_by_gaps(line, false),
            Strategy::Whitespace => self.split_by_gaps(line, true),
        };
        match &row {
            Row::Cells { cells, .. } if cells.len() < self.config.min_columns => None,
            _ => Some(row),
        }
    }

    /// Group spans separated by at least `min_column_gap`; optionally also
    /// split span text on runs of two or more spaces or tabs.
    fn split_by_gaps(&self, line: &Line, split_text: bool) -> Row {
        let mut cells: Vec<Cell> = Vec::new();
        let mut prev_x1: Option<f32> = None;

        for span in &line.spans {
            let gap_break =
                prev_x1.map_or(true, |x1| span.bbox.x0 - x1 >= self.config.min_column_gap);
            prev_x1 = Some(span.bbox.x1);

            let pitch = span.bbox.width() / span.char_count().max(1) as f32;
            let pieces: Vec<(usize, &str)> = if split_text {
                split_on_gaps(&span.text)
            } else {
                vec![(0, span.text.as_str())]
            };

            for (i, (offset, raw)) in pieces.into_iter().enumerate() {
                let piece = raw.trim();
                let (x0, x1) = if split_text {
                    let lead = raw.len() - raw.trim_start().len();
                    let before = span.text[..offset + lead].chars().count() as f32;
                    let x0 = span.bbox.x0 + before * pitch;
                    (x0, x0 + piece.chars().count() as f32 * pitch)
                } else {
                    (span.bbox.x0, span.bbox.x1)
                };
                let new_cell = i > 0 || gap_break || cells.is_empty();
                if new_cell {
                    if !piece.is_empty() || i == 0 {
                        cells.push(Cell {
                            x0,
                            x1,
                            pitch,
                            text: piece.to_string(),
                        });
                    }
                } else if let Some(last) = cells.last_mut() {
                    if !piece.is_empty() {
                        if !last.text.is_empty() {
                            last.text.push(' ');
                        }
                        last.text.push_str(piece);
                        last.x1 = x1;
                    }
                }
            }
        }
        cells.retain(|c| !c.text.is_empty());

        Row::Cells {
            cells,
            bold: line.is_bold(),
        }
    }

    /// Assemble and score a table from split rows.
    fn build(&self, strategy: Strategy, rows: &[Row], block_count: usize) -> Option<Table> {
        let cfg = &self.config;
        let separator_after_first = matches!(rows.get(1), Some(Row::Separator));
        let data: Vec<(&[Cell], bool)> = rows
            .iter()
            .filter_map(|r| match r {
                Row::Cells { cells, bold } => Some((cells.as_slice(), *bold)),
                Row::Separator => None,
            })
            .collect();
        if data.len() < cfg.min_rows {
            return None;
        }

        let (grid, confidence, threshold) = match strategy {
            Strategy::Bordered => {
                let (grid, confidence) = modal_grid(&data);
                (grid, confidence, cfg.bordered_min_confidence)
            }
            Strategy::Whitespace => {
                let (grid, regularity) = modal_grid(&data);
                let confidence = regularity * self.alignment_score(&data);
                (grid, confidence, cfg.whitespace_min_confidence)
            }
            Strategy::Stitched => {
                if block_count < 2 {
                    return None;
                }
                let (grid, confidence) = self.stitch(&data);
                (grid, confidence, cfg.stitched_min_confidence)
            }
        };

        if confidence < threshold {
            log::debug!(
                "TableEngine: {:?} abstains (confidence {:.2} < {:.2})",
                strategy,
                confidence,
                threshold
            );
            return None;
        }

        let columns = grid.iter().map(|r| r.len()).max().unwrap_or(0);
        if columns < cfg.min_columns || columns > cfg.max_columns {
            return None;
        }
        if strategy != Strategy::Bordered && is_list_pattern(&grid, columns) {
            log::debug!("TableEngine: skipping region, rows look like a list");
            return None;
        }

        let table = Table::new(grid);
        let has_header = separator_after_first || self.detect_header(&table, &data);
        let alignment = self.column_alignment(&table, has_header);
        Some(table.with_header(has_header).with_alignment(alignment))
    }

    /// Project cells onto column edges shared by the rows.
    ///
    /// Returns the grid and the mean share of cells that sit on an edge.
    fn stitch(&self, rows: &[(&[Cell], bool)]) -> (Vec<Vec<String>>, f32) {
        let tolerance = self.config.column_tolerance.max(1.0);

        let mut edge_counts: HashMap<i32, usize> = HashMap::new();
        for (cells, _) in rows {
            let buckets: HashSet<i32> = cells
                .iter()
                .map(|c| (c.x0 / tolerance).round() as i32)
                .collect();
            for bucket in buckets {
                *edge_counts.entry(bucket).or_insert(0) += 1;
            }
        }

        let min_occurrences = rows.len().div_ceil(2).max(2);
        let mut candidates: Vec<f32> = edge_counts
            .iter()
            .filter(|(_, count)| **count >= min_occurrences)
            .map(|(bucket, _)| *bucket as f32 * tolerance)
            .collect();
        candidates.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let mut edges: Vec<f32> = Vec::new();
        for edge in candidates {
            match edges.last() {
                Some(last) if edge - last < self.config.min_column_gap => {}
                _ => edges.push(edge),
            }
        }
        if edges.len() < 2 {
            return (Vec::new(), 0.0);
        }

        let mut score = 0.0;
        let mut grid = Vec::with_capacity(rows.len());
        for (cells, _) in rows {
            let aligned = cells
                .iter()
                .filter(|c| edges.iter().any(|e| (c.x0 - e).abs() <= tolerance))
                .count();
            score += aligned as f32 / cells.len().max(1) as f32;

            let mut row = vec![String::new(); edges.len()];
            for cell in cells.iter() {
                let col = edges
                    .iter()
                    .rposition(|e| cell.x0 >= e - tolerance)
                    .unwrap_or(0);
                if !row[col].is_empty() {
                    row[col].push(' ');
                }
                row[col].push_str(&cell.text);
            }
            grid.push(row);
        }

        (grid, score / rows.len() as f32)
    }

    /// Share of cells after the first column that line up with another
    /// cell of the same column. Prose with stray double spaces scores low.
    fn alignment_score(&self, rows: &[(&[Cell], bool)]) -> f32 {
        let columns = rows.iter().map(|(cells, _)| cells.len()).max().unwrap_or(0);
        let mut total = 0usize;
        let mut aligned = 0usize;
        for col in 1..columns {
            let column: Vec<&Cell> = rows.iter().filter_map(|(cells, _)| cells.get(col)).collect();
            total += column.len();
            aligned += column
                .iter()
                .enumerate()
                .filter(|(i, cell)| {
                    column
                        .iter()
                        .enumerate()
                        .any(|(j, other)| j != *i && cell.lines_up_with(other, self.config.column_tolerance))
                })
                .count();
        }
        if total == 0 {
            return 0.0;
        }
        aligned as f32 / total as f32
    }

    /// First row is a header when it is styled apart from the body, or by
    /// default unless it looks like data.
    fn detect_header(&self, table: &Table, rows: &[(&[Cell], bool)]) -> bool {
        if table.row_count() < 2 {
            return false;
        }
        let first = &table.rows[0];
        let body = &table.rows[1..];

        let first_bold = rows.first().is_some_and(|(_, bold)| *bold);
        let body_bold = rows.iter().skip(1).any(|(_, bold)| *bold);
        let first_caps = first.iter().all(|c| is_caps(c)) && first.iter().any(|c| !c.is_empty());
        let body_caps = body.iter().all(|r| r.iter().all(|c| is_caps(c)));
        let avg_len = |row: &[String]| {
            row.iter().map(|c| c.chars().count()).sum::<usize>() as f32 / row.len().max(1) as f32
        };
        let body_avg =
            body.iter().map(|r| avg_len(r)).sum::<f32>() / body.len().max(1) as f32;
        let styled = (first_bold && !body_bold) || (first_caps && !body_caps);
        if styled && avg_len(first) <= body_avg {
            return true;
        }

        let numeric_column = |col: usize| {
            let values: Vec<&String> = body.iter().map(|r| &r[col]).filter(|c| !c.is_empty()).collect();
            !values.is_empty()
                && values.iter().filter(|c| is_numeric(c)).count() as f32 / values.len() as f32
                    >= self.config.numeric_ratio
        };
        let data_like = first
            .iter()
            .enumerate()
            .any(|(col, cell)| is_numeric(cell) && numeric_column(col));
        !data_like
    }

    fn column_alignment(&self, table: &Table, has_header: bool) -> Vec<ColumnAlignment> {
        let body = if has_header { &table.rows[1..] } else { &table.rows[..] };
        (0..table.column_count())
            .map(|col| {
                let values: Vec<&String> =
                    body.iter().map(|r| &r[col]).filter(|c| !c.is_empty()).collect();
                let numeric = values.iter().filter(|c| is_numeric(c)).count();
                if !values.is_empty()
                    && numeric as f32 / values.len() as f32 >= self.config.numeric_ratio
                {
                    ColumnAlignment::Right
                } else {
                    ColumnAlignment::Left
                }
            })
            .collect()
    }
}

impl Default for TableEngine {
    fn default() -> Self {
        Self::new(TableConfig::default())
    }
}

fn split_bordered(line: &Line) -> Option<Row> {
    let text = line.text();
    let trimmed = text.trim();
    if !trimmed.contains(['|', '¦']) {
        return None;
    }
    if separator_regex().is_match(trimmed) {
        return Some(Row::Separator);
    }

    let mut pieces: Vec<&str> = trimmed.split(['|', '¦']).collect();
    if trimmed.starts_with(['|', '¦']) {
        pieces.remove(0);
    }
    if trimmed.ends_with(['|', '¦']) {
        pieces.pop();
    }
    let x0 = line.x0();
    Some(Row::Cells {
        cells: pieces
            .into_iter()
            .map(|p| Cell {
                x0,
                x1: x0,
                pitch: 0.0,
                text: p.trim().to_string(),
            })
            .collect(),
        bold: line.is_bold(),
    })
}

/// Rows as plain text and the share of rows with the most common cell count.
fn modal_grid(rows: &[(&[Cell], bool)]) -> (Vec<Vec<String>>, f32) {
    let mut counts: HashMap<usize, usize> = HashMap::new();
    for (cells, _) in rows {
        *counts.entry(cells.len()).or_insert(0) += 1;
    }
    let modal = counts.values().copied().max().unwrap_or(0);
    let grid = rows
        .iter()
        .map(|(cells, _)| cells.iter().map(|c| c.text.clone()).collect())
        .collect();
    (grid, modal as f32 / rows.len().max(1) as f32)
}

/// Whether the rows are really a bulleted or numbered list split at the marker.
fn is_list_pattern(grid: &[Vec<String>], columns: usize) -> bool {
    if grid.is_empty() {
        return false;
    }
    let mut bullet_count = 0;
    let mut number_count = 0;
    for row in grid {
        let Some(first) = row.first() else { continue };
        if is_bullet_marker(first) {
            bullet_count += 1;
        } else if is_number_marker(first) {
            number_count += 1;
        }
    }
    let rows = grid.len() as f32;
    if bullet_count as f32 / rows >= 0.5 {
        return true;
    }
    columns == 2 && (bullet_count + number_count) as f32 / rows >= 0.5
}

fn is_bullet_marker(text: &str) -> bool {
    matches!(
        text.trim(),
        "-" | "–" | "—" | "•" | "·" | "*" | "○" | "▪" | "◦" | "▸" | "►" | "■" | "●"
    )
}

fn is_number_marker(text: &str) -> bool {
    let trimmed = text.trim();
    let Some(body) = trimmed
        .strip_suffix('.')
        .or_else(|| trimmed.strip_suffix(')'))
    else {
        return false;
    };
    !body.is_empty() && body.len() <= 3 && body.chars().all(|c| c.is_ascii_alphanumeric())
}

fn is_caps(text: &str) -> bool {
    let letters: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
    !letters.is_empty() && letters.iter().all(|c| c.is_uppercase())
}

/// Whether a cell parses as a number (thousands separators, sign, currency and percent allowed).
pub fn is_numeric(text: &str) -> bool {
    numeric_regex().is_match(text.trim())
}

fn is_eligible(block: &Block) -> bool {
    matches!(
        block.kind,
        BlockKind::Paragraph | BlockKind::Orphan | BlockKind::TableCandidate | BlockKind::Unknown
    )
}

/// Unclaimed candidate lines go back to being prose.
fn demote(block: Block) -> Block {
    if block.kind == BlockKind::TableCandidate {
        block.with_kind(BlockKind::Paragraph)
    } else {
        block
    }
}

/// Pieces of `text` between runs of spaces or tabs, with their byte offsets.
fn split_on_gaps(text: &str) -> Vec<(usize, &str)> {
    let mut pieces = Vec::new();
    let mut start = 0;
    for gap in cell_gap_regex().find_iter(text) {
        pieces.push((start, &text[start..gap.start()]));
        start = gap.end();
    }
    pieces.push((start, &text[start..]));
    pieces
}

fn cell_gap_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r" {2,}|\t+").expect("cell gap pattern is valid"))
}

fn separator_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[|¦]?\s*:?-{3,}:?\s*(?:[|¦]\s*:?-{3,}:?\s*)*[|¦]?$")
            .expect("separator pattern is valid")
    })
}

fn numeric_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[-+−]?\(?[$€£¥]?(?:(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?|\.\d+)%?\)?$")
            .expect("numeric pattern is valid")
    })
}
