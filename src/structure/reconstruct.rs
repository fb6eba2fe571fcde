//! Text reconstructor.
//!
//! Turns classified blocks into document nodes: joins wrapped lines,
//! repairs hyphenation, merges orphans into the paragraph before them,
//! keeps fenced code verbatim and recognizes "Note:"-style callouts.

use std::sync::OnceLock;

use regex::Regex;

use crate::model::{Block, BlockKind, DocumentNode, Inline, Line, ListMarker};
use crate::options::ConvertOptions;

use super::classifier::parse_list_marker;
use super::cleanup::{styled_runs, TextCleaner};
use super::equation::EquationEngine;
use super::PageItem;

/// Horizontal offset of one list nesting level (points).
pub const LIST_INDENT_STEP: f32 = 18.0;

/// Deepest list nesting emitted.
const MAX_LIST_INDENT: u8 = 8;

/// Characters that end a line in a word-wrap hyphen.
const WRAP_HYPHENS: [char; 4] = ['-', '\u{2010}', '\u{2011}', '\u{00AD}'];

#[derive(Debug, Clone)]
struct OpenFence {
    marker: String,
    language: Option<String>,
    lines: Vec<String>,
}

/// Rebuilds prose nodes page by page.
///
/// Holds the fenced-code state so a code block may continue across pages.
pub struct TextReconstructor {
    options: ConvertOptions,
    equations: EquationEngine,
    cleaner: TextCleaner,
    fence: Option<OpenFence>,
    pending_callout: Option<String>,
}

impl TextReconstructor {
    /// Create a reconstructor.
    pub fn new(options: &ConvertOptions) -> Self {
        Self {
            options: options.clone(),
            equations: EquationEngine::new(options.equation.clone()),
            cleaner: TextCleaner::new(),
            fence: None,
            pending_callout: None,
        }
    }

    /// Whether a fenced code block is still open.
    pub fn in_code_block(&self) -> bool {
        self.fence.is_some()
    }

    /// Turn one page's items into nodes.
    ///
    /// `page_left` is the left text margin used to derive list nesting.
    pub fn reconstruct(&mut self, items: Vec<PageItem>, page_left: f32) -> Vec<DocumentNode> {
        let mut out = Vec::new();
        for item in items {
            match item {
                PageItem::Node(node) => {
                    self.flush_callout(&mut out);
                    out.push(node);
                }
                PageItem::Block(block) => self.block(block, page_left, &mut out),
            }
        }
        out
    }

    /// Close any open fence or dangling callout label at the end of the document.
    pub fn finish(&mut self) -> Vec<DocumentNode> {
        let mut out = Vec::new();
        self.flush_callout(&mut out);
        if let Some(fence) = self.fence.take() {
            log::debug!("Reconstruct: closing unterminated code fence");
            out.push(DocumentNode::CodeBlock {
                language: fence.language,
                code: fence.lines.join("\n"),
            });
        }
        out
    }

    fn block(&mut self, block: Block, page_left: f32, out: &mut Vec<DocumentNode>) {
        if matches!(block.kind, BlockKind::HeaderFooter | BlockKind::Image) || block.is_empty() {
            return;
        }

        if self.options.protect_code_blocks {
            let has_fence = block.lines.iter().any(|l| fence_marker(&l.text()).is_some());
            if self.fence.is_some() || has_fence {
                self.block_with_fences(block, page_left, out);
                return;
            }
        }

        self.prose_block(block, page_left, out);
    }

    /// Split a block at fence lines; code goes to the fence, the rest is prose.
    fn block_with_fences(&mut self, block: Block, page_left: f32, out: &mut Vec<DocumentNode>) {
        let mut prose: Vec<Line> = Vec::new();
        for line in &block.lines {
            let text = line.text();
            match self.fence.as_mut() {
                Some(fence) => {
                    if text.trim() == fence.marker {
                        let fence = self.fence.take();
                        if let Some(fence) = fence {
                            out.push(DocumentNode::CodeBlock {
                                language: fence.language,
                                code: fence.lines.join("\n"),
                            });
                        }
                    } else {
                        fence.lines.push(text.trim_end().to_string());
                    }
                }
                None => match fence_marker(&text) {
                    Some((marker, info)) => {
                        if !prose.is_empty() {
                            self.prose_block(block.with_lines(std::mem::take(&mut prose)), page_left, out);
                        }
                        self.flush_callout(out);
                        self.fence = Some(OpenFence {
                            marker,
                            language: info,
                            lines: Vec::new(),
                        });
                    }
                    None => prose.push(line.clone()),
                },
            }
        }
        if !prose.is_empty() {
            self.prose_block(block.with_lines(prose), page_left, out);
        }
    }

    fn prose_block(&mut self, block: Block, page_left: f32, out: &mut Vec<DocumentNode>) {
        let lines: Vec<String> = block
            .lines
            .iter()
            .filter(|l| !l.is_empty())
            .map(|l| l.text())
            .collect();
        if lines.is_empty() {
            return;
        }

        match block.kind {
            BlockKind::Heading => {
                self.flush_callout(out);
                let text = self.heading_text(&lines);
                if !text.is_empty() {
                    out.push(DocumentNode::heading(block.level.unwrap_or(1), text));
                }
            }
            BlockKind::ListItem => {
                self.flush_callout(out);
                self.list_items(&block, page_left, out);
            }
            BlockKind::Orphan => {
                if self.callout(&lines, out) {
                    return;
                }
                let content = self.styled_content(&lines, &block.lines);
                if content.is_empty() {
                    return;
                }
                match out.last_mut() {
                    Some(DocumentNode::Paragraph { content: previous }) => {
                        log::debug!("Reconstruct: merging orphan {:?}", inline_plain(&content));
                        push_inline(previous, Inline::text(" "));
                        for inline in content {
                            push_inline(previous, inline);
                        }
                    }
                    _ => out.push(DocumentNode::Paragraph { content }),
                }
            }
            _ => {
                if self.callout(&lines, out) {
                    return;
                }
                let content = self.styled_content(&lines, &block.lines);
                if !content.is_empty() {
                    out.push(DocumentNode::Paragraph { content });
                }
            }
        }
    }

    fn heading_text(&self, lines: &[String]) -> String {
        let joined = join_lines(lines, self.options.aggressive_hyphen);
        self.cleaner
            .clean(&joined)
            .trim()
            .trim_matches(|c: char| c.is_whitespace() || matches!(c, '-' | ':' | '–' | '—'))
            .to_string()
    }

    fn list_items(&self, block: &Block, page_left: f32, out: &mut Vec<DocumentNode>) {
        // A list in a second column nests relative to its own left edge.
        let base = if block.bbox.x0 - page_left > LIST_INDENT_STEP * f32::from(MAX_LIST_INDENT) {
            block.bbox.x0
        } else {
            page_left
        };
        let mut current: Option<(ListMarker, u8, Vec<String>, Vec<&Line>)> = None;

        let emit = |item: Option<(ListMarker, u8, Vec<String>, Vec<&Line>)>,
                    out: &mut Vec<DocumentNode>| {
            if let Some((marker, indent, texts, lines)) = item {
                let content = self.cleaner.emphasize(
                    self.inline_content(&texts),
                    &styled_runs(lines.into_iter()),
                );
                out.push(DocumentNode::ListItem {
                    marker,
                    indent,
                    content,
                });
            }
        };

        for line in block.lines.iter().filter(|l| !l.is_empty()) {
            let text = line.text();
            match parse_list_marker(&text) {
                Some((marker, body)) => {
                    emit(current.take(), out);
                    current = Some((
                        marker,
                        list_indent(line.x0(), base),
                        vec![body.to_string()],
                        vec![line],
                    ));
                }
                None => match current.as_mut() {
                    Some((_, _, texts, lines)) => {
                        texts.push(text);
                        lines.push(line);
                    }
                    None => {
                        let content = self.styled_content(&[text], std::slice::from_ref(line));
                        if !content.is_empty() {
                            out.push(DocumentNode::Paragraph { content });
                        }
                    }
                },
            }
        }
        emit(current.take(), out);
    }

    /// Recognize "Note:" style callouts. Returns true when the block was consumed.
    fn callout(&mut self, lines: &[String], out: &mut Vec<DocumentNode>) -> bool {
        if !self.options.convert_callouts {
            return false;
        }

        if let Some(kind) = self.pending_callout.take() {
            let content = self.inline_content(lines);
            out.push(DocumentNode::Callout { kind, content });
            return true;
        }

        let Some(first) = lines.first() else {
            return false;
        };
        let Some(caps) = callout_regex().captures(first.trim()) else {
            return false;
        };
        let kind = caps[1].to_lowercase();
        let rest = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");

        let mut body: Vec<String> = Vec::new();
        if !rest.is_empty() {
            body.push(rest.to_string());
        }
        body.extend(lines[1..].iter().cloned());

        if body.is_empty() {
            self.pending_callout = Some(kind);
        } else {
            let content = self.inline_content(&body);
            out.push(DocumentNode::Callout { kind, content });
        }
        true
    }

    /// A label with no body that never found one becomes a plain paragraph.
    fn flush_callout(&mut self, out: &mut Vec<DocumentNode>) {
        if let Some(kind) = self.pending_callout.take() {
            out.push(DocumentNode::paragraph(format!("{}:", capitalize(&kind))));
        }
    }

    /// Inline content with the bold and italic runs of `source` kept.
    fn styled_content(&self, texts: &[String], source: &[Line]) -> Vec<Inline> {
        let runs = styled_runs(source.iter().filter(|l| !l.is_empty()));
        self.cleaner.emphasize(self.inline_content(texts), &runs)
    }

    /// Join, split out inline math, then clean the prose segments.
    fn inline_content(&self, lines: &[String]) -> Vec<Inline> {
        let joined = join_lines(lines, self.options.aggressive_hyphen);
        let parts = self.equations.split_inline(&joined);
        self.cleaner.clean_inlines(parts)
    }
}

/// Join wrapped lines with single spaces, repairing word-wrap hyphens.
///
/// A hyphen after a letter is removed when the next line starts lowercase,
/// or with `aggressive` also before a TitleCase word unless the left word
/// is an acronym. Otherwise the hyphen stays and the lines join without a
/// space, so compounds like "well-Known" survive.
pub fn join_lines(lines: &[String], aggressive: bool) -> String {
    let mut out = String::new();
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if out.is_empty() {
            out.push_str(line);
            continue;
        }

        match wrap_hyphen(&out) {
            Some((stem_end, soft)) => {
                let left_word = out[..stem_end]
                    .rsplit(|c: char| !c.is_alphabetic())
                    .next()
                    .unwrap_or("");
                if soft || starts_lowercase(line) || (aggressive && starts_title_case(line) && !is_acronym(left_word)) {
                    out.truncate(stem_end);
                } else {
                    log::debug!("Reconstruct: keeping hyphen before {:?}", line);
                }
                out.push_str(line);
            }
            None => {
                out.push(' ');
                out.push_str(line);
            }
        }
    }
    out
}

/// Byte offset where a trailing wrap hyphen starts, if the text ends
/// in letter + hyphen, and whether it is a soft hyphen.
fn wrap_hyphen(text: &str) -> Option<(usize, bool)> {
    let mut rev = text.char_indices().rev();
    let (idx, hyphen) = rev.next()?;
    if !WRAP_HYPHENS.contains(&hyphen) {
        return None;
    }
    let (_, before) = rev.next()?;
    if !before.is_alphabetic() {
        return None;
    }
    Some((idx, hyphen == '\u{00AD}'))
}

fn starts_lowercase(text: &str) -> bool {
    text.chars().next().is_some_and(|c| c.is_lowercase())
}

fn starts_title_case(text: &str) -> bool {
    let mut chars = text.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some(a), Some(b)) if a.is_uppercase() && b.is_lowercase()
    )
}

fn is_acronym(word: &str) -> bool {
    word.chars().count() >= 2 && word.chars().all(|c| c.is_uppercase())
}

/// Nesting level from the distance to the page's left text margin.
pub fn list_indent(x0: f32, page_left: f32) -> u8 {
    let offset = x0 - page_left;
    if !offset.is_finite() || offset <= 0.0 {
        return 0;
    }
    ((offset / LIST_INDENT_STEP).round() as u8).min(MAX_LIST_INDENT)
}

/// `(marker, info)` for a line opening or closing a code fence.
fn fence_marker(text: &str) -> Option<(String, Option<String>)> {
    let trimmed = text.trim();
    let caps = fence_regex().captures(trimmed)?;
    let marker = caps.get(1)?.as_str().to_string();
    let info = caps
        .get(2)
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    Some((marker, info))
}

fn push_inline(content: &mut Vec<Inline>, inline: Inline) {
    match (content.last_mut(), inline) {
        (Some(Inline::Text { text: prev }), Inline::Text { text }) => prev.push_str(&text),
        (_, inline) => content.push(inline),
    }
}

fn inline_plain(content: &[Inline]) -> String {
    crate::model::inline_text(content)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn fence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(`{3,}|~{3,})\s*([^`]*)$").expect("fence pattern is valid"))
}

fn callout_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(Note|Tip|Warning|Example|Caution|Info|NOTE|TIP|WARNING|EXAMPLE|CAUTION|INFO):\s*(.*)$")
            .expect("callout pattern is valid")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoundingBox, Span};

    fn line_at(text: &str, x0: f32, y: f32) -> Line {
        Line::new(vec![Span::new(
            text,
            "Times",
            11.0,
            BoundingBox::new(x0, y, x0 + text.len() as f32 * 5.0, y + 11.0),
        )])
    }

    fn block(kind: BlockKind, lines: &[&str]) -> PageItem {
        PageItem::Block(
            Block::new(
                lines
                    .iter()
                    .enumerate()
                    .map(|(i, t)| line_at(t, 72.0, 100.0 + i as f32 * 13.0))
                    .collect(),
            )
            .with_kind(kind),
        )
    }

    fn strings(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|s| s.to_string()).collect()
    }

    fn run(items: Vec<PageItem>) -> Vec<DocumentNode> {
        let mut r = TextReconstructor::new(&ConvertOptions::default());
        let mut nodes = r.reconstruct(items, 72.0);
        nodes.extend(r.finish());
        nodes
    }

    // ====== Hyphenation ======

    #[test]
    fn test_hyphen_unwrap_lowercase() {
        assert_eq!(join_lines(&strings(&["trans-", "form"]), false), "transform");
        assert_eq!(join_lines(&strings(&["well-", "deserved"]), false), "welldeserved");
    }

    #[test]
    fn test_hyphen_kept_before_uppercase() {
        assert_eq!(join_lines(&strings(&["pre-", "War era"]), false), "pre-War era");
        assert_eq!(join_lines(&strings(&["the NATO-", "Alliance"]), true), "the NATO-Alliance");
    }

    #[test]
    fn test_aggressive_title_case() {
        assert_eq!(join_lines(&strings(&["Trans-", "Atlantic"]), true), "TransAtlantic");
        assert_eq!(join_lines(&strings(&["Trans-", "Atlantic"]), false), "Trans-Atlantic");
    }

    #[test]
    fn test_soft_and_unicode_hyphens() {
        assert_eq!(join_lines(&strings(&["infor\u{00AD}", "Mation"]), false), "inforMation");
        assert_eq!(join_lines(&strings(&["co\u{2010}", "operate"]), false), "cooperate");
    }

    #[test]
    fn test_plain_join_and_dash() {
        assert_eq!(join_lines(&strings(&["first line", "second line"]), false), "first line second line");
        assert_eq!(join_lines(&strings(&["range 1 -", "next"]), false), "range 1 - next");
    }

    // ====== Nodes ======

    #[test]
    fn test_paragraph_lines_joined() {
        let nodes = run(vec![block(BlockKind::Paragraph, &["The quick brown fox", "jumps over the dog."])]);
        assert_eq!(nodes, vec![DocumentNode::paragraph("The quick brown fox jumps over the dog.")]);
    }

    #[test]
    fn test_heading_trailing_punctuation_trimmed() {
        let item = PageItem::Block(
            Block::new(vec![line_at("Introduction:", 72.0, 50.0)]).with_heading_level(2),
        );
        assert_eq!(run(vec![item]), vec![DocumentNode::heading(2, "Introduction")]);
    }

    #[test]
    fn test_orphan_merged_into_previous_paragraph() {
        let nodes = run(vec![
            block(BlockKind::Paragraph, &["A paragraph that ends mid"]),
            block(BlockKind::Orphan, &["sentence here."]),
        ]);
        assert_eq!(
            nodes,
            vec![DocumentNode::paragraph("A paragraph that ends mid sentence here.")]
        );
    }

    #[test]
    fn test_orphan_after_heading_stays() {
        let heading = PageItem::Block(
            Block::new(vec![line_at("Title", 72.0, 50.0)]).with_heading_level(1),
        );
        let nodes = run(vec![heading, block(BlockKind::Orphan, &["short note"])]);
        assert_eq!(nodes[1], DocumentNode::paragraph("short note"));
    }

    #[test]
    fn test_list_items() {
        let nodes = run(vec![block(
            BlockKind::ListItem,
            &["• First bullet point", "• Second bullet", "point continued"],
        )]);
        assert_eq!(
            nodes,
            vec![
                DocumentNode::ListItem {
                    marker: ListMarker::Bullet,
                    indent: 0,
                    content: vec![Inline::text("First bullet point")],
                },
                DocumentNode::ListItem {
                    marker: ListMarker::Bullet,
                    indent: 0,
                    content: vec![Inline::text("Second bullet point continued")],
                },
            ]
        );
    }

    #[test]
    fn test_list_indent() {
        assert_eq!(list_indent(72.0, 72.0), 0);
        assert_eq!(list_indent(90.0, 72.0), 1);
        assert_eq!(list_indent(108.0, 72.0), 2);
        assert_eq!(list_indent(60.0, 72.0), 0);
    }

    #[test]
    fn test_fenced_code_kept_verbatim() {
        let nodes = run(vec![
            block(BlockKind::Paragraph, &["```rust", "let x = 1;  // two  spaces"]),
            block(BlockKind::Orphan, &["```"]),
            block(BlockKind::Orphan, &["after"]),
        ]);
        assert_eq!(
            nodes,
            vec![
                DocumentNode::CodeBlock {
                    language: Some("rust".into()),
                    code: "let x = 1;  // two  spaces".into(),
                },
                DocumentNode::paragraph("after"),
            ]
        );
    }

    #[test]
    fn test_unterminated_fence_closed_at_finish() {
        let nodes = run(vec![block(BlockKind::Paragraph, &["~~~", "raw line"])]);
        assert_eq!(
            nodes,
            vec![DocumentNode::CodeBlock {
                language: None,
                code: "raw line".into(),
            }]
        );
    }

    #[test]
    fn test_callout_inline_and_split() {
        let nodes = run(vec![
            block(BlockKind::Paragraph, &["Note: back up your data first."]),
            block(BlockKind::Orphan, &["Warning:"]),
            block(BlockKind::Paragraph, &["This operation cannot be undone."]),
        ]);
        assert_eq!(
            nodes,
            vec![
                DocumentNode::Callout {
                    kind: "note".into(),
                    content: vec![Inline::text("back up your data first.")],
                },
                DocumentNode::Callout {
                    kind: "warning".into(),
                    content: vec![Inline::text("This operation cannot be undone.")],
                },
            ]
        );
    }

    #[test]
    fn test_callouts_disabled() {
        let mut r = TextReconstructor::new(&ConvertOptions::default().with_callouts(false));
        let nodes = r.reconstruct(vec![block(BlockKind::Paragraph, &["Note: plain text here."])], 72.0);
        assert_eq!(nodes, vec![DocumentNode::paragraph("Note: plain text here.")]);
    }

    #[test]
    fn test_inline_math_and_links() {
        let nodes = run(vec![block(
            BlockKind::Paragraph,
            &["The energy is E = mc² as shown at https://example.org."],
        )]);
        assert_eq!(
            nodes,
            vec![DocumentNode::Paragraph {
                content: vec![
                    Inline::text("The energy is "),
                    Inline::math("E = mc^{2}"),
                    Inline::text(" as shown at "),
                    Inline::Link {
                        text: "https://example.org".into(),
                        url: "https://example.org".into(),
                    },
                    Inline::text("."),
                ],
            }]
        );
    }

    #[test]
    fn test_passthrough_nodes() {
        let eq = DocumentNode::equation("x", true);
        assert_eq!(run(vec![PageItem::Node(eq.clone())]), vec![eq]);
    }
}
