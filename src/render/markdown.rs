//! Markdown rendering for structured documents.
//!
//! Rendering is a pure function of the document and the options: the same
//! input always yields byte-identical output.

use crate::model::{ColumnAlignment, DocumentNode, Inline, ListMarker, StructuredDocument, Table};
use crate::options::{ConvertOptions, ImagePlacement};

use super::{ConversionStats, ImageManifest, RenderResult};

/// Render a structured document to Markdown plus its image manifest.
pub fn render(doc: &StructuredDocument, options: &ConvertOptions) -> RenderResult {
    MarkdownRenderer::new(options.clone()).render(doc)
}

/// Render a structured document to a Markdown string only.
pub fn to_markdown(doc: &StructuredDocument, options: &ConvertOptions) -> String {
    render(doc, options).markdown
}

/// Markdown renderer.
pub struct MarkdownRenderer {
    options: ConvertOptions,
    stats: ConversionStats,
    images: ImageManifest,
}

impl MarkdownRenderer {
    /// Create a new Markdown renderer.
    pub fn new(options: ConvertOptions) -> Self {
        Self {
            options,
            stats: ConversionStats::new(),
            images: ImageManifest::new(),
        }
    }

    /// Render a document, consuming the renderer.
    pub fn render(mut self, doc: &StructuredDocument) -> RenderResult {
        // Top-level chunks are separated by a blank line. Consecutive list
        // items share one chunk so the list stays tight.
        let mut chunks: Vec<String> = Vec::new();
        let mut in_list = false;
        // Content column of the open item at each nesting level.
        let mut list_columns: Vec<usize> = Vec::new();

        for node in &doc.nodes {
            self.stats.add_node(node);
            match node {
                DocumentNode::ListItem {
                    marker,
                    indent,
                    content,
                } => {
                    if !in_list {
                        list_columns.clear();
                    }
                    let line = render_list_item(&mut list_columns, marker, *indent, content);
                    match chunks.last_mut() {
                        Some(list) if in_list => {
                            list.push('\n');
                            list.push_str(&line);
                        }
                        _ => chunks.push(line),
                    }
                    in_list = true;
                    continue;
                }
                DocumentNode::ImageRef { path, page_number } => {
                    let paths = self.images.entry(*page_number).or_default();
                    paths.push(path.clone());
                    let index = paths.len();
                    if self.options.image_placement == ImagePlacement::Inline {
                        chunks.push(image_markdown(*page_number, index, path));
                    }
                }
                other => {
                    if let Some(chunk) = self.render_node(other) {
                        chunks.push(chunk);
                    }
                }
            }
            in_list = false;
        }

        if self.options.image_placement == ImagePlacement::DocumentEnd {
            chunks.extend(self.collected_images());
        }

        let mut output = String::new();
        if self.options.include_frontmatter {
            output.push_str(&doc.metadata.to_yaml_frontmatter(doc.page_count));
            output.push('\n');
        }
        output.push_str(&chunks.join("\n\n"));

        let mut markdown = output.trim().to_string();
        markdown.push('\n');

        self.stats.page_count = doc.page_count;
        self.stats.count_words(&markdown);
        log::debug!(
            "Render: {} bytes, {} images on {} pages",
            markdown.len(),
            self.stats.image_count,
            self.images.len()
        );
        RenderResult::new(markdown, self.images, self.stats)
    }

    fn render_node(&self, node: &DocumentNode) -> Option<String> {
        match node {
            DocumentNode::Heading { level, text } => {
                if text.trim().is_empty() {
                    return None;
                }
                Some(format!("{} {}", "#".repeat(*level as usize), escape_markdown(text)))
            }
            DocumentNode::Paragraph { content } => {
                let text = render_inlines(content);
                (!text.trim().is_empty()).then_some(text)
            }
            DocumentNode::Table(table) => render_table(table),
            DocumentNode::Equation { latex, display } => Some(math_markdown(latex, *display)),
            DocumentNode::PageBreak => self.options.insert_page_breaks.then(|| "---".to_string()),
            DocumentNode::CodeBlock { language, code } => Some(format!(
                "```{}\n{}\n```",
                language.as_deref().unwrap_or(""),
                code
            )),
            DocumentNode::Callout { kind, content } => Some(render_callout(kind, content)),
            DocumentNode::Placeholder {
                page_number,
                reason,
            } => Some(format!(
                "<!-- page {}: {} -->",
                page_number,
                reason.replace("--", "- -")
            )),
            DocumentNode::ListItem { .. } | DocumentNode::ImageRef { .. } => None,
        }
    }

    fn collected_images(&self) -> Vec<String> {
        self.images
            .iter()
            .filter(|(_, paths)| !paths.is_empty())
            .map(|(page, paths)| {
                let mut chunk = format!("**Images from page {}:**", page);
                for (i, path) in paths.iter().enumerate() {
                    chunk.push_str(&format!("\n- {}", image_markdown(*page, i + 1, path)));
                }
                chunk
            })
            .collect()
    }
}

/// A child item is indented to its parent's content column, so it nests
/// under `10.` as well as under `-`. Levels deeper than one below the open
/// item are clamped.
fn render_list_item(
    columns: &mut Vec<usize>,
    marker: &ListMarker,
    indent: u8,
    content: &[Inline],
) -> String {
    let marker = match marker {
        ListMarker::Bullet | ListMarker::Lettered { .. } => "-".to_string(),
        ListMarker::Numbered { number } => format!("{}.", number),
    };
    let level = (indent as usize).min(columns.len());
    let lead = if level == 0 { 0 } else { columns[level - 1] };
    columns.truncate(level);
    columns.push(lead + marker.chars().count() + 1);
    format!("{}{} {}", " ".repeat(lead), marker, render_inlines(content))
}

fn render_inlines(content: &[Inline]) -> String {
    let mut output = String::new();
    for inline in content {
        match inline {
            Inline::Text { text } => output.push_str(&escape_markdown(text)),
            Inline::Emphasis { text, bold, italic } => {
                let marker = match (bold, italic) {
                    (true, true) => "***",
                    (true, false) => "**",
                    (false, true) => "*",
                    (false, false) => "",
                };
                output.push_str(&format!("{}{}{}", marker, escape_markdown(text.trim()), marker));
            }
            Inline::Link { text, url } => {
                output.push_str(&format!("[{}]({})", escape_markdown(text), url));
            }
            Inline::Math { latex, display } => output.push_str(&math_markdown(latex, *display)),
        }
    }
    output
}

fn math_markdown(latex: &str, display: bool) -> String {
    if display {
        format!("$${}$$", latex)
    } else {
        format!("${}$", latex)
    }
}

fn image_markdown(page: u32, index: usize, path: &str) -> String {
    format!("![p{}-{}]({})", page, index, path)
}

fn render_callout(kind: &str, content: &[Inline]) -> String {
    let label = {
        let mut chars = kind.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
            None => String::new(),
        }
    };
    let mut out = format!("> [!{}] {}", kind, label);
    let body = render_inlines(content);
    for line in body.lines() {
        out.push_str("\n> ");
        out.push_str(line);
    }
    out
}

/// Pipe table with an alignment row. A table without a header row gets an
/// empty one, since a pipe table cannot start with its alignment row.
fn render_table(table: &Table) -> Option<String> {
    if table.is_empty() {
        return None;
    }
    let columns = table.column_count();
    let mut lines = Vec::with_capacity(table.row_count() + 2);

    match table.header() {
        Some(header) => lines.push(table_row(header)),
        None => lines.push(table_row(&vec![String::new(); columns])),
    }

    let mut align = String::from("|");
    for i in 0..columns {
        let marker = match table.column_alignment.get(i).copied().unwrap_or_default() {
            ColumnAlignment::Left => " :--- |",
            ColumnAlignment::Right => " ---: |",
            ColumnAlignment::Center => " :---: |",
        };
        align.push_str(marker);
    }
    lines.push(align);

    for row in table.body() {
        lines.push(table_row(row));
    }
    Some(lines.join("\n"))
}

fn table_row(cells: &[String]) -> String {
    let mut row = String::from("|");
    for cell in cells {
        let content = escape_markdown(&cell.replace('\n', " "));
        row.push_str(&format!(" {} |", content.trim()));
    }
    row
}

/// Escape special Markdown characters.
///
/// Only characters that would change the meaning of running text are
/// escaped; math segments never pass through here.
pub fn escape_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' | '`' | '*' | '_' | '[' | ']' | '|' | '$' => {
                result.push('\\');
                result.push(c);
            }
            _ => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Metadata;

    fn doc(nodes: Vec<DocumentNode>) -> StructuredDocument {
        let mut doc = StructuredDocument::new(Metadata::default());
        doc.nodes = nodes;
        doc.page_count = 1;
        doc
    }

    fn md(nodes: Vec<DocumentNode>) -> String {
        to_markdown(&doc(nodes), &ConvertOptions::default())
    }

    fn bullet(text: &str, indent: u8) -> DocumentNode {
        DocumentNode::ListItem {
            marker: ListMarker::Bullet,
            indent,
            content: vec![Inline::text(text)],
        }
    }

    #[test]
    fn test_heading_levels() {
        assert_eq!(md(vec![DocumentNode::heading(3, "Methods")]), "### Methods\n");
    }

    #[test]
    fn test_paragraph_escaping() {
        assert_eq!(
            md(vec![DocumentNode::paragraph("snake_case and *stars* cost $5")]),
            "snake\\_case and \\*stars\\* cost \\$5\n"
        );
    }

    #[test]
    fn test_bullets_tight_list() {
        assert_eq!(
            md(vec![bullet("First bullet point", 0), bullet("Second bullet point", 0)]),
            "- First bullet point\n- Second bullet point\n"
        );
    }

    #[test]
    fn test_nested_and_numbered_lists() {
        let nodes = vec![
            DocumentNode::ListItem {
                marker: ListMarker::Numbered { number: 3 },
                indent: 0,
                content: vec![Inline::text("Third")],
            },
            bullet("nested", 1),
            DocumentNode::ListItem {
                marker: ListMarker::Lettered { letter: 'a' },
                indent: 0,
                content: vec![Inline::text("lettered")],
            },
        ];
        assert_eq!(md(nodes), "3. Third\n   - nested\n- lettered\n");
    }

    #[test]
    fn test_child_indented_to_parent_content() {
        let nodes = vec![
            DocumentNode::ListItem {
                marker: ListMarker::Numbered { number: 10 },
                indent: 0,
                content: vec![Inline::text("Tenth")],
            },
            bullet("child", 1),
            bullet("grandchild", 2),
            bullet("back out", 1),
        ];
        assert_eq!(
            md(nodes),
            "10. Tenth\n    - child\n      - grandchild\n    - back out\n"
        );
    }

    #[test]
    fn test_list_depth_clamped() {
        assert_eq!(md(vec![bullet("deep", 3), bullet("deeper", 3)]), "- deep\n  - deeper\n");
    }

    #[test]
    fn test_list_separated_from_paragraph() {
        let out = md(vec![
            DocumentNode::paragraph("Intro"),
            bullet("one", 0),
            DocumentNode::paragraph("Outro"),
        ]);
        assert_eq!(out, "Intro\n\n- one\n\nOutro\n");
    }

    #[test]
    fn test_emphasis_markers() {
        let emphasis = |text: &str, bold: bool, italic: bool| Inline::Emphasis {
            text: text.to_string(),
            bold,
            italic,
        };
        let out = md(vec![DocumentNode::Paragraph {
            content: vec![
                Inline::text("a "),
                emphasis("strong", true, false),
                Inline::text(", "),
                emphasis("slanted", false, true),
                Inline::text(" and "),
                emphasis("snake_case", true, true),
            ],
        }]);
        assert_eq!(out, "a **strong**, *slanted* and ***snake\\_case***\n");
    }

    #[test]
    fn test_inline_math_not_escaped() {
        let out = md(vec![DocumentNode::Paragraph {
            content: vec![Inline::text("Energy "), Inline::math("E = mc^{2}")],
        }]);
        assert_eq!(out, "Energy $E = mc^{2}$\n");
    }

    #[test]
    fn test_equation_nodes() {
        assert_eq!(md(vec![DocumentNode::equation("E = mc^{2}", false)]), "$E = mc^{2}$\n");
        assert_eq!(md(vec![DocumentNode::equation("x_{i}", true)]), "$$x_{i}$$\n");
    }

    #[test]
    fn test_table_with_header() {
        let table = Table::from_strings(&[
            vec!["Name", "Age", "City"],
            vec!["Alice", "30", "New York"],
            vec!["Bob", "25", "London"],
        ])
        .with_header(true)
        .with_alignment(vec![
            ColumnAlignment::Left,
            ColumnAlignment::Right,
            ColumnAlignment::Left,
        ]);
        assert_eq!(
            md(vec![DocumentNode::Table(table)]),
            "| Name | Age | City |\n| :--- | ---: | :--- |\n| Alice | 30 | New York |\n| Bob | 25 | London |\n"
        );
    }

    #[test]
    fn test_table_without_header() {
        let table = Table::from_strings(&[vec!["1", "2"], vec!["3", "a|b"]]);
        assert_eq!(
            md(vec![DocumentNode::Table(table)]),
            "|  |  |\n| :--- | :--- |\n| 1 | 2 |\n| 3 | a\\|b |\n"
        );
    }

    #[test]
    fn test_page_break_only_when_enabled() {
        let nodes = vec![
            DocumentNode::paragraph("one"),
            DocumentNode::PageBreak,
            DocumentNode::paragraph("two"),
        ];
        assert_eq!(md(nodes.clone()), "one\n\ntwo\n");
        let opts = ConvertOptions::default().with_page_breaks(true);
        assert_eq!(to_markdown(&doc(nodes), &opts), "one\n\n---\n\ntwo\n");
    }

    #[test]
    fn test_images_inline_and_manifest() {
        let result = render(
            &doc(vec![
                DocumentNode::paragraph("See figure"),
                DocumentNode::ImageRef {
                    path: "assets/fig1.png".into(),
                    page_number: 2,
                },
            ]),
            &ConvertOptions::default(),
        );
        assert_eq!(result.markdown, "See figure\n\n![p2-1](assets/fig1.png)\n");
        assert_eq!(result.images.get(&2).unwrap(), &vec!["assets/fig1.png".to_string()]);
        assert_eq!(result.stats.image_count, 1);
    }

    #[test]
    fn test_images_at_document_end() {
        let opts = ConvertOptions::default().with_image_placement(ImagePlacement::DocumentEnd);
        let result = render(
            &doc(vec![
                DocumentNode::ImageRef {
                    path: "assets/a.png".into(),
                    page_number: 1,
                },
                DocumentNode::paragraph("Body"),
                DocumentNode::ImageRef {
                    path: "assets/b.png".into(),
                    page_number: 1,
                },
            ]),
            &opts,
        );
        assert_eq!(
            result.markdown,
            "Body\n\n**Images from page 1:**\n- ![p1-1](assets/a.png)\n- ![p1-2](assets/b.png)\n"
        );
    }

    #[test]
    fn test_code_callout_placeholder() {
        let out = md(vec![
            DocumentNode::CodeBlock {
                language: Some("rust".into()),
                code: "let a_b = 1;".into(),
            },
            DocumentNode::Callout {
                kind: "warning".into(),
                content: vec![Inline::text("Mind the gap.")],
            },
            DocumentNode::Placeholder {
                page_number: 4,
                reason: "no extractable content".into(),
            },
        ]);
        assert_eq!(
            out,
            "```rust\nlet a_b = 1;\n```\n\n> [!warning] Warning\n> Mind the gap.\n\n<!-- page 4: no extractable content -->\n"
        );
    }

    #[test]
    fn test_links() {
        let out = md(vec![DocumentNode::Paragraph {
            content: vec![
                Inline::text("Visit "),
                Inline::Link {
                    text: "https://example.org/a_b".into(),
                    url: "https://example.org/a_b".into(),
                },
            ],
        }]);
        assert_eq!(out, "Visit [https://example.org/a\\_b](https://example.org/a_b)\n");
    }

    #[test]
    fn test_frontmatter() {
        let mut d = doc(vec![DocumentNode::paragraph("Body")]);
        d.metadata.title = Some("Report".into());
        let out = to_markdown(&d, &ConvertOptions::default().with_frontmatter(true));
        assert!(out.starts_with("---\ntitle: \"Report\"\npages: 1\n---\n\nBody"));
    }

    #[test]
    fn test_rendering_is_idempotent() {
        let d = doc(vec![
            DocumentNode::heading(1, "Title"),
            bullet("a", 0),
            DocumentNode::equation("x", true),
        ]);
        let opts = ConvertOptions::default();
        assert_eq!(render(&d, &opts), render(&d, &opts));
    }

    #[test]
    fn test_empty_document() {
        assert_eq!(md(vec![]), "\n");
    }
}
