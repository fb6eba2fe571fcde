//! Structured document nodes.

use super::{Metadata, Table};
use serde::{Deserialize, Serialize};

/// Inline content within a paragraph or list item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inline {
    /// Plain text, escaped on rendering
    Text {
        /// Text content
        text: String,
    },

    /// Text set in a bold and/or italic font
    Emphasis {
        /// Text content
        text: String,
        /// Bold weight
        #[serde(default)]
        bold: bool,
        /// Italic or oblique style
        #[serde(default)]
        italic: bool,
    },

    /// A hyperlink
    Link {
        /// Link text
        text: String,
        /// Link target
        url: String,
    },

    /// Math inside prose; never escaped or normalized
    Math {
        /// LaTeX source
        latex: String,
        /// Rendered with `$$` instead of `$`
        #[serde(default)]
        display: bool,
    },
}

impl Inline {
    /// Plain text inline.
    pub fn text(text: impl Into<String>) -> Self {
        Inline::Text { text: text.into() }
    }

    /// Inline math.
    pub fn math(latex: impl Into<String>) -> Self {
        Inline::Math {
            latex: latex.into(),
            display: false,
        }
    }

    /// Text as it would read without markup.
    pub fn plain_text(&self) -> &str {
        match self {
            Inline::Text { text } | Inline::Emphasis { text, .. } | Inline::Link { text, .. } => {
                text
            }
            Inline::Math { latex, .. } => latex,
        }
    }
}

/// Concatenate the plain text of a run of inlines.
pub fn inline_text(content: &[Inline]) -> String {
    content.iter().map(|i| i.plain_text()).collect()
}

/// Marker of a list item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "style", rename_all = "snake_case")]
pub enum ListMarker {
    /// Bullet glyph
    Bullet,
    /// `1.` or `1)`
    Numbered {
        /// Item number as printed
        number: u32,
    },
    /// `a.` or `a)`
    Lettered {
        /// Item letter as printed
        letter: char,
    },
}

/// A structured document node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DocumentNode {
    /// Heading with level 1-6
    Heading {
        /// Heading level
        level: u8,
        /// Heading text
        text: String,
    },

    /// Paragraph of prose
    Paragraph {
        /// Inline content
        content: Vec<Inline>,
    },

    /// List item
    ListItem {
        /// Marker as detected
        marker: ListMarker,
        /// Nesting depth, 0 for top level
        indent: u8,
        /// Inline content after the marker
        content: Vec<Inline>,
    },

    /// Table
    Table(Table),

    /// Standalone equation
    Equation {
        /// LaTeX source
        latex: String,
        /// Display (`$$`) or inline (`$`)
        display: bool,
    },

    /// Reference to an exported image
    ImageRef {
        /// Relative asset path
        path: String,
        /// Page the image came from
        page_number: u32,
    },

    /// Boundary between two pages
    PageBreak,

    /// Fenced code, kept verbatim
    CodeBlock {
        /// Info string after the opening fence
        language: Option<String>,
        /// Code lines joined with newlines
        code: String,
    },

    /// Admonition such as "Note:" followed by its body
    Callout {
        /// Lowercase label ("note", "tip", ...)
        kind: String,
        /// Body text
        content: Vec<Inline>,
    },

    /// Stand-in for a page that could not be structured
    Placeholder {
        /// Page number
        page_number: u32,
        /// Why the page was skipped
        reason: String,
    },
}

impl DocumentNode {
    /// Create a heading node, clamping the level to 1-6.
    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        DocumentNode::Heading {
            level: level.clamp(1, 6),
            text: text.into(),
        }
    }

    /// Create a paragraph holding plain text.
    pub fn paragraph(text: impl Into<String>) -> Self {
        DocumentNode::Paragraph {
            content: vec![Inline::text(text)],
        }
    }

    /// Create an equation node.
    pub fn equation(latex: impl Into<String>, display: bool) -> Self {
        DocumentNode::Equation {
            latex: latex.into(),
            display,
        }
    }

    /// Short name of the node type.
    pub fn kind_name(&self) -> &'static str {
        match self {
            DocumentNode::Heading { .. } => "heading",
            DocumentNode::Paragraph { .. } => "paragraph",
            DocumentNode::ListItem { .. } => "list_item",
            DocumentNode::Table(_) => "table",
            DocumentNode::Equation { .. } => "equation",
            DocumentNode::ImageRef { .. } => "image_ref",
            DocumentNode::PageBreak => "page_break",
            DocumentNode::CodeBlock { .. } => "code_block",
            DocumentNode::Callout { .. } => "callout",
            DocumentNode::Placeholder { .. } => "placeholder",
        }
    }

    /// Plain text of the node without markup.
    pub fn plain_text(&self) -> String {
        match self {
            DocumentNode::Heading { text, .. } => text.clone(),
            DocumentNode::Paragraph { content }
            | DocumentNode::ListItem { content, .. }
            | DocumentNode::Callout { content, .. } => inline_text(content),
            DocumentNode::Table(table) => table.plain_text(),
            DocumentNode::Equation { latex, .. } => latex.clone(),
            DocumentNode::CodeBlock { code, .. } => code.clone(),
            DocumentNode::ImageRef { .. }
            | DocumentNode::PageBreak
            | DocumentNode::Placeholder { .. } => String::new(),
        }
    }
}

/// The fully classified, ordered node sequence handed to the renderer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredDocument {
    /// Metadata carried over from the raw document
    pub metadata: Metadata,

    /// Number of pages that were structured
    pub page_count: u32,

    /// Nodes in reading order
    pub nodes: Vec<DocumentNode>,
}

impl StructuredDocument {
    /// Create an empty structured document.
    pub fn new(metadata: Metadata) -> Self {
        Self {
            metadata,
            page_count: 0,
            nodes: Vec::new(),
        }
    }

    /// Append a node.
    pub fn push(&mut self, node: DocumentNode) {
        self.nodes.push(node);
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether there are no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate over heading nodes as (level, text).
    pub fn headings(&self) -> impl Iterator<Item = (u8, &str)> {
        self.nodes.iter().filter_map(|n| match n {
            DocumentNode::Heading { level, text } => Some((*level, text.as_str())),
            _ => None,
        })
    }

    /// Iterate over table nodes.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.nodes.iter().filter_map(|n| match n {
            DocumentNode::Table(t) => Some(t),
            _ => None,
        })
    }

    /// Iterate over equation nodes as (latex, display).
    pub fn equations(&self) -> impl Iterator<Item = (&str, bool)> {
        self.nodes.iter().filter_map(|n| match n {
            DocumentNode::Equation { latex, display } => Some((latex.as_str(), *display)),
            _ => None,
        })
    }
}
