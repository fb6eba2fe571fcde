//! Rendering result with image manifest and statistics.

use std::collections::BTreeMap;

use crate::model::{DocumentNode, Inline};
use serde::{Deserialize, Serialize};

/// Page number → asset paths referenced on that page, in order.
pub type ImageManifest = BTreeMap<u32, Vec<String>>;

/// Result of rendering a structured document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderResult {
    /// The rendered Markdown
    pub markdown: String,

    /// Image assets the caller should write next to the Markdown
    pub images: ImageManifest,

    /// Node and word counts
    pub stats: ConversionStats,
}

impl RenderResult {
    /// Create a new render result.
    pub fn new(markdown: String, images: ImageManifest, stats: ConversionStats) -> Self {
        Self {
            markdown,
            images,
            stats,
        }
    }

    /// Total number of image references.
    pub fn image_count(&self) -> usize {
        self.images.values().map(|v| v.len()).sum()
    }

    /// Manifest as pretty-printed JSON.
    pub fn manifest_json(&self) -> crate::Result<String> {
        serde_json::to_string_pretty(&self.images)
            .map_err(|e| crate::Error::Render(format!("manifest serialization error: {}", e)))
    }
}

/// Counts collected while rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Pages that went through the pipeline
    pub page_count: u32,

    /// Heading nodes
    pub heading_count: u32,

    /// Paragraph nodes
    pub paragraph_count: u32,

    /// List item nodes
    pub list_item_count: u32,

    /// Table nodes
    pub table_count: u32,

    /// Equation nodes plus inline math segments
    pub equation_count: u32,

    /// Image references
    pub image_count: u32,

    /// Fenced code blocks
    pub code_block_count: u32,

    /// Callouts
    pub callout_count: u32,

    /// Pages replaced by a placeholder
    pub placeholder_count: u32,

    /// Approximate word count of the Markdown (whitespace-separated tokens)
    pub word_count: u32,
}

impl ConversionStats {
    /// Create new empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one node.
    pub fn add_node(&mut self, node: &DocumentNode) {
        match node {
            DocumentNode::Heading { .. } => self.heading_count += 1,
            DocumentNode::Paragraph { content } => {
                self.paragraph_count += 1;
                self.add_inline_math(content);
            }
            DocumentNode::ListItem { content, .. } => {
                self.list_item_count += 1;
                self.add_inline_math(content);
            }
            DocumentNode::Callout { content, .. } => {
                self.callout_count += 1;
                self.add_inline_math(content);
            }
            DocumentNode::Table(_) => self.table_count += 1,
            DocumentNode::Equation { .. } => self.equation_count += 1,
            DocumentNode::ImageRef { .. } => self.image_count += 1,
            DocumentNode::CodeBlock { .. } => self.code_block_count += 1,
            DocumentNode::Placeholder { .. } => self.placeholder_count += 1,
            DocumentNode::PageBreak => {}
        }
    }

    fn add_inline_math(&mut self, content: &[Inline]) {
        self.equation_count += content
            .iter()
            .filter(|i| matches!(i, Inline::Math { .. }))
            .count() as u32;
    }

    /// Add the word count of rendered text.
    pub fn count_words(&mut self, text: &str) {
        self.word_count += text.split_whitespace().count() as u32;
    }

    /// Merge another stats instance into this one.
    pub fn merge(&mut self, other: &ConversionStats) {
        self.page_count += other.page_count;
        self.heading_count += other.heading_count;
        self.paragraph_count += other.paragraph_count;
        self.list_item_count += other.list_item_count;
        self.table_count += other.table_count;
        self.equation_count += other.equation_count;
        self.image_count += other.image_count;
        self.code_block_count += other.code_block_count;
        self.callout_count += other.callout_count;
        self.placeholder_count += other.placeholder_count;
        self.word_count += other.word_count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_node_counts_inline_math() {
        let mut stats = ConversionStats::new();
        stats.add_node(&DocumentNode::Paragraph {
            content: vec![Inline::text("so "), Inline::math("x^{2}")],
        });
        stats.add_node(&DocumentNode::equation("y", true));
        stats.add_node(&DocumentNode::PageBreak);
        assert_eq!(stats.paragraph_count, 1);
        assert_eq!(stats.equation_count, 2);
    }

    #[test]
    fn test_count_words() {
        let mut stats = ConversionStats::new();
        stats.count_words("# Title\n\nHello, world!");
        assert_eq!(stats.word_count, 4);
    }

    #[test]
    fn test_merge() {
        let mut a = ConversionStats {
            table_count: 2,
            ..Default::default()
        };
        let b = ConversionStats {
            table_count: 1,
            image_count: 4,
            ..Default::default()
        };
        a.merge(&b);
        assert_eq!(a.table_count, 3);
        assert_eq!(a.image_count, 4);
    }

    #[test]
    fn test_manifest_json() {
        let mut images = ImageManifest::new();
        images.insert(2, vec!["assets/a.png".into(), "assets/b.png".into()]);
        let result = RenderResult::new(String::new(), images, ConversionStats::new());
        assert_eq!(result.image_count(), 2);
        let json = result.manifest_json().unwrap();
        assert!(json.contains("\"2\""));
        assert!(json.contains("assets/b.png"));
    }
}
