//! Structuring stages.
//!
//! Each stage takes the previous stage's output by value and returns a new
//! sequence; none of them reaches into another stage's internals.
//!
//! Pass 1 (whole document): [`header_footer`] and [`stats`].
//! Pass 2 (per page): [`layout`] → [`classifier`] → [`table_detector`] →
//! [`equation`] → [`reconstruct`].

pub mod classifier;
pub mod cleanup;
pub mod equation;
pub mod header_footer;
pub mod layout;
pub mod reconstruct;
pub mod stats;
pub mod table_detector;

pub use classifier::{classify, Classifier};
pub use equation::{to_latex, EquationEngine};
pub use header_footer::HeaderFooterDetector;
pub use layout::reading_order;
pub use reconstruct::TextReconstructor;
pub use stats::FontStatistics;
pub use table_detector::TableEngine;

use crate::model::{Block, DocumentNode};

/// An element of a page while it moves through pass 2.
///
/// Stages turn `Block`s they understand into finished `Node`s and leave
/// the rest for later stages.
#[derive(Debug, Clone, PartialEq)]
pub enum PageItem {
    /// Raw block still to be structured
    Block(Block),
    /// Finished node
    Node(DocumentNode),
}

impl PageItem {
    /// The block, if this item has not been structured yet.
    pub fn as_block(&self) -> Option<&Block> {
        match self {
            PageItem::Block(b) => Some(b),
            PageItem::Node(_) => None,
        }
    }
}

impl From<Block> for PageItem {
    fn from(block: Block) -> Self {
        PageItem::Block(block)
    }
}

impl From<DocumentNode> for PageItem {
    fn from(node: DocumentNode) -> Self {
        PageItem::Node(node)
    }
}
