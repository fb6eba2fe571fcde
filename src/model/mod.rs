//! Document model types.
//!
//! Two families of types live here: the raw model delivered by the
//! extraction adapter (spans, lines, blocks, pages) and the structured
//! model produced by the pipeline (document nodes). Stages never mutate
//! their input; each produces a new, richer value.

mod document;
mod node;
mod page;
mod table;
mod text;

pub use document::{Metadata, RawDocument};
pub use node::{inline_text, DocumentNode, Inline, ListMarker, StructuredDocument};
pub use page::{Block, BlockKind, Page};
pub use table::{ColumnAlignment, Table};
pub use text::{dominant_size, BoundingBox, Line, Span, DROP_CAP_RATIO};
