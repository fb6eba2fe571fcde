//! # pagemd
//!
//! Turns per-page text geometry into structured Markdown.
//!
//! An extraction adapter (a PDF parser, an OCR engine) hands over pages of
//! positioned text spans. This crate recovers the document structure from
//! that geometry: reading order, headings, paragraphs, lists, tables and
//! equations. It then renders Markdown plus a manifest of image assets.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pagemd::{convert, ConvertOptions, RawDocument};
//!
//! fn main() -> pagemd::Result<()> {
//!     let doc = RawDocument::from_path("document.json")?;
//!     let result = convert(&doc, &ConvertOptions::default())?;
//!     println!("{}", result.markdown);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Two-pass structuring**: font statistics and header/footer detection
//!   see the whole document before any page is classified
//! - **Tables**: delimiter, multi-block and whitespace-aligned strategies
//!   with confidence-based abstention
//! - **Math**: Unicode math to LaTeX, inline or display
//! - **Degraded but complete**: a broken page becomes a placeholder, never
//!   an error
//! - **Parallel batches**: independent documents convert on Rayon workers

pub mod error;
pub mod model;
pub mod options;
pub mod pipeline;
pub mod render;
pub mod structure;

// Re-export commonly used types
pub use error::{Error, Result};
pub use model::{
    Block, BlockKind, BoundingBox, ColumnAlignment, DocumentNode, Inline, Line, ListMarker,
    Metadata, Page, RawDocument, Span, StructuredDocument, Table,
};
pub use options::{ConvertOptions, EquationConfig, ImagePlacement, TableConfig};
pub use pipeline::{CancellationToken, Conversion, Pipeline, ProgressEvent};
pub use render::{ConversionStats, ImageManifest, JsonFormat, RenderResult};

use rayon::prelude::*;
use std::path::Path;

/// Structure a raw document without rendering it.
///
/// # Example
///
/// ```
/// use pagemd::{structure, BoundingBox, Block, ConvertOptions, Line, Page, RawDocument, Span};
///
/// let span = Span::new("Hello world", "Times", 11.0, BoundingBox::new(72.0, 72.0, 140.0, 83.0));
/// let page = Page::letter(1).with_block(Block::new(vec![Line::new(vec![span])]));
/// let doc = structure(&RawDocument::from_pages(vec![page]), &ConvertOptions::default()).unwrap();
/// assert_eq!(doc.nodes.len(), 1);
/// ```
pub fn structure(doc: &RawDocument, options: &ConvertOptions) -> Result<StructuredDocument> {
    let conversion = Pipeline::new(options.clone()).run(doc)?;
    Ok(conversion.document)
}

/// Structure a raw document and render it to Markdown.
///
/// # Example
///
/// ```
/// use pagemd::{convert, BoundingBox, Block, ConvertOptions, Line, Page, RawDocument, Span};
///
/// let span = Span::new("• First bullet point", "Times", 11.0, BoundingBox::new(72.0, 72.0, 200.0, 83.0));
/// let page = Page::letter(1).with_block(Block::new(vec![Line::new(vec![span])]));
/// let result = convert(&RawDocument::from_pages(vec![page]), &ConvertOptions::default()).unwrap();
/// assert_eq!(result.markdown, "- First bullet point\n");
/// ```
pub fn convert(doc: &RawDocument, options: &ConvertOptions) -> Result<RenderResult> {
    let structured = structure(doc, options)?;
    Ok(render::render(&structured, options))
}

/// Convert a raw document given as JSON.
///
/// A JSON `null` is the absent-document case and fails with
/// [`Error::MissingDocument`].
pub fn convert_json(json: &str, options: &ConvertOptions) -> Result<RenderResult> {
    let doc = RawDocument::from_json(json)?;
    convert(&doc, options)
}

/// Convert a raw document stored in a JSON file.
///
/// # Example
///
/// ```no_run
/// use pagemd::{convert_file, ConvertOptions};
///
/// let result = convert_file("document.json", &ConvertOptions::default()).unwrap();
/// std::fs::write("output.md", result.markdown).unwrap();
/// ```
pub fn convert_file<P: AsRef<Path>>(path: P, options: &ConvertOptions) -> Result<RenderResult> {
    let doc = RawDocument::from_path(path)?;
    convert(&doc, options)
}

/// Convert independent documents in parallel.
///
/// Results are returned in input order; one failing document does not
/// affect the others.
pub fn convert_many(docs: &[RawDocument], options: &ConvertOptions) -> Vec<Result<RenderResult>> {
    docs.par_iter().map(|doc| convert(doc, options)).collect()
}

/// Structure a raw document and serialize the node tree as JSON.
pub fn to_json(doc: &RawDocument, options: &ConvertOptions, format: JsonFormat) -> Result<String> {
    let structured = structure(doc, options)?;
    render::to_json(&structured, format)
}
