//! Rendering of structured documents to Markdown and JSON.

mod json;
mod markdown;
mod result;

pub use json::{to_json, JsonFormat};
pub use markdown::{escape_markdown, render, to_markdown, MarkdownRenderer};
pub use result::{ConversionStats, ImageManifest, RenderResult};
