//! Raw document and metadata types.

use super::Page;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

/// The raw document handed over by the extraction adapter.
///
/// Built once upstream and read, never modified, by the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    /// Document metadata (title, author, etc.)
    #[serde(default)]
    pub metadata: Metadata,

    /// Pages in reading order
    #[serde(default)]
    pub pages: Vec<Page>,
}

impl RawDocument {
    /// Create a new empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a document from pages.
    pub fn from_pages(pages: Vec<Page>) -> Self {
        Self {
            metadata: Metadata::default(),
            pages,
        }
    }

    /// Decode a raw document from JSON. A JSON `null` means no document.
    pub fn from_json(json: &str) -> Result<Self> {
        let doc: Option<RawDocument> = serde_json::from_str(json)?;
        doc.ok_or(Error::MissingDocument)
    }

    /// Decode a raw document from a reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let doc: Option<RawDocument> = serde_json::from_reader(reader)?;
        doc.ok_or(Error::MissingDocument)
    }

    /// Read a raw document from a JSON file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Get the number of pages in the document.
    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Add a page to the document.
    pub fn add_page(&mut self, page: Page) {
        self.pages.push(page);
    }

    /// Check if the document has any pages.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// Document metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Document title
    #[serde(default)]
    pub title: Option<String>,

    /// Document author
    #[serde(default)]
    pub author: Option<String>,

    /// Document subject
    #[serde(default)]
    pub subject: Option<String>,

    /// Source file name, as reported by the adapter
    #[serde(default)]
    pub source: Option<String>,

    /// Creation date
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
}

impl Metadata {
    /// Convert metadata to YAML frontmatter with the given page count.
    pub fn to_yaml_frontmatter(&self, page_count: u32) -> String {
        let mut lines = vec!["---".to_string()];

        if let Some(ref title) = self.title {
            lines.push(format!("title: \"{}\"", escape_yaml(title)));
        }
        if let Some(ref author) = self.author {
            lines.push(format!("author: \"{}\"", escape_yaml(author)));
        }
        if let Some(ref subject) = self.subject {
            lines.push(format!("subject: \"{}\"", escape_yaml(subject)));
        }
        if let Some(ref source) = self.source {
            lines.push(format!("source: \"{}\"", escape_yaml(source)));
        }
        if let Some(ref created) = self.created {
            lines.push(format!("created: {}", created.to_rfc3339()));
        }
        lines.push(format!("pages: {}", page_count));

        lines.push("---".to_string());
        lines.push(String::new());

        lines.join("\n")
    }
}

/// Escape special characters for YAML strings.
fn escape_yaml(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
