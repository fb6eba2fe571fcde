//! Error types for pagemd.
//!
//! Only whole-document conditions are errors. Page and block level problems
//! degrade the output instead of failing the conversion.

use std::io;
use thiserror::Error;

/// Result type alias for pagemd operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a conversion.
#[derive(Error, Debug)]
pub enum Error {
    /// No raw document was supplied.
    #[error("No document to structure")]
    MissingDocument,

    /// The raw document has zero pages.
    #[error("Document has no pages")]
    EmptyDocument,

    /// A configuration value is out of range.
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// The raw document JSON could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error when reading a raw document.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error during rendering (Markdown, JSON).
    #[error("Rendering error: {0}")]
    Render(String),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error means there was nothing to structure at all.
    pub fn is_structure_fatal(&self) -> bool {
        matches!(self, Error::MissingDocument | Error::EmptyDocument)
    }
}
