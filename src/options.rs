//! Conversion options.
//!
//! One immutable [`ConvertOptions`] value is threaded through every stage.
//! Nothing in the crate reads configuration from global state.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Number of pages processed in preview mode.
pub const PREVIEW_PAGES: usize = 3;

/// Where image references are placed in the Markdown output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImagePlacement {
    /// At the position of first reference
    #[default]
    Inline,
    /// Grouped by page at the end of the document
    DocumentEnd,
}

/// Thresholds for the table engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Minimum confidence for delimiter (`|`, `¦`) tables
    pub bordered_min_confidence: f32,
    /// Minimum confidence for tables stitched from several blocks
    pub stitched_min_confidence: f32,
    /// Minimum confidence for whitespace-aligned tables
    pub whitespace_min_confidence: f32,
    /// Minimum number of rows
    pub min_rows: usize,
    /// Minimum number of columns
    pub min_columns: usize,
    /// Maximum number of columns (above this, likely word-level splitting)
    pub max_columns: usize,
    /// Minimum horizontal gap between geometric columns (points)
    pub min_column_gap: f32,
    /// Tolerance when matching a span edge to a column edge (points)
    pub column_tolerance: f32,
    /// Fraction of numeric body cells that makes a column right-aligned
    pub numeric_ratio: f32,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            bordered_min_confidence: 0.9,
            stitched_min_confidence: 0.75,
            whitespace_min_confidence: 0.8,
            min_rows: 2,
            min_columns: 2,
            max_columns: 12,
            min_column_gap: 12.0,
            column_tolerance: 5.0,
            numeric_ratio: 0.8,
        }
    }
}

/// Thresholds for the equation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EquationConfig {
    /// Detect and convert math at all
    pub enabled: bool,
    /// Minimum share of math characters among a line's visible characters
    pub min_math_density: f32,
    /// Maximum offset of a centred line from the page centre, as a fraction of page width
    pub centered_tolerance: f32,
}

impl Default for EquationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_math_density: 0.05,
            centered_tolerance: 0.08,
        }
    }
}

/// Options for structuring and rendering a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    /// Font-size multiplier over body size for heading promotion
    pub heading_size_ratio: f32,

    /// Character ceiling for orphan merge eligibility
    pub orphan_max_len: usize,

    /// Line ceiling for orphan merge eligibility
    pub orphan_max_lines: usize,

    /// Promote short ALL-CAPS blocks to headings
    pub caps_to_headings: bool,

    /// Word ceiling for ALL-CAPS headings
    pub caps_heading_max_words: usize,

    /// Detect and remove repeating headers and footers
    pub remove_headers_footers: bool,

    /// Page coverage needed before a repeat counts as header/footer
    pub min_repeat_fraction: f32,

    /// Also unwrap hyphens before TitleCase continuations
    pub aggressive_hyphen: bool,

    /// Leave fenced code regions untouched
    pub protect_code_blocks: bool,

    /// Emit `---` between pages
    pub insert_page_breaks: bool,

    /// Keep image blocks and fill the image manifest
    pub export_images: bool,

    /// Where image references go in the Markdown
    pub image_placement: ImagePlacement,

    /// Directory prefix for relative image paths
    pub image_dir: String,

    /// Only process the first pages
    pub preview_only: bool,

    /// Turn "Note:"-style paragraphs into callouts
    pub convert_callouts: bool,

    /// Prepend YAML frontmatter with metadata
    pub include_frontmatter: bool,

    /// Table engine thresholds
    pub table: TableConfig,

    /// Equation engine thresholds
    pub equation: EquationConfig,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            heading_size_ratio: 1.15,
            orphan_max_len: 45,
            orphan_max_lines: 2,
            caps_to_headings: true,
            caps_heading_max_words: 12,
            remove_headers_footers: true,
            min_repeat_fraction: 0.6,
            aggressive_hyphen: false,
            protect_code_blocks: true,
            insert_page_breaks: false,
            export_images: false,
            image_placement: ImagePlacement::Inline,
            image_dir: "assets".to_string(),
            preview_only: false,
            convert_callouts: true,
            include_frontmatter: false,
            table: TableConfig::default(),
            equation: EquationConfig::default(),
        }
    }
}

impl ConvertOptions {
    /// Create new options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the heading size ratio.
    pub fn with_heading_size_ratio(mut self, ratio: f32) -> Self {
        self.heading_size_ratio = ratio;
        self
    }

    /// Set the orphan length ceiling.
    pub fn with_orphan_max_len(mut self, len: usize) -> Self {
        self.orphan_max_len = len;
        self
    }

    /// Enable or disable ALL-CAPS heading promotion.
    pub fn with_caps_to_headings(mut self, enabled: bool) -> Self {
        self.caps_to_headings = enabled;
        self
    }

    /// Enable or disable header/footer removal.
    pub fn with_remove_headers_footers(mut self, enabled: bool) -> Self {
        self.remove_headers_footers = enabled;
        self
    }

    /// Set the header/footer page coverage threshold.
    pub fn with_min_repeat_fraction(mut self, fraction: f32) -> Self {
        self.min_repeat_fraction = fraction;
        self
    }

    /// Enable or disable TitleCase hyphen unwrapping.
    pub fn with_aggressive_hyphen(mut self, enabled: bool) -> Self {
        self.aggressive_hyphen = enabled;
        self
    }

    /// Enable or disable fenced code protection.
    pub fn with_protect_code_blocks(mut self, enabled: bool) -> Self {
        self.protect_code_blocks = enabled;
        self
    }

    /// Enable or disable page break rules.
    pub fn with_page_breaks(mut self, enabled: bool) -> Self {
        self.insert_page_breaks = enabled;
        self
    }

    /// Enable or disable image export.
    pub fn with_images(mut self, enabled: bool) -> Self {
        self.export_images = enabled;
        self
    }

    /// Set image placement.
    pub fn with_image_placement(mut self, placement: ImagePlacement) -> Self {
        self.image_placement = placement;
        self
    }

    /// Set the directory prefix for relative image paths.
    pub fn with_image_dir(mut self, dir: impl Into<String>) -> Self {
        self.image_dir = dir.into();
        self
    }

    /// Enable or disable preview mode.
    pub fn with_preview(mut self, enabled: bool) -> Self {
        self.preview_only = enabled;
        self
    }

    /// Enable or disable callout conversion.
    pub fn with_callouts(mut self, enabled: bool) -> Self {
        self.convert_callouts = enabled;
        self
    }

    /// Enable or disable YAML frontmatter.
    pub fn with_frontmatter(mut self, enabled: bool) -> Self {
        self.include_frontmatter = enabled;
        self
    }

    /// Replace the table thresholds.
    pub fn with_table_config(mut self, config: TableConfig) -> Self {
        self.table = config;
        self
    }

    /// Replace the equation thresholds.
    pub fn with_equation_config(mut self, config: EquationConfig) -> Self {
        self.equation = config;
        self
    }

    /// Maximum number of pages to process.
    pub fn page_limit(&self) -> Option<usize> {
        if self.preview_only {
            Some(PREVIEW_PAGES)
        } else {
            None
        }
    }

    /// Reject settings that would make the heuristics meaningless.
    pub fn validate(&self) -> Result<()> {
        if !self.heading_size_ratio.is_finite() || self.heading_size_ratio <= 0.0 {
            return Err(Error::InvalidOptions(format!(
                "heading_size_ratio must be a positive number, got {}",
                self.heading_size_ratio
            )));
        }
        if !(0.0..=1.0).contains(&self.min_repeat_fraction) {
            return Err(Error::InvalidOptions(format!(
                "min_repeat_fraction must be within 0..=1, got {}",
                self.min_repeat_fraction
            )));
        }
        let t = &self.table;
        for (name, value) in [
            ("bordered_min_confidence", t.bordered_min_confidence),
            ("stitched_min_confidence", t.stitched_min_confidence),
            ("whitespace_min_confidence", t.whitespace_min_confidence),
            ("numeric_ratio", t.numeric_ratio),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidOptions(format!(
                    "table.{} must be within 0..=1, got {}",
                    name, value
                )));
            }
        }
        if t.min_rows < 2 || t.min_columns < 2 || t.max_columns < t.min_columns {
            return Err(Error::InvalidOptions(
                "table row/column limits must allow at least a 2x2 table".to_string(),
            ));
        }
        if !self.equation.min_math_density.is_finite() || self.equation.min_math_density < 0.0 {
            return Err(Error::InvalidOptions(
                "equation.min_math_density must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}
