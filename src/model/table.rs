//! Table node.

use serde::{Deserialize, Serialize};

/// Horizontal alignment of a table column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnAlignment {
    /// Left aligned (default)
    #[default]
    Left,
    /// Right aligned (numeric columns)
    Right,
    /// Centered
    Center,
}

/// A rebuilt table. Rows are always rectangular.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Cell text, row by row
    pub rows: Vec<Vec<String>>,

    /// Whether the first row is a header
    pub has_header: bool,

    /// One alignment per column
    pub column_alignment: Vec<ColumnAlignment>,
}

impl Table {
    /// Create a table, padding short rows with empty cells.
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        let width = rows.iter().map(|r| r.len()).max().unwrap_or(0);
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self {
            rows,
            has_header: false,
            column_alignment: vec![ColumnAlignment::Left; width],
        }
    }

    /// Create a table from string slices.
    pub fn from_strings<S: AsRef<str>>(rows: &[Vec<S>]) -> Self {
        Self::new(
            rows.iter()
                .map(|r| r.iter().map(|c| c.as_ref().to_string()).collect())
                .collect(),
        )
    }

    /// Set whether the first row is a header.
    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    /// Set column alignments; missing entries default to left.
    pub fn with_alignment(mut self, mut alignment: Vec<ColumnAlignment>) -> Self {
        alignment.resize(self.column_count(), ColumnAlignment::Left);
        self.column_alignment = alignment;
        self
    }

    /// Get the number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Get the number of columns.
    pub fn column_count(&self) -> usize {
        self.rows.first().map(|r| r.len()).unwrap_or(0)
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.column_count() == 0
    }

    /// Header row, if marked.
    pub fn header(&self) -> Option<&[String]> {
        if self.has_header {
            self.rows.first().map(|r| r.as_slice())
        } else {
            None
        }
    }

    /// Rows after the header.
    pub fn body(&self) -> &[Vec<String>] {
        if self.has_header && !self.rows.is_empty() {
            &self.rows[1..]
        } else {
            &self.rows
        }
    }

    /// Whether every row has the same number of cells.
    pub fn is_rectangular(&self) -> bool {
        let width = self.column_count();
        self.rows.iter().all(|r| r.len() == width)
    }

    /// Get plain text representation of the table.
    pub fn plain_text(&self) -> String {
        self.rows
            .iter()
            .map(|row| row.join("\t"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_padding() {
        let table = Table::from_strings(&[vec!["a", "b", "c"], vec!["d"], vec!["e", "f"]]);
        assert!(table.is_rectangular());
        assert_eq!(table.column_count(), 3);
        assert_eq!(table.rows[1], vec!["d", "", ""]);
        assert_eq!(table.column_alignment.len(), 3);
    }

    #[test]
    fn test_header_and_body() {
        let table = Table::from_strings(&[vec!["h1", "h2"], vec!["1", "2"]]).with_header(true);
        assert_eq!(table.header().unwrap(), &["h1".to_string(), "h2".to_string()]);
        assert_eq!(table.body().len(), 1);

        let table = table.with_header(false);
        assert!(table.header().is_none());
        assert_eq!(table.body().len(), 2);
    }

    #[test]
    fn test_alignment_resized() {
        let table = Table::from_strings(&[vec!["a", "b"]]).with_alignment(vec![ColumnAlignment::Right]);
        assert_eq!(
            table.column_alignment,
            vec![ColumnAlignment::Right, ColumnAlignment::Left]
        );
    }

    #[test]
    fn test_plain_text() {
        let table = Table::from_strings(&[vec!["a", "b"], vec!["c", "d"]]);
        assert_eq!(table.plain_text(), "a\tb\nc\td");
    }
}
