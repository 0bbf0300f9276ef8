//! Cell plan for a wiki table, produced by the layout pass

use crate::device::TableHeading;
use serde::{Deserialize, Serialize};

/// Text used for cells with nothing to show
pub const NOT_AVAILABLE: &str = "{{n/a}}";

/// What a cell shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Column {
    /// Placeholder for a marketing version the catalog doesn't carry
    MarketingVersionFiller,
    Version,
    /// OS version reported by packages whose marketing version differs
    PurportedVersion,
    Build,
    PrerequisiteVersion,
    PrerequisiteBuild,
    CompatibilityVersion,
    ReleaseDate,
    ReleaseType,
    Url,
    Size,
}

impl Column {
    /// Header text, for columns that have one
    pub fn header(self) -> Option<&'static str> {
        match self {
            Column::Version => Some("Version"),
            Column::Build => Some("Build"),
            Column::PrerequisiteVersion => Some("Prerequisite Version"),
            Column::PrerequisiteBuild => Some("Prerequisite Build"),
            Column::CompatibilityVersion => Some("Compatibility Version"),
            Column::ReleaseDate => Some("Release Date"),
            Column::ReleaseType => Some("Release Type"),
            Column::Url => Some("OTA Download URL"),
            Column::Size => Some("File Size"),
            Column::MarketingVersionFiller | Column::PurportedVersion => None,
        }
    }
}

/// A table cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub column: Column,
    pub rowspan: usize,
    pub colspan: usize,
    pub content: String,
}

impl Cell {
    /// Create a single-row, single-column cell
    pub fn new(column: Column, content: impl Into<String>) -> Self {
        Self {
            column,
            rowspan: 1,
            colspan: 1,
            content: content.into(),
        }
    }

    /// Set the number of rows the cell covers
    pub fn spanning(mut self, rows: usize) -> Self {
        self.rowspan = rows.max(1);
        self
    }

    /// Set the number of columns the cell covers
    pub fn across(mut self, columns: usize) -> Self {
        self.colspan = columns.max(1);
        self
    }
}

/// One table row: the cells that start on it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub cells: Vec<Cell>,
}

impl Row {
    /// Find the cell for a column, if this row starts one
    pub fn get(&self, column: Column) -> Option<&Cell> {
        self.cells.iter().find(|c| c.column == column)
    }
}

/// Heading and notices around the table body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableFrame {
    pub heading: TableHeading,
    /// Mention the dummy update that points users at iTunes
    pub stub_notice: bool,
}

/// A laid-out wiki table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WikiTable {
    /// Header columns, in order
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
    /// Present when the table is emitted whole rather than as rows only
    pub frame: Option<TableFrame>,
}

impl WikiTable {
    /// Get the number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Sum of the row spans of every cell in a column
    pub fn span_total(&self, column: Column) -> usize {
        self.rows
            .iter()
            .filter_map(|r| r.get(column))
            .map(|c| c.rowspan)
            .sum()
    }
}
