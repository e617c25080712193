//! Rendered document model.
//!
//! A document is an ordered list of draw instructions. Coordinates are points
//! measured from the top-left corner of the current page; a `PageBreak` starts
//! the next page.

use serde::{Deserialize, Serialize};

use super::error::RenderError;
use super::template::{Align, PaperSize};

/// Text weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextStyle {
    /// Body text.
    Regular,
    /// Emphasized text.
    Bold,
    /// Document title.
    Title,
}

/// Role of a table row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowKind {
    /// Column headings.
    Header,
    /// A line item.
    Item,
    /// A totals line (label, value).
    Total,
}

/// One cell of a table row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    /// Left edge.
    pub x: u32,
    /// Width.
    pub width: u32,
    /// Wrapped lines, top to bottom.
    pub lines: Vec<String>,
    /// Alignment.
    pub align: Align,
}

impl Cell {
    /// Cell text with wrapped lines joined by spaces.
    #[must_use]
    pub fn text(&self) -> String {
        self.lines.join(" ")
    }
}

/// A single drawing step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DrawInstruction {
    /// A block of text on one line.
    Text {
        /// Left edge.
        x: u32,
        /// Top edge.
        y: u32,
        /// Available width.
        width: u32,
        /// Content.
        text: String,
        /// Weight.
        style: TextStyle,
        /// Alignment within `width`.
        align: Align,
    },
    /// A table row.
    TableRow {
        /// Top edge.
        y: u32,
        /// Row height.
        height: u32,
        /// Role of the row.
        kind: RowKind,
        /// Cells, left to right.
        cells: Vec<Cell>,
    },
    /// A horizontal line.
    Rule {
        /// Start x.
        x1: u32,
        /// End x.
        x2: u32,
        /// Vertical position.
        y: u32,
    },
    /// End of the current page.
    PageBreak,
}

/// Output of the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedDocument {
    /// Paper size.
    pub paper_size: PaperSize,
    /// Page width in points.
    pub width: u32,
    /// Page height in points.
    pub height: u32,
    /// Number of pages.
    pub page_count: u32,
    /// Draw instructions in order.
    pub instructions: Vec<DrawInstruction>,
}

impl RenderedDocument {
    /// Serializes the document as JSON.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::Serialization` if encoding fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, RenderError> {
        serde_json::to_vec(self).map_err(|e| RenderError::Serialization(e.to_string()))
    }

    /// Table rows of the given kind, in order.
    pub fn rows(&self, kind: RowKind) -> impl Iterator<Item = &[Cell]> {
        self.instructions.iter().filter_map(move |i| match i {
            DrawInstruction::TableRow { kind: k, cells, .. } if *k == kind => {
                Some(cells.as_slice())
            }
            _ => None,
        })
    }

    /// Totals rows as `(label, value)` pairs.
    #[must_use]
    pub fn totals(&self) -> Vec<(String, String)> {
        self.rows(RowKind::Total)
            .filter_map(|cells| match cells {
                [label, value] => Some((label.text(), value.text())),
                _ => None,
            })
            .collect()
    }
}
