//! Invoice template configuration.
//!
//! All measurements are whole PDF points (1/72 inch).

use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};

use crate::currency::MoneyFormat;

use super::error::RenderError;

/// Supported paper sizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaperSize {
    /// US Letter, 8.5 × 11 in.
    #[default]
    Letter,
    /// ISO A4, 210 × 297 mm.
    A4,
    /// US Legal, 8.5 × 14 in.
    Legal,
}

impl PaperSize {
    /// Page `(width, height)` in points.
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Letter => (612, 792),
            Self::A4 => (595, 842),
            Self::Legal => (612, 1008),
        }
    }
}

/// Page margins in points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Margins {
    /// Top.
    pub top: u32,
    /// Right.
    pub right: u32,
    /// Bottom.
    pub bottom: u32,
    /// Left.
    pub left: u32,
}

impl Margins {
    /// Same margin on all four sides.
    #[must_use]
    pub const fn uniform(points: u32) -> Self {
        Self {
            top: points,
            right: points,
            bottom: points,
            left: points,
        }
    }
}

/// Data shown in a line-item column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// Line description (wrapped).
    Description,
    /// Quantity or hours.
    Quantity,
    /// Unit rate.
    Rate,
    /// Line amount.
    Amount,
    /// UTBMS code.
    BillingCode,
    /// Date of service.
    ServiceDate,
}

/// Horizontal alignment within a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    /// Left.
    Left,
    /// Centered.
    Center,
    /// Right.
    Right,
}

/// One column of the line-item table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// What the column shows.
    pub kind: ColumnKind,
    /// Header label.
    pub header: String,
    /// Share of the content width, in percent.
    pub width_percent: u32,
    /// Alignment of cell text.
    pub align: Align,
}

impl ColumnSpec {
    fn new(kind: ColumnKind, header: &str, width_percent: u32, align: Align) -> Self {
        Self {
            kind,
            header: header.to_string(),
            width_percent,
            align,
        }
    }
}

/// Layout and formatting options for a rendered invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// Paper size.
    pub paper_size: PaperSize,
    /// Page margins.
    pub margins: Margins,
    /// Line-item columns, left to right.
    pub columns: Vec<ColumnSpec>,
    /// How amounts are printed.
    pub money_format: MoneyFormat,
    /// `strftime` pattern for dates.
    pub date_format: String,
    /// Firm name printed at the top of the first page.
    pub firm_name: Option<String>,
    /// Text repeated at the top of every page. `{page}` and `{pages}` are
    /// substituted.
    pub header_text: Option<String>,
    /// Text at the bottom of every page, with the same placeholders.
    pub footer_text: String,
    /// Print invoice notes.
    pub show_notes: bool,
    /// Print payment terms.
    pub show_terms: bool,
    /// Body font size in points.
    pub font_size: u32,
    /// Baseline-to-baseline distance in points.
    pub line_height: u32,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            paper_size: PaperSize::Letter,
            margins: Margins::uniform(50),
            columns: vec![
                ColumnSpec::new(ColumnKind::ServiceDate, "Date", 14, Align::Left),
                ColumnSpec::new(ColumnKind::BillingCode, "Code", 8, Align::Left),
                ColumnSpec::new(ColumnKind::Description, "Description", 42, Align::Left),
                ColumnSpec::new(ColumnKind::Quantity, "Qty", 8, Align::Right),
                ColumnSpec::new(ColumnKind::Rate, "Rate", 13, Align::Right),
                ColumnSpec::new(ColumnKind::Amount, "Amount", 15, Align::Right),
            ],
            money_format: MoneyFormat::Symbol,
            date_format: "%b %-d, %Y".to_string(),
            firm_name: None,
            header_text: None,
            footer_text: "Page {page} of {pages}".to_string(),
            show_notes: true,
            show_terms: true,
            font_size: 10,
            line_height: 14,
        }
    }
}

impl TemplateConfig {
    /// Page `(width, height)` in points.
    #[must_use]
    pub const fn page_size(&self) -> (u32, u32) {
        self.paper_size.dimensions()
    }

    /// Checks that the template can lay out at least a table header and one
    /// row per page.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::InvalidTemplate` describing the first problem.
    pub fn validate(&self) -> Result<(), RenderError> {
        let (width, height) = self.page_size();
        let invalid = |msg: &str| Err(RenderError::InvalidTemplate(msg.to_string()));

        if self.columns.is_empty() {
            return invalid("at least one column is required");
        }
        if self.columns.iter().any(|c| c.width_percent == 0) {
            return invalid("column widths must be positive");
        }
        // Sums are widened so caller-supplied values cannot wrap.
        let total_width: u64 = self.columns.iter().map(|c| u64::from(c.width_percent)).sum();
        if total_width > 100 {
            return invalid("column widths exceed 100 percent");
        }
        if self.font_size == 0 || self.line_height < self.font_size {
            return invalid("line height must be at least the font size");
        }
        if u64::from(self.margins.left) + u64::from(self.margins.right) >= u64::from(width) {
            return invalid("horizontal margins leave no content width");
        }
        let reserved = u64::from(self.margins.top)
            + u64::from(self.margins.bottom)
            + u64::from(self.line_height) * 4;
        if reserved >= u64::from(height) {
            return invalid("vertical margins leave no room for content");
        }
        if StrftimeItems::new(&self.date_format).any(|item| matches!(item, Item::Error)) {
            return invalid("date format is not a valid strftime pattern");
        }
        Ok(())
    }
}
