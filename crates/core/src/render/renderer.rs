//! Invoice layout.
//!
//! The renderer only formats amounts; it never computes them. Every figure on
//! the page comes straight from the invoice.

use std::borrow::Cow;
use std::fmt::Write as _;

use chrono::NaiveDate;

use frith_shared::Money;

use crate::billing::{Invoice, LineItem};
use crate::currency::format_money;

use super::document::{Cell, DrawInstruction, RenderedDocument, RowKind, TextStyle};
use super::error::RenderError;
use super::template::{Align, ColumnKind, TemplateConfig};

/// Horizontal padding inside each table cell, per side.
const CELL_PADDING: u32 = 4;

/// Renders invoices to draw instructions.
pub struct InvoiceRenderer;

impl InvoiceRenderer {
    /// Lays out `invoice` with `config`.
    ///
    /// A row is placed on the current page when it fits between the current
    /// position and the footer; otherwise a page break precedes it and the
    /// table header is repeated. A single row taller than a whole page is
    /// placed at the top of a fresh page and allowed to overflow.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTemplate` if the template fails validation and
    /// `DateFormat` if a date cannot be formatted.
    pub fn render(
        invoice: &Invoice,
        config: &TemplateConfig,
    ) -> Result<RenderedDocument, RenderError> {
        config.validate()?;

        let mut layout = Layout::new(config);
        layout.heading(invoice)?;
        layout.line_items(invoice)?;
        layout.totals(invoice);
        if config.show_notes
            && let Some(notes) = invoice.notes.as_deref()
        {
            layout.section("Notes", notes);
        }
        if config.show_terms
            && let Some(terms) = invoice.terms.as_deref()
        {
            layout.section("Terms", terms);
        }
        Ok(layout.finish())
    }
}

struct Layout<'a> {
    config: &'a TemplateConfig,
    width: u32,
    height: u32,
    left: u32,
    right: u32,
    content_top: u32,
    content_bottom: u32,
    pages: Vec<Vec<DrawInstruction>>,
    y: u32,
    page_start: u32,
    table_header: Option<(u32, Vec<Cell>)>,
}

impl<'a> Layout<'a> {
    fn new(config: &'a TemplateConfig) -> Self {
        let (width, height) = config.page_size();
        let margins = config.margins;
        let header_space = if config.header_text.is_some() {
            config.line_height
        } else {
            0
        };
        let content_top = margins.top + header_space;
        Self {
            config,
            width,
            height,
            left: margins.left,
            right: width - margins.right,
            content_top,
            content_bottom: height - margins.bottom - config.line_height,
            pages: vec![Vec::new()],
            y: content_top,
            page_start: content_top,
            table_header: None,
        }
    }

    fn content_width(&self) -> u32 {
        self.right - self.left
    }

    fn push(&mut self, instruction: DrawInstruction) {
        if let Some(page) = self.pages.last_mut() {
            page.push(instruction);
        }
    }

    /// Starts a new page unless `height` fits or the page is still empty.
    fn reserve(&mut self, height: u32) {
        if self.y.saturating_add(height) > self.content_bottom && self.y > self.page_start {
            self.new_page();
        }
    }

    fn new_page(&mut self) {
        self.pages.push(Vec::new());
        self.y = self.content_top;
        if let Some((height, cells)) = self.table_header.clone() {
            self.push(DrawInstruction::TableRow {
                y: self.y,
                height,
                kind: RowKind::Header,
                cells,
            });
            self.y += height;
        }
        self.page_start = self.y;
    }

    fn text(&mut self, text: String, style: TextStyle, align: Align) {
        let height = match style {
            TextStyle::Title => self.config.line_height * 2,
            TextStyle::Regular | TextStyle::Bold => self.config.line_height,
        };
        self.reserve(height);
        self.push(DrawInstruction::Text {
            x: self.left,
            y: self.y,
            width: self.content_width(),
            text,
            style,
            align,
        });
        self.y += height;
    }

    fn rule(&mut self) {
        let half = self.config.line_height / 2;
        self.reserve(half);
        self.push(DrawInstruction::Rule {
            x1: self.left,
            x2: self.right,
            y: self.y,
        });
        self.y += half;
    }

    fn row(&mut self, kind: RowKind, cells: Vec<Cell>) {
        let lines = cells.iter().map(|c| c.lines.len()).max().unwrap_or(1).max(1);
        let height = self
            .config
            .line_height
            .saturating_mul(u32::try_from(lines).unwrap_or(u32::MAX));
        self.reserve(height);
        self.push(DrawInstruction::TableRow {
            y: self.y,
            height,
            kind,
            cells,
        });
        self.y = self.y.saturating_add(height);
    }

    fn heading(&mut self, invoice: &Invoice) -> Result<(), RenderError> {
        if let Some(firm) = &self.config.firm_name {
            self.text(firm.clone(), TextStyle::Title, Align::Left);
        }
        self.text(
            format!("Invoice {}", invoice.invoice_number),
            TextStyle::Title,
            Align::Left,
        );
        let issued = format_date(invoice.issue_date, &self.config.date_format)?;
        let due = format_date(invoice.due_date, &self.config.date_format)?;
        self.text(format!("Issue date: {issued}"), TextStyle::Regular, Align::Left);
        self.text(format!("Due date: {due}"), TextStyle::Regular, Align::Left);
        self.rule();
        Ok(())
    }

    /// `(x, width)` of every configured column.
    fn column_geometry(&self) -> Vec<(u32, u32)> {
        let content_width = self.content_width();
        let mut x = self.left;
        self.config
            .columns
            .iter()
            .map(|column| {
                let width = content_width * column.width_percent / 100;
                let geometry = (x, width);
                x += width;
                geometry
            })
            .collect()
    }

    fn cell(&self, x: u32, width: u32, text: &str, align: Align) -> Cell {
        Cell {
            x,
            width,
            lines: wrap(text, width, self.config.font_size),
            align,
        }
    }

    fn line_items(&mut self, invoice: &Invoice) -> Result<(), RenderError> {
        let geometry = self.column_geometry();

        let header: Vec<Cell> = self
            .config
            .columns
            .iter()
            .zip(&geometry)
            .map(|(column, &(x, width))| self.cell(x, width, &column.header, column.align))
            .collect();
        self.row(RowKind::Header, header.clone());
        let header_height = match self.pages.last().and_then(|p| p.last()) {
            Some(DrawInstruction::TableRow { height, .. }) => *height,
            _ => self.config.line_height,
        };
        self.table_header = Some((header_height, header));

        for item in &invoice.line_items {
            let mut cells = Vec::with_capacity(geometry.len());
            for (column, &(x, width)) in self.config.columns.iter().zip(&geometry) {
                let text = self.cell_text(item, column.kind)?;
                cells.push(self.cell(x, width, &text, column.align));
            }
            self.row(RowKind::Item, cells);
        }

        self.table_header = None;
        Ok(())
    }

    fn cell_text(&self, item: &LineItem, kind: ColumnKind) -> Result<String, RenderError> {
        let format = self.config.money_format;
        Ok(match kind {
            ColumnKind::Description => item.description.clone(),
            ColumnKind::Quantity => item.quantity.normalize().to_string(),
            ColumnKind::Rate => format_money(&item.rate, format),
            ColumnKind::Amount => format_money(&item.amount, format),
            ColumnKind::BillingCode => item.billing_code.clone().unwrap_or_default(),
            ColumnKind::ServiceDate => match item.service_date {
                Some(date) => format_date(date, &self.config.date_format)?,
                None => String::new(),
            },
        })
    }

    fn totals(&mut self, invoice: &Invoice) {
        self.rule();

        let (value_x, value_width) = self
            .column_geometry()
            .last()
            .copied()
            .unwrap_or((self.left, self.content_width()));
        let label_width = value_x - self.left;

        let mut rows: Vec<(&str, Money)> = vec![
            ("Subtotal", invoice.subtotal),
            ("Tax", invoice.tax_amount),
            ("Total", invoice.total_amount),
        ];
        if !invoice.write_off_amount.is_zero() {
            rows.push(("Write-off", invoice.write_off_amount));
        }
        rows.push(("Amount Paid", invoice.paid_amount));
        if !invoice.overpayment_amount.is_zero() {
            rows.push(("Overpayment", invoice.overpayment_amount));
        }
        rows.push(("Balance Due", invoice.balance_due));

        for (label, amount) in rows {
            let value = format_money(&amount, self.config.money_format);
            let cells = vec![
                Cell {
                    x: self.left,
                    width: label_width,
                    lines: vec![label.to_string()],
                    align: Align::Right,
                },
                Cell {
                    x: value_x,
                    width: value_width,
                    lines: vec![value],
                    align: Align::Right,
                },
            ];
            self.row(RowKind::Total, cells);
        }
    }

    fn section(&mut self, title: &str, body: &str) {
        self.y += self.config.line_height / 2;
        self.text(title.to_string(), TextStyle::Bold, Align::Left);
        for paragraph in body.lines() {
            for line in wrap(paragraph, self.content_width(), self.config.font_size) {
                self.text(line, TextStyle::Regular, Align::Left);
            }
        }
    }

    fn finish(self) -> RenderedDocument {
        let page_count = u32::try_from(self.pages.len()).unwrap_or(u32::MAX);
        let footer_y = self.content_bottom;
        let content_width = self.content_width();
        let mut instructions = Vec::new();

        for (index, page) in self.pages.into_iter().enumerate() {
            let page_number = u32::try_from(index + 1).unwrap_or(u32::MAX);
            if index > 0 {
                instructions.push(DrawInstruction::PageBreak);
            }
            if let Some(header) = &self.config.header_text {
                instructions.push(DrawInstruction::Text {
                    x: self.left,
                    y: self.config.margins.top,
                    width: content_width,
                    text: paginate(header, page_number, page_count),
                    style: TextStyle::Regular,
                    align: Align::Right,
                });
            }
            instructions.extend(page);
            instructions.push(DrawInstruction::Text {
                x: self.left,
                y: footer_y,
                width: content_width,
                text: paginate(&self.config.footer_text, page_number, page_count),
                style: TextStyle::Regular,
                align: Align::Center,
            });
        }

        RenderedDocument {
            paper_size: self.config.paper_size,
            width: self.width,
            height: self.height,
            page_count,
            instructions,
        }
    }
}

/// Wraps `text` to the number of average-width glyphs that fit in `width`.
fn wrap(text: &str, width: u32, font_size: u32) -> Vec<String> {
    // Average glyph advance is roughly 0.6 em.
    let glyph = (font_size * 3 / 5).max(1);
    let usable = width.saturating_sub(CELL_PADDING * 2);
    let columns = usize::try_from(usable / glyph).unwrap_or(usize::MAX).max(1);
    textwrap::wrap(text, columns)
        .into_iter()
        .map(Cow::into_owned)
        .collect()
}

fn paginate(template: &str, page: u32, pages: u32) -> String {
    template
        .replace("{page}", &page.to_string())
        .replace("{pages}", &pages.to_string())
}

fn format_date(date: NaiveDate, pattern: &str) -> Result<String, RenderError> {
    let mut out = String::new();
    write!(out, "{}", date.format(pattern)).map_err(|_| RenderError::DateFormat)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::{
        InvoiceLedger, LineItemKind, NewInvoice, NewLineItem, NoTax, OverpaymentPolicy,
        PaymentInput, PaymentMethod,
    };
    use crate::render::template::{Margins, PaperSize};
    use chrono::{DateTime, Utc};
    use frith_shared::types::{ClientId, OrganizationId, UserId};
    use frith_shared::Currency;
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn invoice(lines: usize, description: &str) -> Invoice {
        let mut invoice = InvoiceLedger::create_draft(
            OrganizationId::new(),
            "FRITH-000042".to_string(),
            NewInvoice {
                client_id: ClientId::new(),
                matter_id: None,
                currency: Currency::USD,
                issue_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
                due_date: None,
                notes: Some("Thank you for your business.".to_string()),
                terms: Some("Payment due within 30 days.".to_string()),
                created_by: UserId::new(),
            },
            30,
            now(),
        )
        .unwrap();
        for _ in 0..lines {
            InvoiceLedger::add_line_item(
                &mut invoice,
                NewLineItem {
                    kind: LineItemKind::Time,
                    description: description.to_string(),
                    quantity: dec!(1.5),
                    rate: Money::from_minor(30_000, Currency::USD),
                    tax_code: None,
                    billing_code: Some("L120".to_string()),
                    service_date: NaiveDate::from_ymd_opt(2026, 2, 27),
                },
                now(),
            )
            .unwrap();
        }
        InvoiceLedger::finalize_totals(&mut invoice, &NoTax, now()).unwrap();
        invoice
    }

    fn page_breaks(doc: &RenderedDocument) -> usize {
        doc.instructions
            .iter()
            .filter(|i| matches!(i, DrawInstruction::PageBreak))
            .count()
    }

    #[test]
    fn test_single_page_invoice() {
        let doc = InvoiceRenderer::render(&invoice(2, "Draft motion"), &TemplateConfig::default())
            .unwrap();

        assert_eq!(doc.page_count, 1);
        assert_eq!(page_breaks(&doc), 0);
        assert_eq!((doc.width, doc.height), (612, 792));

        let items: Vec<&[Cell]> = doc.rows(RowKind::Item).collect();
        assert_eq!(items.len(), 2);
        let texts: Vec<String> = items[0].iter().map(Cell::text).collect();
        assert_eq!(
            texts,
            vec!["Feb 27, 2026", "L120", "Draft motion", "1.5", "$300.00", "$450.00"]
        );

        assert_eq!(
            doc.totals(),
            vec![
                ("Subtotal".to_string(), "$900.00".to_string()),
                ("Tax".to_string(), "$0.00".to_string()),
                ("Total".to_string(), "$900.00".to_string()),
                ("Amount Paid".to_string(), "$0.00".to_string()),
                ("Balance Due".to_string(), "$900.00".to_string()),
            ]
        );

        let footer = doc.instructions.iter().rev().find_map(|i| match i {
            DrawInstruction::Text { text, .. } => Some(text.clone()),
            _ => None,
        });
        assert_eq!(footer.as_deref(), Some("Page 1 of 1"));
    }

    #[test]
    fn test_long_invoice_breaks_pages_and_repeats_header() {
        let config = TemplateConfig {
            paper_size: PaperSize::A4,
            header_text: Some("Acme LLP | {page}/{pages}".to_string()),
            ..TemplateConfig::default()
        };
        let doc = InvoiceRenderer::render(&invoice(80, "Review documents"), &config).unwrap();

        assert!(doc.page_count > 1);
        assert_eq!(page_breaks(&doc), doc.page_count as usize - 1);
        assert_eq!(doc.rows(RowKind::Header).count(), doc.page_count as usize);
        assert_eq!(doc.rows(RowKind::Item).count(), 80);

        let bottom = doc.height - config.margins.bottom - config.line_height;
        for instruction in &doc.instructions {
            if let DrawInstruction::TableRow { y, height, .. } = instruction {
                assert!(y + height <= bottom, "row at {y} overflows");
                assert!(*y >= config.margins.top);
            }
        }

        let footers: Vec<&String> = doc
            .instructions
            .iter()
            .filter_map(|i| match i {
                DrawInstruction::Text { text, .. } if text.starts_with("Page ") => Some(text),
                _ => None,
            })
            .collect();
        assert_eq!(footers.len(), doc.page_count as usize);
        assert_eq!(*footers[0], format!("Page 1 of {}", doc.page_count));
        assert!(doc.instructions.iter().any(|i| matches!(
            i,
            DrawInstruction::Text { text, .. } if *text == format!("Acme LLP | 2/{}", doc.page_count)
        )));
    }

    #[test]
    fn test_descriptions_wrap() {
        let long = "Prepare for and attend deposition of opposing expert witness, \
                    including review of expert report and exhibits";
        let doc = InvoiceRenderer::render(&invoice(1, long), &TemplateConfig::default()).unwrap();
        let row = doc.rows(RowKind::Item).next().unwrap();
        let description = &row[2];
        assert!(description.lines.len() > 1);
        assert_eq!(description.text(), long.split_whitespace().collect::<Vec<_>>().join(" "));
    }

    #[test]
    fn test_payments_and_code_format_in_totals() {
        let mut inv = invoice(1, "Consultation");
        InvoiceLedger::submit_for_approval(&mut inv, now()).unwrap();
        InvoiceLedger::approve(&mut inv, UserId::new(), now()).unwrap();
        InvoiceLedger::apply_payment(
            &mut inv,
            PaymentInput {
                amount: Money::from_minor(50_000, Currency::USD),
                method: PaymentMethod::Check,
                payment_date: NaiveDate::from_ymd_opt(2026, 3, 5).unwrap(),
                reference: None,
                recorded_by: UserId::new(),
            },
            OverpaymentPolicy::RecordExcess,
            now(),
        )
        .unwrap();

        let config = TemplateConfig {
            money_format: crate::currency::MoneyFormat::Code,
            show_notes: false,
            ..TemplateConfig::default()
        };
        let doc = InvoiceRenderer::render(&inv, &config).unwrap();
        let totals = doc.totals();
        assert!(totals.contains(&("Overpayment".to_string(), "50.00 USD".to_string())));
        assert!(totals.contains(&("Balance Due".to_string(), "0.00 USD".to_string())));
        assert!(!doc.instructions.iter().any(|i| matches!(
            i,
            DrawInstruction::Text { text, .. } if text == "Notes"
        )));
    }

    #[test]
    fn test_invalid_template_is_rejected() {
        let config = TemplateConfig {
            margins: Margins::uniform(500),
            ..TemplateConfig::default()
        };
        assert!(matches!(
            InvoiceRenderer::render(&invoice(1, "x"), &config),
            Err(RenderError::InvalidTemplate(_))
        ));
    }

    #[test]
    fn test_to_bytes_is_json() {
        let doc = InvoiceRenderer::render(&invoice(1, "x"), &TemplateConfig::default()).unwrap();
        let bytes = doc.to_bytes().unwrap();
        let back: RenderedDocument = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, doc);
    }
}
