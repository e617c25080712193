//! Property-based tests for InvoiceRenderer.
//!
//! - Totals printed on the page parse back to the invoice's amounts
//! - No table row crosses into the footer unless it is taller than a page
//! - Page count matches the number of page breaks
//! - Rendering is deterministic

use chrono::{DateTime, NaiveDate, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;

use frith_shared::types::{ClientId, OrganizationId, UserId};
use frith_shared::{Currency, Money};

use crate::billing::{
    FlatRateTax, Invoice, InvoiceLedger, LineItemKind, NewInvoice, NewLineItem,
};
use crate::currency::MoneyFormat;

use super::document::{DrawInstruction, RenderedDocument};
use super::renderer::InvoiceRenderer;
use super::template::{PaperSize, TemplateConfig};

fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-06-01T00:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

/// Strategy to generate invoice currencies, including a zero-decimal one.
fn currency() -> impl Strategy<Value = Currency> {
    prop_oneof![
        Just(Currency::USD),
        Just(Currency::EUR),
        Just(Currency::GBP),
        Just(Currency::JPY),
    ]
}

/// Strategy to generate money display styles.
fn money_format() -> impl Strategy<Value = MoneyFormat> {
    prop_oneof![
        Just(MoneyFormat::Symbol),
        Just(MoneyFormat::Code),
        Just(MoneyFormat::Both),
    ]
}

/// Strategy to generate paper sizes.
fn paper() -> impl Strategy<Value = PaperSize> {
    prop_oneof![
        Just(PaperSize::Letter),
        Just(PaperSize::A4),
        Just(PaperSize::Legal),
    ]
}

/// Strategy to generate (description, hundredths of an hour, rate) lines.
fn lines() -> impl Strategy<Value = Vec<(String, i64, i64)>> {
    prop::collection::vec(
        ("[a-z]{1,12}( [a-z]{1,12}){0,30}", 1i64..2_000i64, 0i64..5_000_000i64),
        0..60,
    )
}

fn build(currency: Currency, items: &[(String, i64, i64)], tax_bp: i64) -> Invoice {
    let mut invoice = InvoiceLedger::create_draft(
        OrganizationId::new(),
        "FRITH-000100".to_string(),
        NewInvoice {
            client_id: ClientId::new(),
            matter_id: None,
            currency,
            issue_date: NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
            due_date: None,
            notes: Some("Notes line one\nNotes line two".to_string()),
            terms: Some("Net 30".to_string()),
            created_by: UserId::new(),
        },
        30,
        now(),
    )
    .unwrap();
    for (description, hundredths, rate) in items {
        InvoiceLedger::add_line_item(
            &mut invoice,
            NewLineItem {
                kind: LineItemKind::Time,
                description: description.clone(),
                quantity: Decimal::new(*hundredths, 2),
                rate: Money::from_minor(*rate, currency),
                tax_code: Some("STD".to_string()),
                billing_code: None,
                service_date: None,
            },
            now(),
        )
        .unwrap();
    }
    let tax = FlatRateTax::new(Decimal::new(tax_bp, 4));
    InvoiceLedger::finalize_totals(&mut invoice, &tax, now()).unwrap();
    invoice
}

/// Recovers an amount from its printed form by dropping everything except
/// digits, the decimal point and the sign.
fn parse_printed(printed: &str, currency: Currency) -> Money {
    let digits: String = printed
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    Money::parse(&digits, currency).unwrap()
}

fn printed_total(doc: &RenderedDocument, label: &str) -> Option<String> {
    doc.totals()
        .into_iter()
        .find(|(l, _)| l == label)
        .map(|(_, v)| v)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every printed total equals the stored amount.
    #[test]
    fn prop_printed_totals_match_invoice(
        currency in currency(),
        format in money_format(),
        items in lines(),
        tax_bp in 0i64..2_500i64,
    ) {
        let invoice = build(currency, &items, tax_bp);
        let config = TemplateConfig { money_format: format, ..TemplateConfig::default() };
        let doc = InvoiceRenderer::render(&invoice, &config).unwrap();

        let expected = [
            ("Subtotal", invoice.subtotal),
            ("Tax", invoice.tax_amount),
            ("Total", invoice.total_amount),
            ("Amount Paid", invoice.paid_amount),
            ("Balance Due", invoice.balance_due),
        ];
        for (label, amount) in expected {
            let printed = printed_total(&doc, label);
            prop_assert!(printed.is_some(), "missing {}", label);
            prop_assert_eq!(parse_printed(&printed.unwrap_or_default(), currency), amount);
        }
    }

    /// Rows stay inside the printable area and page count matches breaks.
    #[test]
    fn prop_pagination_respects_margins(
        paper in paper(),
        items in lines(),
        with_header in any::<bool>(),
    ) {
        let invoice = build(Currency::USD, &items, 0);
        let config = TemplateConfig {
            paper_size: paper,
            header_text: with_header.then(|| "Page {page}".to_string()),
            ..TemplateConfig::default()
        };
        let doc = InvoiceRenderer::render(&invoice, &config).unwrap();

        let top = config.margins.top;
        let bottom = doc.height - config.margins.bottom - config.line_height;
        let usable = bottom - top;
        let mut breaks = 0u32;
        for instruction in &doc.instructions {
            match instruction {
                DrawInstruction::PageBreak => breaks += 1,
                DrawInstruction::TableRow { y, height, .. } => {
                    prop_assert!(*y >= top);
                    prop_assert!(y + height <= bottom || *height > usable);
                }
                _ => {}
            }
        }
        prop_assert_eq!(breaks + 1, doc.page_count);
        prop_assert_eq!(doc.rows(super::document::RowKind::Item).count(), items.len());
    }

    /// Rendering the same invoice twice yields identical documents.
    #[test]
    fn prop_render_is_deterministic(items in lines(), format in money_format()) {
        let invoice = build(Currency::EUR, &items, 2_000);
        let config = TemplateConfig { money_format: format, ..TemplateConfig::default() };
        let first = InvoiceRenderer::render(&invoice, &config).unwrap();
        let second = InvoiceRenderer::render(&invoice, &config).unwrap();
        prop_assert_eq!(first, second);
    }
}
