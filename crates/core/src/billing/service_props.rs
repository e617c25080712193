//! Property-based tests for InvoiceLedger.
//!
//! - Payments grow `paid_amount` by exactly the payment and never grow
//!   `balance_due`
//! - `finalize_totals` is idempotent
//! - Subtotal always equals the sum of line amounts

use chrono::{DateTime, NaiveDate, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;

use frith_shared::types::{ClientId, OrganizationId, UserId};
use frith_shared::{Currency, Money};

use super::service::InvoiceLedger;
use super::tax::{FlatRateTax, NoTax};
use super::types::{
    Invoice, InvoiceStatus, LineItemKind, NewInvoice, NewLineItem, OverpaymentPolicy, PaymentInput,
    PaymentMethod,
};

fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-05-01T00:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 5, 1).unwrap()
}

/// Strategy to generate (quantity in hundredths, rate in cents, taxable) lines.
fn lines() -> impl Strategy<Value = Vec<(i64, i64, bool)>> {
    prop::collection::vec((1i64..5_000i64, 0i64..100_000i64, any::<bool>()), 1..12)
}

/// Strategy to generate payment amounts in cents.
fn payments() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(1i64..200_000i64, 1..10)
}

/// Strategy to generate overpayment policies.
fn policy() -> impl Strategy<Value = OverpaymentPolicy> {
    prop_oneof![
        Just(OverpaymentPolicy::Reject),
        Just(OverpaymentPolicy::RecordExcess),
    ]
}

fn draft_with(lines: &[(i64, i64, bool)]) -> Invoice {
    let mut invoice = InvoiceLedger::create_draft(
        OrganizationId::new(),
        "FRITH-000001".to_string(),
        NewInvoice {
            client_id: ClientId::new(),
            matter_id: None,
            currency: Currency::USD,
            issue_date: date(),
            due_date: None,
            notes: None,
            terms: None,
            created_by: UserId::new(),
        },
        30,
        now(),
    )
    .unwrap();
    for &(hundredths, rate, taxable) in lines {
        InvoiceLedger::add_line_item(
            &mut invoice,
            NewLineItem {
                kind: LineItemKind::Time,
                description: "Work".to_string(),
                quantity: Decimal::new(hundredths, 2),
                rate: Money::from_minor(rate, Currency::USD),
                tax_code: taxable.then(|| "VAT".to_string()),
                billing_code: None,
                service_date: None,
            },
            now(),
        )
        .unwrap();
    }
    invoice
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// balance_due never increases and paid_amount grows by exactly each
    /// accepted payment; rejected payments change nothing.
    #[test]
    fn prop_payments_are_monotonic(
        items in lines(),
        amounts in payments(),
        policy in policy(),
    ) {
        let mut invoice = draft_with(&items);
        InvoiceLedger::finalize_totals(&mut invoice, &NoTax, now()).unwrap();
        InvoiceLedger::submit_for_approval(&mut invoice, now()).unwrap();
        InvoiceLedger::approve(&mut invoice, UserId::new(), now()).unwrap();
        InvoiceLedger::send(&mut invoice, now()).unwrap();
        prop_assert_eq!(
            invoice.balance_due.is_zero(),
            invoice.status == InvoiceStatus::Paid
        );

        for cents in amounts {
            let before = invoice.clone();
            let result = InvoiceLedger::apply_payment(
                &mut invoice,
                PaymentInput {
                    amount: Money::from_minor(cents, Currency::USD),
                    method: PaymentMethod::Wire,
                    payment_date: date(),
                    reference: None,
                    recorded_by: UserId::new(),
                },
                policy,
                now(),
            );
            match result {
                Ok(payment) => {
                    prop_assert_eq!(
                        invoice.paid_amount.minor_units,
                        before.paid_amount.minor_units + cents
                    );
                    prop_assert_eq!(
                        payment.applied_amount.minor_units + payment.excess_amount.minor_units,
                        cents
                    );
                    prop_assert_eq!(
                        invoice.balance_due.is_zero(),
                        invoice.status == InvoiceStatus::Paid
                    );
                }
                Err(_) => {
                    prop_assert_eq!(&invoice, &before);
                }
            }
            prop_assert!(invoice.balance_due.minor_units <= before.balance_due.minor_units);
            prop_assert!(!invoice.balance_due.is_negative());
        }
    }

    /// Finalizing twice without changes yields identical invoices.
    #[test]
    fn prop_finalize_is_idempotent(items in lines(), rate_bp in 0i64..2_500i64) {
        let mut invoice = draft_with(&items);
        let tax = FlatRateTax::new(Decimal::new(rate_bp, 4));

        InvoiceLedger::finalize_totals(&mut invoice, &tax, now()).unwrap();
        let once = invoice.clone();
        InvoiceLedger::finalize_totals(&mut invoice, &tax, now()).unwrap();

        prop_assert_eq!(&invoice, &once);
        prop_assert_eq!(
            invoice.total_amount,
            invoice.subtotal.add(&invoice.tax_amount).unwrap()
        );
    }

    /// Subtotal equals the sum of rounded line amounts.
    #[test]
    fn prop_subtotal_is_sum_of_lines(items in lines()) {
        let mut invoice = draft_with(&items);
        InvoiceLedger::finalize_totals(&mut invoice, &NoTax, now()).unwrap();

        let expected: i64 = invoice.line_items.iter().map(|l| l.amount.minor_units).sum();
        prop_assert_eq!(invoice.subtotal.minor_units, expected);
        prop_assert_eq!(invoice.balance_due, invoice.total_amount);
    }
}
