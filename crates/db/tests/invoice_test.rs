//! Integration tests for invoice numbering, the approval workflow and
//! payments.
//!
//! Requires a running `PostgreSQL` database; tests skip when none is
//! reachable.

mod common;

use futures::future::join_all;
use rust_decimal_macros::dec;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Barrier;

use frith_core::billing::{
    BillingError, FlatRateTax, InvoiceStatus, LineItemKind, NewInvoice, NewLineItem,
    OverpaymentPolicy, PaymentInput, PaymentMethod,
};
use frith_db::InvoiceRepository;
use frith_shared::Currency;
use frith_shared::config::BillingConfig;
use frith_shared::types::{ClientId, InvoiceId, OrganizationId, UserId};

use common::{connect, date, organization, usd};

fn repository(db: &sea_orm::DatabaseConnection) -> InvoiceRepository {
    InvoiceRepository::new(
        db.clone(),
        BillingConfig {
            invoice_prefix: "INV".to_string(),
            invoice_number_width: 6,
            default_due_days: 30,
        },
    )
}

fn new_invoice(user: UserId) -> NewInvoice {
    NewInvoice {
        client_id: ClientId::new(),
        matter_id: None,
        currency: Currency::USD,
        issue_date: date(2026, 5, 1),
        due_date: None,
        notes: None,
        terms: Some("Net 30".to_string()),
        created_by: user,
    }
}

fn time_entry(hours: rust_decimal::Decimal, rate: i64) -> NewLineItem {
    NewLineItem {
        kind: LineItemKind::Time,
        description: "Drafting motion to dismiss".to_string(),
        quantity: hours,
        rate: usd(rate),
        tax_code: None,
        billing_code: Some("L210".to_string()),
        service_date: Some(date(2026, 4, 28)),
    }
}

fn payment(minor: i64, user: UserId) -> PaymentInput {
    PaymentInput {
        amount: usd(minor),
        method: PaymentMethod::Check,
        payment_date: date(2026, 5, 20),
        reference: Some("1042".to_string()),
        recorded_by: user,
    }
}

/// Drafts an invoice for 2.5 hours at 300.00 and sends it.
async fn sent_invoice(repo: &InvoiceRepository, org: OrganizationId, user: UserId) -> InvoiceId {
    let invoice = repo.create_invoice(org, new_invoice(user)).await.unwrap();
    repo.add_line_item(org, invoice.id, time_entry(dec!(2.5), 30_000))
        .await
        .unwrap();
    repo.finalize_totals(org, invoice.id, &FlatRateTax::new(dec!(0)))
        .await
        .unwrap();
    repo.submit_for_approval(org, invoice.id).await.unwrap();
    repo.approve(org, invoice.id, user).await.unwrap();
    repo.send(org, invoice.id).await.unwrap();
    invoice.id
}

#[tokio::test]
async fn test_invoice_lifecycle_to_paid() {
    let Some(db) = connect().await else { return };
    let repo = repository(&db);
    let org = organization(&db).await;
    let user = UserId::new();

    let id = sent_invoice(&repo, org, user).await;
    let invoice = repo.get_invoice(org, id).await.unwrap();
    assert_eq!(invoice.invoice_number, "INV-000001");
    assert_eq!(invoice.due_date, date(2026, 5, 31));
    assert_eq!(invoice.total_amount, usd(75_000));
    assert_eq!(invoice.line_items.len(), 1);

    let viewed = repo.mark_viewed(org, id).await.unwrap();
    assert_eq!(viewed.status, InvoiceStatus::Viewed);
    assert_eq!(repo.mark_viewed(org, id).await.unwrap().status, InvoiceStatus::Viewed);

    let err = repo
        .apply_payment(org, id, payment(80_000, user), OverpaymentPolicy::Reject)
        .await
        .unwrap_err();
    assert!(matches!(err, BillingError::Overpayment { .. }));

    let (partial, _) = repo
        .apply_payment(org, id, payment(50_000, user), OverpaymentPolicy::Reject)
        .await
        .unwrap();
    assert_eq!(partial.balance_due, usd(25_000));

    let (paid, last) = repo
        .apply_payment(org, id, payment(30_000, user), OverpaymentPolicy::RecordExcess)
        .await
        .unwrap();
    assert_eq!(paid.status, InvoiceStatus::Paid);
    assert_eq!(paid.balance_due, usd(0));
    assert_eq!(paid.overpayment_amount, usd(5_000));
    assert_eq!(last.excess_amount, usd(5_000));

    let payments = repo.list_payments(org, id).await.unwrap();
    assert_eq!(payments.len(), 2);
    assert_eq!(payments[0].amount, usd(50_000));

    let err = repo.cancel(org, id).await.unwrap_err();
    assert!(matches!(err, BillingError::InvalidTransition { .. }));
}

#[tokio::test]
async fn test_submitted_invoice_is_locked() {
    let Some(db) = connect().await else { return };
    let repo = repository(&db);
    let org = organization(&db).await;
    let user = UserId::new();

    let invoice = repo.create_invoice(org, new_invoice(user)).await.unwrap();
    let err = repo.submit_for_approval(org, invoice.id).await.unwrap_err();
    assert!(matches!(err, BillingError::NoLineItems));

    repo.add_line_item(org, invoice.id, time_entry(dec!(1), 10_000))
        .await
        .unwrap();
    repo.finalize_totals(org, invoice.id, &FlatRateTax::new(dec!(0.10)))
        .await
        .unwrap();
    repo.submit_for_approval(org, invoice.id).await.unwrap();

    let err = repo
        .add_line_item(org, invoice.id, time_entry(dec!(1), 10_000))
        .await
        .unwrap_err();
    assert!(matches!(err, BillingError::InvoiceLocked { .. }));

    let rejected = repo.reject(org, invoice.id, "Wrong rate").await.unwrap();
    assert_eq!(rejected.status, InvoiceStatus::Draft);
    assert_eq!(rejected.line_items.len(), 1);
}

#[tokio::test]
async fn test_write_off_and_cancel_rules() {
    let Some(db) = connect().await else { return };
    let repo = repository(&db);
    let org = organization(&db).await;
    let user = UserId::new();

    let id = sent_invoice(&repo, org, user).await;
    repo.apply_payment(org, id, payment(70_000, user), OverpaymentPolicy::Reject)
        .await
        .unwrap();
    let err = repo.cancel(org, id).await.unwrap_err();
    assert!(matches!(err, BillingError::HasPayments(p) if p == usd(70_000)));

    let err = repo.write_off(org, id, usd(6_000), "Too much").await.unwrap_err();
    assert!(matches!(err, BillingError::WriteOffExceedsBalance { .. }));
    let written = repo
        .write_off(org, id, usd(5_000), "Courtesy discount")
        .await
        .unwrap();
    assert_eq!(written.status, InvoiceStatus::WrittenOff);
    assert_eq!(written.balance_due, usd(0));

    let draft = repo.create_invoice(org, new_invoice(user)).await.unwrap();
    let cancelled = repo.cancel(org, draft.id).await.unwrap();
    assert_eq!(cancelled.status, InvoiceStatus::Cancelled);
}

/// Concurrent drafts in one organization receive distinct, gapless numbers.
#[tokio::test]
async fn test_concurrent_invoice_numbers_are_unique() {
    const NUM_INVOICES: usize = 16;

    let Some(db) = connect().await else { return };
    let repo = repository(&db);
    let org = organization(&db).await;
    let user = UserId::new();

    let barrier = Arc::new(Barrier::new(NUM_INVOICES));
    let handles = (0..NUM_INVOICES).map(|_| {
        let repo = repo.clone();
        let barrier = Arc::clone(&barrier);
        tokio::spawn(async move {
            barrier.wait().await;
            repo.create_invoice(org, new_invoice(user)).await
        })
    });
    let numbers: HashSet<String> = join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap().unwrap().invoice_number)
        .collect();

    let expected: HashSet<String> = (1..=NUM_INVOICES)
        .map(|n| format!("INV-{n:06}"))
        .collect();
    assert_eq!(numbers, expected);

    let page = repo
        .list_invoices(org, &frith_shared::types::PageRequest::default())
        .await
        .unwrap();
    assert_eq!(page.data.len(), NUM_INVOICES);
}
