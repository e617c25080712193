//! Invoice ledger.
//!
//! Every operation validates first and mutates only after all checks pass, so
//! an `Err` leaves the invoice exactly as it was. Callers load the invoice with
//! its row locked, apply the operation, and persist the result in the same
//! database transaction.

use chrono::{DateTime, Days, Utc};
use rust_decimal::Decimal;

use frith_shared::types::{InvoiceId, LineItemId, OrganizationId, PaymentId, UserId};
use frith_shared::{Money, MoneyError};

use super::error::BillingError;
use super::tax::TaxCalculator;
use super::types::{
    Invoice, InvoiceStatus, LineItem, NewInvoice, NewLineItem, OverpaymentPolicy, Payment,
    PaymentInput,
};

/// Invoice ledger.
///
/// This service contains pure business logic with no database dependencies.
pub struct InvoiceLedger;

impl InvoiceLedger {
    /// Builds an empty draft invoice carrying an already allocated number.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDueDate` if the due date precedes the issue date.
    pub fn create_draft(
        organization_id: OrganizationId,
        invoice_number: String,
        input: NewInvoice,
        default_due_days: u32,
        now: DateTime<Utc>,
    ) -> Result<Invoice, BillingError> {
        let due_date = match input.due_date {
            Some(date) => date,
            None => input
                .issue_date
                .checked_add_days(Days::new(u64::from(default_due_days)))
                .ok_or(BillingError::InvalidDueDate)?,
        };
        if due_date < input.issue_date {
            return Err(BillingError::InvalidDueDate);
        }

        let zero = Money::zero(input.currency);
        Ok(Invoice {
            id: InvoiceId::new(),
            organization_id,
            client_id: input.client_id,
            matter_id: input.matter_id,
            invoice_number,
            currency: input.currency,
            issue_date: input.issue_date,
            due_date,
            status: InvoiceStatus::Draft,
            line_items: Vec::new(),
            subtotal: zero,
            tax_amount: zero,
            total_amount: zero,
            paid_amount: zero,
            overpayment_amount: zero,
            write_off_amount: zero,
            balance_due: zero,
            totals_finalized: false,
            notes: input.notes,
            terms: input.terms,
            write_off_reason: None,
            created_by: input.created_by,
            approved_by: None,
            sent_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Appends a line item to a draft invoice.
    ///
    /// The amount is computed immediately. Adding a line clears any
    /// previously computed tax; totals must be finalized again.
    ///
    /// # Errors
    ///
    /// Returns `InvoiceLocked` unless the invoice is a draft,
    /// `InvalidQuantity`, `InvalidRate`, or `BillingError::Money` on a
    /// currency mismatch or overflow.
    pub fn add_line_item(
        invoice: &mut Invoice,
        input: NewLineItem,
        now: DateTime<Utc>,
    ) -> Result<LineItem, BillingError> {
        Self::ensure_editable(invoice)?;
        if input.quantity <= Decimal::ZERO {
            return Err(BillingError::InvalidQuantity(input.quantity));
        }
        input.rate.compare(&invoice.subtotal)?;
        if input.rate.is_negative() {
            return Err(BillingError::InvalidRate(input.rate));
        }

        let amount = input.rate.multiply(input.quantity)?;
        let subtotal = invoice.subtotal.add(&amount)?;
        let line_number = u32::try_from(invoice.line_items.len())
            .ok()
            .and_then(|n| n.checked_add(1))
            .ok_or(MoneyError::Overflow)?;

        let line = LineItem {
            id: LineItemId::new(),
            line_number,
            kind: input.kind,
            description: input.description,
            quantity: input.quantity,
            rate: input.rate,
            amount,
            tax_code: input.tax_code,
            billing_code: input.billing_code,
            service_date: input.service_date,
        };

        invoice.line_items.push(line.clone());
        invoice.subtotal = subtotal;
        invoice.tax_amount = Money::zero(invoice.currency);
        invoice.total_amount = subtotal;
        invoice.totals_finalized = false;
        invoice.balance_due = Self::balance(invoice)?;
        invoice.updated_at = now;
        Ok(line)
    }

    /// Computes subtotal, tax and total for a draft invoice.
    ///
    /// Idempotent: running it again without changes yields the same totals.
    ///
    /// # Errors
    ///
    /// Returns `InvoiceLocked` unless the invoice is a draft, `TaxCalculation`
    /// if the calculator returns a negative amount or another currency, or
    /// any error the calculator returns.
    pub fn finalize_totals(
        invoice: &mut Invoice,
        tax: &dyn TaxCalculator,
        now: DateTime<Utc>,
    ) -> Result<(), BillingError> {
        Self::ensure_editable(invoice)?;

        let subtotal = Money::sum(
            invoice.currency,
            invoice.line_items.iter().map(|l| &l.amount),
        )?;
        let tax_amount = tax.calculate(invoice)?;
        if tax_amount.currency != invoice.currency || tax_amount.is_negative() {
            return Err(BillingError::TaxCalculation(format!(
                "unusable tax amount {tax_amount}"
            )));
        }
        let total_amount = subtotal.add(&tax_amount)?;

        let mut next = invoice.clone();
        next.subtotal = subtotal;
        next.tax_amount = tax_amount;
        next.total_amount = total_amount;
        next.balance_due = Self::balance(&next)?;
        next.totals_finalized = true;
        if next != *invoice {
            next.updated_at = now;
        }
        *invoice = next;
        Ok(())
    }

    /// Draft → PendingApproval.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` unless draft, `NoLineItems`, or
    /// `TotalsNotFinalized`.
    pub fn submit_for_approval(
        invoice: &mut Invoice,
        now: DateTime<Utc>,
    ) -> Result<(), BillingError> {
        Self::ensure_status(invoice, InvoiceStatus::Draft, InvoiceStatus::PendingApproval)?;
        if invoice.line_items.is_empty() {
            return Err(BillingError::NoLineItems);
        }
        if !invoice.totals_finalized {
            return Err(BillingError::TotalsNotFinalized);
        }
        invoice.status = InvoiceStatus::PendingApproval;
        invoice.updated_at = now;
        Ok(())
    }

    /// PendingApproval → Approved.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` unless pending approval.
    pub fn approve(
        invoice: &mut Invoice,
        approved_by: UserId,
        now: DateTime<Utc>,
    ) -> Result<(), BillingError> {
        Self::ensure_status(invoice, InvoiceStatus::PendingApproval, InvoiceStatus::Approved)?;
        invoice.status = InvoiceStatus::Approved;
        invoice.approved_by = Some(approved_by);
        invoice.updated_at = now;
        Ok(())
    }

    /// PendingApproval → Draft.
    ///
    /// # Errors
    ///
    /// Returns `ReasonRequired` for a blank reason and `InvalidTransition`
    /// unless pending approval.
    pub fn reject(
        invoice: &mut Invoice,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(), BillingError> {
        if reason.trim().is_empty() {
            return Err(BillingError::ReasonRequired("reject"));
        }
        Self::ensure_status(invoice, InvoiceStatus::PendingApproval, InvoiceStatus::Draft)?;
        invoice.status = InvoiceStatus::Draft;
        invoice.updated_at = now;
        Ok(())
    }

    /// Approved → Sent, or straight to Paid when nothing is owed.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` unless approved.
    pub fn send(invoice: &mut Invoice, now: DateTime<Utc>) -> Result<(), BillingError> {
        Self::ensure_status(invoice, InvoiceStatus::Approved, InvoiceStatus::Sent)?;
        invoice.status = if invoice.balance_due.is_zero() {
            InvoiceStatus::Paid
        } else {
            InvoiceStatus::Sent
        };
        invoice.sent_at = Some(now);
        invoice.updated_at = now;
        Ok(())
    }

    /// Sent → Viewed. Viewing again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` unless sent or viewed.
    pub fn mark_viewed(invoice: &mut Invoice, now: DateTime<Utc>) -> Result<(), BillingError> {
        match invoice.status {
            InvoiceStatus::Viewed => Ok(()),
            InvoiceStatus::Sent => {
                invoice.status = InvoiceStatus::Viewed;
                invoice.updated_at = now;
                Ok(())
            }
            from => Err(BillingError::InvalidTransition {
                from,
                to: InvoiceStatus::Viewed,
            }),
        }
    }

    /// Applies a payment.
    ///
    /// `paid_amount` grows by exactly `input.amount`; `balance_due` never
    /// grows. The part beyond the balance due is either refused or, with
    /// [`OverpaymentPolicy::RecordExcess`], recorded as overpayment. A paid
    /// invoice only accepts further payments as recorded excess.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount`, `NotPayable`, `Overpayment`, or
    /// `BillingError::Money` on a currency mismatch.
    pub fn apply_payment(
        invoice: &mut Invoice,
        input: PaymentInput,
        policy: OverpaymentPolicy,
        now: DateTime<Utc>,
    ) -> Result<Payment, BillingError> {
        input.amount.compare(&invoice.balance_due)?;
        if !input.amount.is_positive() {
            return Err(BillingError::InvalidAmount(input.amount));
        }

        let payable = invoice.status.is_payable()
            || (invoice.status == InvoiceStatus::Paid && policy == OverpaymentPolicy::RecordExcess);
        if !payable {
            return Err(BillingError::NotPayable(invoice.status));
        }

        let (applied_amount, excess_amount) =
            if input.amount.minor_units > invoice.balance_due.minor_units {
                if policy == OverpaymentPolicy::Reject {
                    return Err(BillingError::Overpayment {
                        balance_due: invoice.balance_due,
                        attempted: input.amount,
                    });
                }
                (
                    invoice.balance_due,
                    input.amount.subtract(&invoice.balance_due)?,
                )
            } else {
                (input.amount, Money::zero(invoice.currency))
            };

        let paid_amount = invoice.paid_amount.add(&input.amount)?;
        let overpayment_amount = invoice.overpayment_amount.add(&excess_amount)?;

        let mut next = invoice.clone();
        next.paid_amount = paid_amount;
        next.overpayment_amount = overpayment_amount;
        next.balance_due = Self::balance(&next)?;
        if next.balance_due.is_zero() {
            next.status = InvoiceStatus::Paid;
        }
        next.updated_at = now;
        *invoice = next;

        Ok(Payment {
            id: PaymentId::new(),
            invoice_id: invoice.id,
            amount: input.amount,
            applied_amount,
            excess_amount,
            method: input.method,
            payment_date: input.payment_date,
            reference: input.reference,
            recorded_by: input.recorded_by,
            created_at: now,
        })
    }

    /// Writes off part or all of the balance due. Clearing the balance moves
    /// the invoice to `WrittenOff`.
    ///
    /// # Errors
    ///
    /// Returns `ReasonRequired`, `InvalidAmount`, `NotPayable`, or
    /// `WriteOffExceedsBalance`.
    pub fn write_off(
        invoice: &mut Invoice,
        amount: Money,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(), BillingError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(BillingError::ReasonRequired("write off"));
        }
        amount.compare(&invoice.balance_due)?;
        if !amount.is_positive() {
            return Err(BillingError::InvalidAmount(amount));
        }
        if !invoice.status.is_payable() {
            return Err(BillingError::NotPayable(invoice.status));
        }
        if amount.minor_units > invoice.balance_due.minor_units {
            return Err(BillingError::WriteOffExceedsBalance {
                balance_due: invoice.balance_due,
                requested: amount,
            });
        }

        let mut next = invoice.clone();
        next.write_off_amount = invoice.write_off_amount.add(&amount)?;
        next.balance_due = Self::balance(&next)?;
        next.write_off_reason = Some(reason.to_string());
        if next.balance_due.is_zero() {
            next.status = InvoiceStatus::WrittenOff;
        }
        next.updated_at = now;
        *invoice = next;
        Ok(())
    }

    /// Cancels an invoice that has received no payments.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` from a terminal status and `HasPayments`
    /// once any payment was applied.
    pub fn cancel(invoice: &mut Invoice, now: DateTime<Utc>) -> Result<(), BillingError> {
        if invoice.status.is_terminal() {
            return Err(BillingError::InvalidTransition {
                from: invoice.status,
                to: InvoiceStatus::Cancelled,
            });
        }
        if !invoice.paid_amount.is_zero() {
            return Err(BillingError::HasPayments(invoice.paid_amount));
        }
        invoice.status = InvoiceStatus::Cancelled;
        invoice.updated_at = now;
        Ok(())
    }

    /// Returns true if `from → to` is a transition some operation performs.
    #[must_use]
    pub fn is_valid_transition(from: InvoiceStatus, to: InvoiceStatus) -> bool {
        use InvoiceStatus::{
            Approved, Cancelled, Draft, Paid, PendingApproval, Sent, Viewed, WrittenOff,
        };
        matches!(
            (from, to),
            (Draft, PendingApproval)
                | (PendingApproval, Approved | Draft)
                | (Approved, Sent)
                | (Sent, Viewed)
                | (Approved | Sent | Viewed, Paid | WrittenOff)
                | (Draft | PendingApproval | Approved | Sent | Viewed, Cancelled)
        )
    }

    /// `max(0, total - paid - write_off)`.
    fn balance(invoice: &Invoice) -> Result<Money, BillingError> {
        Ok(invoice
            .total_amount
            .subtract(&invoice.paid_amount)?
            .subtract(&invoice.write_off_amount)?
            .floor_at_zero())
    }

    fn ensure_editable(invoice: &Invoice) -> Result<(), BillingError> {
        if invoice.status.is_editable() {
            Ok(())
        } else {
            Err(BillingError::InvoiceLocked {
                id: invoice.id,
                status: invoice.status,
            })
        }
    }

    fn ensure_status(
        invoice: &Invoice,
        expected: InvoiceStatus,
        to: InvoiceStatus,
    ) -> Result<(), BillingError> {
        if invoice.status == expected {
            Ok(())
        } else {
            Err(BillingError::InvalidTransition {
                from: invoice.status,
                to,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::tax::{FlatRateTax, MockTaxCalculator, NoTax};
    use crate::billing::types::{LineItemKind, PaymentMethod};
    use chrono::NaiveDate;
    use frith_shared::types::ClientId;
    use frith_shared::Currency;
    use rust_decimal_macros::dec;

    fn usd(minor: i64) -> Money {
        Money::from_minor(minor, Currency::USD)
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn issue_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    fn draft() -> Invoice {
        InvoiceLedger::create_draft(
            OrganizationId::new(),
            "FRITH-000001".to_string(),
            NewInvoice {
                client_id: ClientId::new(),
                matter_id: None,
                currency: Currency::USD,
                issue_date: issue_date(),
                due_date: None,
                notes: None,
                terms: Some("Net 30".to_string()),
                created_by: UserId::new(),
            },
            30,
            now(),
        )
        .unwrap()
    }

    fn line(quantity: Decimal, rate: i64) -> NewLineItem {
        NewLineItem {
            kind: LineItemKind::Time,
            description: "Legal research".to_string(),
            quantity,
            rate: usd(rate),
            tax_code: None,
            billing_code: Some("L110".to_string()),
            service_date: Some(issue_date()),
        }
    }

    fn payment(minor: i64) -> PaymentInput {
        PaymentInput {
            amount: usd(minor),
            method: PaymentMethod::Check,
            payment_date: issue_date(),
            reference: Some("1001".to_string()),
            recorded_by: UserId::new(),
        }
    }

    /// Draft with 2 × $100 + 1 × $50, finalized, approved and sent.
    fn sent_invoice() -> Invoice {
        let mut invoice = draft();
        InvoiceLedger::add_line_item(&mut invoice, line(dec!(2), 10_000), now()).unwrap();
        InvoiceLedger::add_line_item(&mut invoice, line(dec!(1), 5_000), now()).unwrap();
        InvoiceLedger::finalize_totals(&mut invoice, &NoTax, now()).unwrap();
        InvoiceLedger::submit_for_approval(&mut invoice, now()).unwrap();
        InvoiceLedger::approve(&mut invoice, UserId::new(), now()).unwrap();
        InvoiceLedger::send(&mut invoice, now()).unwrap();
        invoice
    }

    #[test]
    fn test_default_due_date() {
        let invoice = draft();
        assert_eq!(invoice.due_date, NaiveDate::from_ymd_opt(2026, 3, 31).unwrap());
        assert_eq!(invoice.status, InvoiceStatus::Draft);
    }

    #[test]
    fn test_line_amounts_and_totals() {
        let invoice = sent_invoice();
        assert_eq!(invoice.subtotal, usd(25_000));
        assert_eq!(invoice.total_amount, usd(25_000));
        assert_eq!(invoice.balance_due, usd(25_000));
        assert_eq!(invoice.line_items[0].amount, usd(20_000));
        assert_eq!(invoice.line_items[1].line_number, 2);
    }

    #[test]
    fn test_fractional_hours_round_to_cents() {
        let mut invoice = draft();
        // 0.333 h × $250.00 = $83.25
        let item = InvoiceLedger::add_line_item(&mut invoice, line(dec!(0.333), 25_000), now())
            .unwrap();
        assert_eq!(item.amount, usd(8_325));
    }

    #[test]
    fn test_zero_total_invoice_is_paid_on_send() {
        let mut invoice = draft();
        InvoiceLedger::add_line_item(&mut invoice, line(dec!(1), 0), now()).unwrap();
        InvoiceLedger::finalize_totals(&mut invoice, &NoTax, now()).unwrap();
        InvoiceLedger::submit_for_approval(&mut invoice, now()).unwrap();
        InvoiceLedger::approve(&mut invoice, UserId::new(), now()).unwrap();
        InvoiceLedger::send(&mut invoice, now()).unwrap();

        assert_eq!(invoice.balance_due, usd(0));
        assert_eq!(invoice.status, InvoiceStatus::Paid);
        assert_eq!(invoice.sent_at, Some(now()));
        let later = issue_date() + chrono::Days::new(90);
        assert_eq!(invoice.effective_status(later), InvoiceStatus::Paid);

        let result =
            InvoiceLedger::apply_payment(&mut invoice, payment(100), OverpaymentPolicy::Reject, now());
        assert!(matches!(result, Err(BillingError::NotPayable(InvoiceStatus::Paid))));
    }

    #[test]
    fn test_partial_then_full_payment() {
        let mut invoice = sent_invoice();

        let first = InvoiceLedger::apply_payment(
            &mut invoice,
            payment(10_000),
            OverpaymentPolicy::Reject,
            now(),
        )
        .unwrap();
        assert_eq!(first.applied_amount, usd(10_000));
        assert_eq!(invoice.balance_due, usd(15_000));
        assert_eq!(invoice.status, InvoiceStatus::Sent);

        InvoiceLedger::apply_payment(
            &mut invoice,
            payment(15_000),
            OverpaymentPolicy::Reject,
            now(),
        )
        .unwrap();
        assert_eq!(invoice.balance_due, usd(0));
        assert_eq!(invoice.paid_amount, usd(25_000));
        assert_eq!(invoice.status, InvoiceStatus::Paid);
    }

    #[test]
    fn test_overpayment_policies() {
        let mut invoice = sent_invoice();
        let before = invoice.clone();

        let result = InvoiceLedger::apply_payment(
            &mut invoice,
            payment(30_000),
            OverpaymentPolicy::Reject,
            now(),
        );
        assert!(matches!(result, Err(BillingError::Overpayment { .. })));
        assert_eq!(invoice, before);

        let recorded = InvoiceLedger::apply_payment(
            &mut invoice,
            payment(30_000),
            OverpaymentPolicy::RecordExcess,
            now(),
        )
        .unwrap();
        assert_eq!(recorded.applied_amount, usd(25_000));
        assert_eq!(recorded.excess_amount, usd(5_000));
        assert_eq!(invoice.overpayment_amount, usd(5_000));
        assert_eq!(invoice.paid_amount, usd(30_000));
        assert_eq!(invoice.status, InvoiceStatus::Paid);

        assert!(matches!(
            InvoiceLedger::apply_payment(
                &mut invoice,
                payment(100),
                OverpaymentPolicy::Reject,
                now()
            ),
            Err(BillingError::NotPayable(InvoiceStatus::Paid))
        ));
    }

    #[test]
    fn test_payment_rejections() {
        let mut invoice = draft();
        assert!(matches!(
            InvoiceLedger::apply_payment(&mut invoice, payment(100), OverpaymentPolicy::Reject, now()),
            Err(BillingError::NotPayable(InvoiceStatus::Draft))
        ));

        let mut invoice = sent_invoice();
        assert!(matches!(
            InvoiceLedger::apply_payment(&mut invoice, payment(0), OverpaymentPolicy::Reject, now()),
            Err(BillingError::InvalidAmount(_))
        ));

        let mut eur = payment(100);
        eur.amount = Money::from_minor(100, Currency::EUR);
        let err = InvoiceLedger::apply_payment(&mut invoice, eur, OverpaymentPolicy::Reject, now())
            .unwrap_err();
        assert_eq!(err.error_code(), "CURRENCY_MISMATCH");
    }

    #[test]
    fn test_line_item_on_sent_invoice_is_locked() {
        let mut invoice = sent_invoice();
        let result = InvoiceLedger::add_line_item(&mut invoice, line(dec!(1), 100), now());
        assert!(matches!(
            result,
            Err(BillingError::InvoiceLocked {
                status: InvoiceStatus::Sent,
                ..
            })
        ));
        assert_eq!(invoice.line_items.len(), 2);
    }

    #[test]
    fn test_line_item_validation() {
        let mut invoice = draft();
        assert!(matches!(
            InvoiceLedger::add_line_item(&mut invoice, line(dec!(0), 100), now()),
            Err(BillingError::InvalidQuantity(_))
        ));
        assert!(matches!(
            InvoiceLedger::add_line_item(&mut invoice, line(dec!(1), -100), now()),
            Err(BillingError::InvalidRate(_))
        ));
        let mut eur = line(dec!(1), 100);
        eur.rate = Money::from_minor(100, Currency::EUR);
        assert!(matches!(
            InvoiceLedger::add_line_item(&mut invoice, eur, now()),
            Err(BillingError::Money(_))
        ));
        assert!(invoice.line_items.is_empty());

        // Zero-rate courtesy lines are allowed.
        InvoiceLedger::add_line_item(&mut invoice, line(dec!(1), 0), now()).unwrap();
    }

    #[test]
    fn test_finalize_with_tax_and_editing_resets() {
        let mut invoice = draft();
        let mut taxable = line(dec!(2), 10_000);
        taxable.tax_code = Some("GST".to_string());
        InvoiceLedger::add_line_item(&mut invoice, taxable, now()).unwrap();
        InvoiceLedger::add_line_item(&mut invoice, line(dec!(1), 5_000), now()).unwrap();

        let tax = FlatRateTax::new(dec!(0.10)).with_rate("GST", dec!(0.05));
        InvoiceLedger::finalize_totals(&mut invoice, &tax, now()).unwrap();
        assert_eq!(invoice.tax_amount, usd(1_000));
        assert_eq!(invoice.total_amount, usd(26_000));
        assert!(invoice.totals_finalized);

        InvoiceLedger::add_line_item(&mut invoice, line(dec!(1), 100), now()).unwrap();
        assert!(!invoice.totals_finalized);
        assert_eq!(invoice.tax_amount, usd(0));
        assert!(matches!(
            InvoiceLedger::submit_for_approval(&mut invoice, now()),
            Err(BillingError::TotalsNotFinalized)
        ));
    }

    #[test]
    fn test_finalize_rejects_bad_tax() {
        let mut invoice = draft();
        InvoiceLedger::add_line_item(&mut invoice, line(dec!(1), 100), now()).unwrap();

        let mut tax = MockTaxCalculator::new();
        tax.expect_calculate()
            .times(1)
            .returning(|_| Ok(Money::from_minor(-1, Currency::USD)));
        assert!(matches!(
            InvoiceLedger::finalize_totals(&mut invoice, &tax, now()),
            Err(BillingError::TaxCalculation(_))
        ));
        assert!(!invoice.totals_finalized);
    }

    #[test]
    fn test_submit_requires_lines() {
        let mut invoice = draft();
        InvoiceLedger::finalize_totals(&mut invoice, &NoTax, now()).unwrap();
        assert!(matches!(
            InvoiceLedger::submit_for_approval(&mut invoice, now()),
            Err(BillingError::NoLineItems)
        ));
    }

    #[test]
    fn test_reject_returns_to_draft() {
        let mut invoice = draft();
        InvoiceLedger::add_line_item(&mut invoice, line(dec!(1), 100), now()).unwrap();
        InvoiceLedger::finalize_totals(&mut invoice, &NoTax, now()).unwrap();
        InvoiceLedger::submit_for_approval(&mut invoice, now()).unwrap();

        assert!(matches!(
            InvoiceLedger::reject(&mut invoice, " ", now()),
            Err(BillingError::ReasonRequired(_))
        ));
        InvoiceLedger::reject(&mut invoice, "wrong matter", now()).unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Draft);
    }

    #[test]
    fn test_overdue_is_derived() {
        let mut invoice = sent_invoice();
        let after_due = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();
        assert_eq!(invoice.effective_status(issue_date()), InvoiceStatus::Sent);
        assert_eq!(invoice.effective_status(after_due), InvoiceStatus::Overdue);
        assert_eq!(invoice.status, InvoiceStatus::Sent);

        InvoiceLedger::mark_viewed(&mut invoice, now()).unwrap();
        InvoiceLedger::mark_viewed(&mut invoice, now()).unwrap();
        assert_eq!(invoice.effective_status(after_due), InvoiceStatus::Overdue);

        InvoiceLedger::apply_payment(
            &mut invoice,
            payment(25_000),
            OverpaymentPolicy::Reject,
            now(),
        )
        .unwrap();
        assert_eq!(invoice.effective_status(after_due), InvoiceStatus::Paid);
    }

    #[test]
    fn test_write_off() {
        let mut invoice = sent_invoice();
        InvoiceLedger::apply_payment(
            &mut invoice,
            payment(20_000),
            OverpaymentPolicy::Reject,
            now(),
        )
        .unwrap();

        assert!(matches!(
            InvoiceLedger::write_off(&mut invoice, usd(6_000), "uncollectible", now()),
            Err(BillingError::WriteOffExceedsBalance { .. })
        ));
        InvoiceLedger::write_off(&mut invoice, usd(5_000), "uncollectible", now()).unwrap();
        assert_eq!(invoice.balance_due, usd(0));
        assert_eq!(invoice.write_off_amount, usd(5_000));
        assert_eq!(invoice.status, InvoiceStatus::WrittenOff);
    }

    #[test]
    fn test_cancel() {
        let mut invoice = sent_invoice();
        InvoiceLedger::apply_payment(&mut invoice, payment(100), OverpaymentPolicy::Reject, now())
            .unwrap();
        assert!(matches!(
            InvoiceLedger::cancel(&mut invoice, now()),
            Err(BillingError::HasPayments(_))
        ));

        let mut invoice = draft();
        InvoiceLedger::cancel(&mut invoice, now()).unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Cancelled);
        assert!(matches!(
            InvoiceLedger::cancel(&mut invoice, now()),
            Err(BillingError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_transition_table() {
        assert!(InvoiceLedger::is_valid_transition(
            InvoiceStatus::Draft,
            InvoiceStatus::PendingApproval
        ));
        assert!(InvoiceLedger::is_valid_transition(
            InvoiceStatus::Viewed,
            InvoiceStatus::Paid
        ));
        assert!(!InvoiceLedger::is_valid_transition(
            InvoiceStatus::Draft,
            InvoiceStatus::Sent
        ));
        assert!(!InvoiceLedger::is_valid_transition(
            InvoiceStatus::Paid,
            InvoiceStatus::Cancelled
        ));
    }
}
