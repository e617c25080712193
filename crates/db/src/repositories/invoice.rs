//! Invoice repository for drafting, the approval workflow and payments.
//!
//! Every mutation loads the invoice row `FOR UPDATE`, applies one
//! `InvoiceLedger` operation and writes the header back in the same
//! transaction. Invoice numbers come from a per-organization sequence row that
//! is locked while the next number is allocated.

use chrono::{DateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, SqlErr,
};
use tracing::{info, warn};
use uuid::Uuid;

use frith_core::billing::{
    BillingError, Invoice, InvoiceLedger, InvoiceNumber, LineItem, NewInvoice, NewLineItem,
    OverpaymentPolicy, Payment, PaymentInput, TaxCalculator,
};
use frith_shared::Money;
use frith_shared::config::BillingConfig;
use frith_shared::types::{InvoiceId, OrganizationId, PageRequest, PageResponse, UserId};

use crate::convert;
use crate::entities::{invoice_line_items, invoice_sequences, invoices, payments};
use crate::rls::begin_scoped;

fn db(err: DbErr) -> BillingError {
    BillingError::Database(err.to_string())
}

/// Invoice repository.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    db: DatabaseConnection,
    billing: BillingConfig,
}

impl InvoiceRepository {
    /// Creates a new invoice repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection, billing: BillingConfig) -> Self {
        Self { db, billing }
    }

    /// Creates a draft invoice with the organization's next invoice number.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDueDate`, `DuplicateInvoiceNumber` if the allocated
    /// number is already taken, or `Database`.
    pub async fn create_invoice(
        &self,
        organization_id: OrganizationId,
        input: NewInvoice,
    ) -> Result<Invoice, BillingError> {
        let now = Utc::now();
        let txn = begin_scoped(&self.db, organization_id).await.map_err(db)?;

        let number = self.allocate_number(&txn, organization_id).await?;
        let invoice = InvoiceLedger::create_draft(
            organization_id,
            number.to_string(),
            input,
            self.billing.default_due_days,
            now,
        )?;

        header(&invoice)
            .insert(&txn)
            .await
            .map_err(|e| duplicate_or_db(e, &invoice.invoice_number))?;

        invoice_sequences::ActiveModel {
            organization_id: Set(organization_id.into_inner()),
            last_sequence: Set(i64::try_from(number.sequence)
                .map_err(|_| BillingError::Database("Invoice sequence overflow".to_string()))?),
            ..Default::default()
        }
        .update(&txn)
        .await
        .map_err(db)?;

        txn.commit().await.map_err(db)?;
        info!(
            invoice_id = %invoice.id,
            invoice_number = %invoice.invoice_number,
            client_id = %invoice.client_id,
            "Invoice drafted"
        );
        Ok(invoice)
    }

    /// Fetches an invoice with its line items.
    ///
    /// # Errors
    ///
    /// Returns `InvoiceNotFound` or `Database`.
    pub async fn get_invoice(
        &self,
        organization_id: OrganizationId,
        invoice_id: InvoiceId,
    ) -> Result<Invoice, BillingError> {
        let txn = begin_scoped(&self.db, organization_id).await.map_err(db)?;
        let invoice = load_invoice(&txn, organization_id, invoice_id, false).await?;
        txn.commit().await.map_err(db)?;
        Ok(invoice)
    }

    /// Lists invoices, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Database` on failure.
    pub async fn list_invoices(
        &self,
        organization_id: OrganizationId,
        page: &PageRequest,
    ) -> Result<PageResponse<Invoice>, BillingError> {
        let txn = begin_scoped(&self.db, organization_id).await.map_err(db)?;
        let query = invoices::Entity::find()
            .filter(invoices::Column::OrganizationId.eq(organization_id.into_inner()));
        let total = query.clone().count(&txn).await.map_err(db)?;
        let headers = query
            .order_by_desc(invoices::Column::CreatedAt)
            .order_by_desc(invoices::Column::Id)
            .offset(page.offset())
            .limit(page.limit())
            .all(&txn)
            .await
            .map_err(db)?;

        let ids: Vec<Uuid> = headers.iter().map(|h| h.id).collect();
        let mut lines = invoice_line_items::Entity::find()
            .filter(invoice_line_items::Column::InvoiceId.is_in(ids))
            .order_by_asc(invoice_line_items::Column::LineNumber)
            .all(&txn)
            .await
            .map_err(db)?;
        txn.commit().await.map_err(db)?;

        let mut data = Vec::with_capacity(headers.len());
        for h in headers {
            let (own, rest): (Vec<_>, Vec<_>) = lines.into_iter().partition(|l| l.invoice_id == h.id);
            lines = rest;
            data.push(convert::invoice(h, own).map_err(db)?);
        }
        Ok(PageResponse::new(data, page, total))
    }

    /// Adds a line item to a draft invoice.
    ///
    /// # Errors
    ///
    /// Returns `InvoiceLocked` unless the invoice is a draft, the
    /// line-validation errors of `InvoiceLedger::add_line_item`,
    /// `InvoiceNotFound` or `Database`.
    pub async fn add_line_item(
        &self,
        organization_id: OrganizationId,
        invoice_id: InvoiceId,
        input: NewLineItem,
    ) -> Result<LineItem, BillingError> {
        let (_, line) = self
            .mutate(
                organization_id,
                invoice_id,
                "add line item",
                |invoice, now| InvoiceLedger::add_line_item(invoice, input, now),
                |_| None,
            )
            .await?;
        Ok(line)
    }

    /// Computes subtotal, tax and total for a draft invoice.
    ///
    /// # Errors
    ///
    /// Returns `InvoiceLocked`, `TaxCalculation`, `InvoiceNotFound` or
    /// `Database`.
    pub async fn finalize_totals(
        &self,
        organization_id: OrganizationId,
        invoice_id: InvoiceId,
        tax: &dyn TaxCalculator,
    ) -> Result<Invoice, BillingError> {
        self.transition(organization_id, invoice_id, "finalize totals", |invoice, now| {
            InvoiceLedger::finalize_totals(invoice, tax, now)
        })
        .await
    }

    /// Draft → PendingApproval.
    ///
    /// # Errors
    ///
    /// Returns `NoLineItems`, `TotalsNotFinalized`, `InvalidTransition`,
    /// `InvoiceNotFound` or `Database`.
    pub async fn submit_for_approval(
        &self,
        organization_id: OrganizationId,
        invoice_id: InvoiceId,
    ) -> Result<Invoice, BillingError> {
        self.transition(organization_id, invoice_id, "submit", InvoiceLedger::submit_for_approval)
            .await
    }

    /// PendingApproval → Approved.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition`, `InvoiceNotFound` or `Database`.
    pub async fn approve(
        &self,
        organization_id: OrganizationId,
        invoice_id: InvoiceId,
        approved_by: UserId,
    ) -> Result<Invoice, BillingError> {
        self.transition(organization_id, invoice_id, "approve", |invoice, now| {
            InvoiceLedger::approve(invoice, approved_by, now)
        })
        .await
    }

    /// PendingApproval → Draft.
    ///
    /// # Errors
    ///
    /// Returns `ReasonRequired`, `InvalidTransition`, `InvoiceNotFound` or
    /// `Database`.
    pub async fn reject(
        &self,
        organization_id: OrganizationId,
        invoice_id: InvoiceId,
        reason: &str,
    ) -> Result<Invoice, BillingError> {
        let invoice = self
            .transition(organization_id, invoice_id, "reject", |invoice, now| {
                InvoiceLedger::reject(invoice, reason, now)
            })
            .await?;
        info!(invoice_id = %invoice_id, reason, "Invoice returned to draft");
        Ok(invoice)
    }

    /// Approved → Sent.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition`, `InvoiceNotFound` or `Database`.
    pub async fn send(
        &self,
        organization_id: OrganizationId,
        invoice_id: InvoiceId,
    ) -> Result<Invoice, BillingError> {
        self.transition(organization_id, invoice_id, "send", InvoiceLedger::send)
            .await
    }

    /// Sent → Viewed; a no-op once viewed.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition`, `InvoiceNotFound` or `Database`.
    pub async fn mark_viewed(
        &self,
        organization_id: OrganizationId,
        invoice_id: InvoiceId,
    ) -> Result<Invoice, BillingError> {
        self.transition(organization_id, invoice_id, "mark viewed", InvoiceLedger::mark_viewed)
            .await
    }

    /// Cancels an invoice with no payments.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition`, `HasPayments`, `InvoiceNotFound` or
    /// `Database`.
    pub async fn cancel(
        &self,
        organization_id: OrganizationId,
        invoice_id: InvoiceId,
    ) -> Result<Invoice, BillingError> {
        self.transition(organization_id, invoice_id, "cancel", InvoiceLedger::cancel)
            .await
    }

    /// Applies a payment and stores it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount`, `NotPayable`, `Overpayment`,
    /// `InvoiceNotFound` or `Database`.
    pub async fn apply_payment(
        &self,
        organization_id: OrganizationId,
        invoice_id: InvoiceId,
        input: PaymentInput,
        policy: OverpaymentPolicy,
    ) -> Result<(Invoice, Payment), BillingError> {
        let (invoice, payment) = self
            .mutate(
                organization_id,
                invoice_id,
                "apply payment",
                |invoice, now| InvoiceLedger::apply_payment(invoice, input, policy, now),
                |payment: &Payment| Some(payment),
            )
            .await?;
        info!(
            invoice_id = %invoice_id,
            payment_id = %payment.id,
            amount = %payment.amount,
            excess = %payment.excess_amount,
            balance_due = %invoice.balance_due,
            "Payment applied"
        );
        Ok((invoice, payment))
    }

    /// Writes off part or all of the balance due.
    ///
    /// # Errors
    ///
    /// Returns `ReasonRequired`, `InvalidAmount`, `NotPayable`,
    /// `WriteOffExceedsBalance`, `InvoiceNotFound` or `Database`.
    pub async fn write_off(
        &self,
        organization_id: OrganizationId,
        invoice_id: InvoiceId,
        amount: Money,
        reason: &str,
    ) -> Result<Invoice, BillingError> {
        let invoice = self
            .transition(organization_id, invoice_id, "write off", |invoice, now| {
                InvoiceLedger::write_off(invoice, amount, reason, now)
            })
            .await?;
        info!(invoice_id = %invoice_id, amount = %amount, reason, "Invoice balance written off");
        Ok(invoice)
    }

    /// Lists payments recorded against an invoice, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `InvoiceNotFound` or `Database`.
    pub async fn list_payments(
        &self,
        organization_id: OrganizationId,
        invoice_id: InvoiceId,
    ) -> Result<Vec<Payment>, BillingError> {
        let txn = begin_scoped(&self.db, organization_id).await.map_err(db)?;
        let invoice = load_invoice(&txn, organization_id, invoice_id, false).await?;
        let models = payments::Entity::find()
            .filter(payments::Column::InvoiceId.eq(invoice_id.into_inner()))
            .order_by_asc(payments::Column::CreatedAt)
            .order_by_asc(payments::Column::Id)
            .all(&txn)
            .await
            .map_err(db)?;
        txn.commit().await.map_err(db)?;
        models
            .into_iter()
            .map(|m| convert::payment(m, invoice.currency).map_err(db))
            .collect()
    }

    // =========================================================================
    // Internal helpers
    // =========================================================================

    async fn transition<F>(
        &self,
        organization_id: OrganizationId,
        invoice_id: InvoiceId,
        action: &'static str,
        op: F,
    ) -> Result<Invoice, BillingError>
    where
        F: FnOnce(&mut Invoice, DateTime<Utc>) -> Result<(), BillingError>,
    {
        let (invoice, ()) = self
            .mutate(organization_id, invoice_id, action, op, |()| None)
            .await?;
        Ok(invoice)
    }

    /// Runs `op` on the locked invoice and persists the result: header
    /// columns, line items added by `op`, and the payment `payment_of` picks
    /// out of its output.
    async fn mutate<F, T, P>(
        &self,
        organization_id: OrganizationId,
        invoice_id: InvoiceId,
        action: &'static str,
        op: F,
        payment_of: P,
    ) -> Result<(Invoice, T), BillingError>
    where
        F: FnOnce(&mut Invoice, DateTime<Utc>) -> Result<T, BillingError>,
        P: FnOnce(&T) -> Option<&Payment>,
    {
        let now = Utc::now();
        let txn = begin_scoped(&self.db, organization_id).await.map_err(db)?;
        let mut invoice = load_invoice(&txn, organization_id, invoice_id, true).await?;
        let before = invoice.status;
        let existing_lines = invoice.line_items.len();

        let output = op(&mut invoice, now).inspect_err(|err| {
            warn!(invoice_id = %invoice_id, action, error = %err, "Invoice operation rejected");
        })?;

        header(&invoice).update(&txn).await.map_err(db)?;
        if invoice.line_items.len() > existing_lines {
            let new_lines = invoice.line_items[existing_lines..]
                .iter()
                .map(|line| line_model(invoice.id, line))
                .collect::<Result<Vec<_>, _>>()?;
            invoice_line_items::Entity::insert_many(new_lines)
                .exec(&txn)
                .await
                .map_err(db)?;
        }
        if let Some(payment) = payment_of(&output) {
            payment_model(organization_id, payment)
                .insert(&txn)
                .await
                .map_err(db)?;
        }

        txn.commit().await.map_err(db)?;
        if before != invoice.status {
            info!(
                invoice_id = %invoice_id,
                from = %before,
                to = %invoice.status,
                "Invoice status changed"
            );
        }
        Ok((invoice, output))
    }

    async fn allocate_number(
        &self,
        txn: &DatabaseTransaction,
        organization_id: OrganizationId,
    ) -> Result<InvoiceNumber, BillingError> {
        invoice_sequences::Entity::insert(invoice_sequences::ActiveModel {
            organization_id: Set(organization_id.into_inner()),
            prefix: Set(self.billing.invoice_prefix.clone()),
            last_sequence: Set(0),
        })
        .on_conflict(
            OnConflict::column(invoice_sequences::Column::OrganizationId)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(txn)
        .await
        .map_err(db)?;

        let sequence = invoice_sequences::Entity::find_by_id(organization_id.into_inner())
            .lock_exclusive()
            .one(txn)
            .await
            .map_err(db)?
            .ok_or_else(|| BillingError::Database("Invoice sequence row missing".to_string()))?;
        let last = u64::try_from(sequence.last_sequence)
            .map_err(|_| BillingError::Database("Negative invoice sequence".to_string()))?;
        Ok(InvoiceNumber::next(
            &sequence.prefix,
            last,
            self.billing.invoice_number_width,
        ))
    }
}

// =============================================================================
// Conversion helpers
// =============================================================================

fn duplicate_or_db(err: DbErr, number: &str) -> BillingError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            BillingError::DuplicateInvoiceNumber(number.to_string())
        }
        _ => db(err),
    }
}

fn header(invoice: &Invoice) -> invoices::ActiveModel {
    invoices::ActiveModel {
        id: Set(invoice.id.into_inner()),
        organization_id: Set(invoice.organization_id.into_inner()),
        client_id: Set(invoice.client_id.into_inner()),
        matter_id: Set(invoice.matter_id.map(|m| m.into_inner())),
        invoice_number: Set(invoice.invoice_number.clone()),
        currency: Set(invoice.currency.code().to_string()),
        issue_date: Set(invoice.issue_date),
        due_date: Set(invoice.due_date),
        status: Set(invoice.status.as_str().to_string()),
        subtotal: Set(invoice.subtotal.minor_units),
        tax_amount: Set(invoice.tax_amount.minor_units),
        total_amount: Set(invoice.total_amount.minor_units),
        paid_amount: Set(invoice.paid_amount.minor_units),
        overpayment_amount: Set(invoice.overpayment_amount.minor_units),
        write_off_amount: Set(invoice.write_off_amount.minor_units),
        balance_due: Set(invoice.balance_due.minor_units),
        totals_finalized: Set(invoice.totals_finalized),
        notes: Set(invoice.notes.clone()),
        terms: Set(invoice.terms.clone()),
        write_off_reason: Set(invoice.write_off_reason.clone()),
        created_by: Set(invoice.created_by.into_inner()),
        approved_by: Set(invoice.approved_by.map(UserId::into_inner)),
        sent_at: Set(invoice.sent_at.map(Into::into)),
        created_at: Set(invoice.created_at.into()),
        updated_at: Set(invoice.updated_at.into()),
    }
}

fn payment_model(organization_id: OrganizationId, payment: &Payment) -> payments::ActiveModel {
    payments::ActiveModel {
        id: Set(payment.id.into_inner()),
        organization_id: Set(organization_id.into_inner()),
        invoice_id: Set(payment.invoice_id.into_inner()),
        amount: Set(payment.amount.minor_units),
        applied_amount: Set(payment.applied_amount.minor_units),
        excess_amount: Set(payment.excess_amount.minor_units),
        method: Set(payment.method.as_str().to_string()),
        payment_date: Set(payment.payment_date),
        reference: Set(payment.reference.clone()),
        recorded_by: Set(payment.recorded_by.into_inner()),
        created_at: Set(payment.created_at.into()),
    }
}

fn line_model(
    invoice_id: InvoiceId,
    line: &LineItem,
) -> Result<invoice_line_items::ActiveModel, BillingError> {
    Ok(invoice_line_items::ActiveModel {
        id: Set(line.id.into_inner()),
        invoice_id: Set(invoice_id.into_inner()),
        line_number: Set(i32::try_from(line.line_number)
            .map_err(|_| BillingError::Database("Too many line items".to_string()))?),
        kind: Set(line.kind.as_str().to_string()),
        description: Set(line.description.clone()),
        quantity: Set(line.quantity),
        rate: Set(line.rate.minor_units),
        amount: Set(line.amount.minor_units),
        tax_code: Set(line.tax_code.clone()),
        billing_code: Set(line.billing_code.clone()),
        service_date: Set(line.service_date),
    })
}

async fn load_invoice(
    txn: &DatabaseTransaction,
    organization_id: OrganizationId,
    invoice_id: InvoiceId,
    for_update: bool,
) -> Result<Invoice, BillingError> {
    let mut query = invoices::Entity::find_by_id(invoice_id.into_inner())
        .filter(invoices::Column::OrganizationId.eq(organization_id.into_inner()));
    if for_update {
        query = query.lock_exclusive();
    }
    let model = query
        .one(txn)
        .await
        .map_err(db)?
        .ok_or(BillingError::InvoiceNotFound(invoice_id))?;
    let lines = invoice_line_items::Entity::find()
        .filter(invoice_line_items::Column::InvoiceId.eq(invoice_id.into_inner()))
        .order_by_asc(invoice_line_items::Column::LineNumber)
        .all(txn)
        .await
        .map_err(db)?;
    convert::invoice(model, lines).map_err(db)
}
