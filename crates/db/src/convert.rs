//! Conversions between stored rows and core domain types.
//!
//! Stored text that no longer parses (an unknown status, a malformed currency
//! code) surfaces as `DbErr::Type`; repositories map it like any other
//! database failure.

use chrono::{DateTime, Utc};
use sea_orm::DbErr;
use sea_orm::prelude::DateTimeWithTimeZone;

use frith_core::billing::{
    Invoice, InvoiceStatus, LineItem, LineItemKind, Payment, PaymentMethod,
};
use frith_core::reconciliation::{
    BankStatementImport, Reconciliation, ReconciliationReport, ReconciliationStatus,
    StatementFormat, StatementLine, StatementPeriod,
};
use frith_core::trust::{
    Clearance, ClientLedger, TrustAccount, TrustAccountType, TrustStatus, TrustTransaction,
    TrustTransactionType,
};
use frith_shared::types::{
    ClientId, ClientLedgerId, InvoiceId, LineItemId, MatterId, OrganizationId, PaymentId,
    ReconciliationId, StatementImportId, StatementLineId, TrustAccountId, TrustTransactionId,
    UserId,
};
use frith_shared::{Currency, Money};

use crate::entities::{
    bank_statement_imports, bank_statement_lines, client_ledgers, invoice_line_items, invoices,
    payments, reconciliations, trust_accounts, trust_transactions,
};

pub(crate) fn currency(code: &str) -> Result<Currency, DbErr> {
    Currency::new(code).map_err(|e| DbErr::Type(e.to_string()))
}

fn parsed<T>(value: &str, parse: impl FnOnce(&str) -> Option<T>, what: &str) -> Result<T, DbErr> {
    parse(value).ok_or_else(|| DbErr::Type(format!("Invalid stored {what}: {value}")))
}

pub(crate) fn utc(ts: DateTimeWithTimeZone) -> DateTime<Utc> {
    ts.with_timezone(&Utc)
}

pub(crate) fn trust_account(m: trust_accounts::Model) -> Result<TrustAccount, DbErr> {
    let currency = currency(&m.currency)?;
    Ok(TrustAccount {
        id: TrustAccountId::from_uuid(m.id),
        organization_id: OrganizationId::from_uuid(m.organization_id),
        name: m.name,
        bank_name: m.bank_name,
        account_number_last4: m.account_number_last4,
        account_type: parsed(&m.account_type, TrustAccountType::parse, "account type")?,
        currency,
        status: parsed(&m.status, TrustStatus::parse, "account status")?,
        book_balance: Money::from_minor(m.book_balance, currency),
        last_reconciled_date: m.last_reconciled_date,
        last_reconciled_balance: m
            .last_reconciled_balance
            .map(|minor| Money::from_minor(minor, currency)),
        created_at: utc(m.created_at),
    })
}

pub(crate) fn client_ledger(
    m: client_ledgers::Model,
    currency: Currency,
) -> Result<ClientLedger, DbErr> {
    Ok(ClientLedger {
        id: ClientLedgerId::from_uuid(m.id),
        trust_account_id: TrustAccountId::from_uuid(m.trust_account_id),
        client_id: ClientId::from_uuid(m.client_id),
        matter_id: m.matter_id.map(MatterId::from_uuid),
        name: m.name,
        balance: Money::from_minor(m.balance, currency),
        status: parsed(&m.status, TrustStatus::parse, "ledger status")?,
        version: m.version,
        last_activity_at: m.last_activity_at.map(utc),
        created_at: utc(m.created_at),
    })
}

pub(crate) fn trust_transaction(
    m: trust_transactions::Model,
    currency: Currency,
) -> Result<TrustTransaction, DbErr> {
    let clearance = match (m.cleared_statement_id, m.cleared_period_end, m.cleared_by, m.cleared_at)
    {
        (Some(statement), Some(period_end), Some(by), Some(at)) => Some(Clearance {
            statement_import_id: StatementImportId::from_uuid(statement),
            statement_period_end: period_end,
            cleared_by: UserId::from_uuid(by),
            cleared_at: utc(at),
        }),
        (None, None, None, None) => None,
        _ => {
            return Err(DbErr::Type(format!(
                "Incomplete clearance on trust transaction {}",
                m.id
            )));
        }
    };

    Ok(TrustTransaction {
        id: TrustTransactionId::from_uuid(m.id),
        trust_account_id: TrustAccountId::from_uuid(m.trust_account_id),
        client_ledger_id: ClientLedgerId::from_uuid(m.client_ledger_id),
        transaction_type: parsed(
            &m.transaction_type,
            TrustTransactionType::parse,
            "transaction type",
        )?,
        amount: Money::from_minor(m.amount, currency),
        balance_after: Money::from_minor(m.balance_after, currency),
        description: m.description,
        transaction_date: m.transaction_date,
        reference: m.reference,
        reversal_of: m.reversal_of.map(TrustTransactionId::from_uuid),
        created_by: UserId::from_uuid(m.created_by),
        created_at: utc(m.created_at),
        clearance,
    })
}

pub(crate) fn statement_import(
    m: bank_statement_imports::Model,
    lines: Vec<bank_statement_lines::Model>,
) -> Result<BankStatementImport, DbErr> {
    let currency = currency(&m.currency)?;
    let period = StatementPeriod::new(m.period_start, m.period_end)
        .map_err(|e| DbErr::Type(e.to_string()))?;
    Ok(BankStatementImport {
        id: StatementImportId::from_uuid(m.id),
        organization_id: OrganizationId::from_uuid(m.organization_id),
        trust_account_id: TrustAccountId::from_uuid(m.trust_account_id),
        period,
        opening_balance: Money::from_minor(m.opening_balance, currency),
        closing_balance: Money::from_minor(m.closing_balance, currency),
        format: parsed(&m.format, StatementFormat::parse, "statement format")?,
        lines: lines
            .into_iter()
            .map(|line| StatementLine {
                id: StatementLineId::from_uuid(line.id),
                date: line.line_date,
                amount: Money::from_minor(line.amount, currency),
                description: line.description,
                reference: line.reference,
            })
            .collect(),
        imported_by: UserId::from_uuid(m.imported_by),
        imported_at: utc(m.imported_at),
    })
}

pub(crate) fn reconciliation(m: reconciliations::Model) -> Result<Reconciliation, DbErr> {
    let report: ReconciliationReport = serde_json::from_value(m.report)
        .map_err(|e| DbErr::Json(format!("Invalid stored reconciliation report: {e}")))?;
    Ok(Reconciliation {
        id: ReconciliationId::from_uuid(m.id),
        organization_id: OrganizationId::from_uuid(m.organization_id),
        statement_import_id: m.statement_import_id.map(StatementImportId::from_uuid),
        report,
        status: parsed(&m.status, ReconciliationStatus::parse, "reconciliation status")?,
        prepared_by: UserId::from_uuid(m.prepared_by),
        prepared_at: utc(m.prepared_at),
        submitted_by: m.submitted_by.map(UserId::from_uuid),
        approved_by: m.approved_by.map(UserId::from_uuid),
        approved_at: m.approved_at.map(utc),
        override_justification: m.override_justification,
    })
}

pub(crate) fn line_item(
    m: invoice_line_items::Model,
    currency: Currency,
) -> Result<LineItem, DbErr> {
    Ok(LineItem {
        id: LineItemId::from_uuid(m.id),
        line_number: u32::try_from(m.line_number)
            .map_err(|_| DbErr::Type(format!("Invalid line number {}", m.line_number)))?,
        kind: parsed(&m.kind, LineItemKind::parse, "line item kind")?,
        description: m.description,
        quantity: m.quantity,
        rate: Money::from_minor(m.rate, currency),
        amount: Money::from_minor(m.amount, currency),
        tax_code: m.tax_code,
        billing_code: m.billing_code,
        service_date: m.service_date,
    })
}

pub(crate) fn invoice(
    m: invoices::Model,
    lines: Vec<invoice_line_items::Model>,
) -> Result<Invoice, DbErr> {
    let currency = currency(&m.currency)?;
    let money = |minor| Money::from_minor(minor, currency);
    let line_items = lines
        .into_iter()
        .map(|line| line_item(line, currency))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Invoice {
        id: InvoiceId::from_uuid(m.id),
        organization_id: OrganizationId::from_uuid(m.organization_id),
        client_id: ClientId::from_uuid(m.client_id),
        matter_id: m.matter_id.map(MatterId::from_uuid),
        invoice_number: m.invoice_number,
        currency,
        issue_date: m.issue_date,
        due_date: m.due_date,
        status: parsed(&m.status, InvoiceStatus::parse, "invoice status")?,
        line_items,
        subtotal: money(m.subtotal),
        tax_amount: money(m.tax_amount),
        total_amount: money(m.total_amount),
        paid_amount: money(m.paid_amount),
        overpayment_amount: money(m.overpayment_amount),
        write_off_amount: money(m.write_off_amount),
        balance_due: money(m.balance_due),
        totals_finalized: m.totals_finalized,
        notes: m.notes,
        terms: m.terms,
        write_off_reason: m.write_off_reason,
        created_by: UserId::from_uuid(m.created_by),
        approved_by: m.approved_by.map(UserId::from_uuid),
        sent_at: m.sent_at.map(utc),
        created_at: utc(m.created_at),
        updated_at: utc(m.updated_at),
    })
}

pub(crate) fn payment(m: payments::Model, currency: Currency) -> Result<Payment, DbErr> {
    Ok(Payment {
        id: PaymentId::from_uuid(m.id),
        invoice_id: InvoiceId::from_uuid(m.invoice_id),
        amount: Money::from_minor(m.amount, currency),
        applied_amount: Money::from_minor(m.applied_amount, currency),
        excess_amount: Money::from_minor(m.excess_amount, currency),
        method: parsed(&m.method, PaymentMethod::parse, "payment method")?,
        payment_date: m.payment_date,
        reference: m.reference,
        recorded_by: UserId::from_uuid(m.recorded_by),
        created_at: utc(m.created_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn ts() -> DateTimeWithTimeZone {
        DateTime::parse_from_rfc3339("2026-03-01T12:00:00+00:00").unwrap()
    }

    fn txn_model() -> trust_transactions::Model {
        trust_transactions::Model {
            id: Uuid::now_v7(),
            organization_id: Uuid::now_v7(),
            trust_account_id: Uuid::now_v7(),
            client_ledger_id: Uuid::now_v7(),
            transaction_type: "withdrawal".to_string(),
            amount: 12_500,
            balance_after: 37_500,
            description: "Filing fee".to_string(),
            transaction_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            reference: None,
            reversal_of: None,
            created_by: Uuid::now_v7(),
            created_at: ts(),
            cleared_statement_id: None,
            cleared_period_end: None,
            cleared_by: None,
            cleared_at: None,
        }
    }

    #[test]
    fn test_trust_transaction_conversion() {
        let txn = trust_transaction(txn_model(), Currency::USD).unwrap();
        assert_eq!(txn.transaction_type, TrustTransactionType::Withdrawal);
        assert_eq!(txn.amount, Money::from_minor(12_500, Currency::USD));
        assert!(txn.clearance.is_none());
    }

    #[test]
    fn test_partial_clearance_is_rejected() {
        let mut model = txn_model();
        model.cleared_statement_id = Some(Uuid::now_v7());
        assert!(matches!(
            trust_transaction(model, Currency::USD),
            Err(DbErr::Type(_))
        ));
    }

    #[test]
    fn test_unknown_stored_enum_is_rejected() {
        let mut model = txn_model();
        model.transaction_type = "refund".to_string();
        let err = trust_transaction(model, Currency::USD).unwrap_err();
        assert!(err.to_string().contains("refund"));
    }

    #[test]
    fn test_currency_codes() {
        assert_eq!(currency("usd").unwrap(), Currency::USD);
        assert!(currency("US").is_err());
    }
}
