//! Three-way reconciliation engine.
//!
//! Compares the bank's view (statement), the firm's book balance, and the sum
//! of client ledgers for one trust account and statement period. Clearing is
//! always explicit: a transaction counts as reflected on a statement only once
//! it has been cleared against a statement import.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use frith_shared::types::{
    OrganizationId, ReconciliationId, StatementImportId, StatementLineId, UserId,
};
use frith_shared::Money;

use crate::trust::{BalanceEffect, ClientLedger, Clearance, TrustAccount, TrustTransaction};

use super::error::ReconciliationError;
use super::policy::OverridePolicy;
use super::types::{
    Approver, BalanceSource, BankStatementImport, Discrepancy, NewStatementImport,
    Reconciliation, ReconciliationReport, ReconciliationStatus, StatementLine, StatementPeriod,
};

/// Everything a reconciliation run reads.
#[derive(Debug, Clone, Copy)]
pub struct ReconcileInput<'a> {
    /// Account being reconciled.
    pub account: &'a TrustAccount,
    /// Every ledger under the account.
    pub ledgers: &'a [ClientLedger],
    /// Every transaction of the account.
    pub transactions: &'a [TrustTransaction],
    /// Statement period.
    pub period: StatementPeriod,
    /// Closing balance printed on the statement.
    pub statement_closing_balance: Money,
    /// Imported statement for the period, if any.
    pub statement: Option<&'a BankStatementImport>,
}

/// Reconciliation engine.
///
/// This service contains pure business logic with no database dependencies.
pub struct ReconciliationEngine;

impl ReconciliationEngine {
    /// Validates and builds a statement import for `account`.
    ///
    /// # Errors
    ///
    /// Returns `ReconciliationError::Money` on a currency mismatch and
    /// `LineOutsidePeriod` for lines dated outside the period.
    pub fn import_statement(
        account: &TrustAccount,
        input: NewStatementImport,
        now: DateTime<Utc>,
    ) -> Result<BankStatementImport, ReconciliationError> {
        let zero = Money::zero(account.currency);
        input.opening_balance.compare(&zero)?;
        input.closing_balance.compare(&zero)?;

        let mut lines = Vec::with_capacity(input.lines.len());
        for line in input.lines {
            line.amount.compare(&zero)?;
            if !input.period.contains(line.date) {
                return Err(ReconciliationError::LineOutsidePeriod(line.date));
            }
            lines.push(StatementLine {
                id: StatementLineId::new(),
                date: line.date,
                amount: line.amount,
                description: line.description,
                reference: line.reference,
            });
        }

        Ok(BankStatementImport {
            id: StatementImportId::new(),
            organization_id: account.organization_id,
            trust_account_id: account.id,
            period: input.period,
            opening_balance: input.opening_balance,
            closing_balance: input.closing_balance,
            format: input.format,
            lines,
            imported_by: input.imported_by,
            imported_at: now,
        })
    }

    /// Marks transactions as cleared on `statement`.
    ///
    /// All-or-nothing: any invalid transaction rejects the whole batch.
    ///
    /// # Errors
    ///
    /// Returns `TransactionNotInAccount`, `AlreadyCleared` (also for
    /// duplicates within the batch), or `TransactionAfterPeriod`.
    pub fn clear_transactions(
        statement: &BankStatementImport,
        transactions: &[TrustTransaction],
        cleared_by: UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<TrustTransaction>, ReconciliationError> {
        let mut seen = HashSet::with_capacity(transactions.len());
        for txn in transactions {
            if txn.trust_account_id != statement.trust_account_id {
                return Err(ReconciliationError::TransactionNotInAccount(txn.id));
            }
            if txn.is_cleared() || !seen.insert(txn.id) {
                return Err(ReconciliationError::AlreadyCleared(txn.id));
            }
            if txn.transaction_date > statement.period.end {
                return Err(ReconciliationError::TransactionAfterPeriod {
                    id: txn.id,
                    date: txn.transaction_date,
                    period_end: statement.period.end,
                });
            }
        }

        Ok(transactions
            .iter()
            .map(|txn| {
                let mut cleared = txn.clone();
                cleared.clearance = Some(Clearance {
                    statement_import_id: statement.id,
                    statement_period_end: statement.period.end,
                    cleared_by,
                    cleared_at: now,
                });
                cleared
            })
            .collect())
    }

    /// Computes the three-way reconciliation report.
    ///
    /// Pure and idempotent: identical inputs yield identical reports.
    ///
    /// # Errors
    ///
    /// Returns `StatementAccountMismatch` if the statement belongs to another
    /// account, `StatementPeriodMismatch` or `StatementBalanceMismatch` if its
    /// period or closing balance differ from the run's, and
    /// `ReconciliationError::Money` on a currency mismatch.
    pub fn reconcile(input: ReconcileInput<'_>) -> Result<ReconciliationReport, ReconciliationError> {
        let account = input.account;
        let currency = account.currency;
        let period_end = input.period.end;
        input.statement_closing_balance.compare(&account.book_balance)?;

        if let Some(statement) = input.statement {
            Self::check_statement(statement, &input)?;
        }

        let ledger_total = Money::sum(
            currency,
            input
                .ledgers
                .iter()
                .filter(|l| l.is_active())
                .map(|l| &l.balance),
        )?;

        let mut outstanding_deposits = Money::zero(currency);
        let mut outstanding_withdrawals = Money::zero(currency);
        let mut outstanding_transaction_ids = Vec::new();
        for txn in input
            .transactions
            .iter()
            .filter(|t| t.trust_account_id == account.id)
        {
            if txn.is_reflected_by(period_end) {
                continue;
            }
            match txn.effect() {
                BalanceEffect::Increase => {
                    outstanding_deposits = outstanding_deposits.add(&txn.amount)?;
                }
                BalanceEffect::Decrease => {
                    outstanding_withdrawals = outstanding_withdrawals.add(&txn.amount)?;
                }
            }
            outstanding_transaction_ids.push(txn.id);
        }

        let adjusted_statement_balance = input
            .statement_closing_balance
            .add(&outstanding_deposits)?
            .subtract(&outstanding_withdrawals)?;

        let cleared_balance = match input.statement {
            Some(statement) => Some(Self::cleared_balance(statement, input.transactions)?),
            None => None,
        };

        let mut discrepancies = Vec::new();
        let mut check = |left: BalanceSource,
                         left_amount: Money,
                         right: BalanceSource,
                         right_amount: Money|
         -> Result<(), ReconciliationError> {
            if left_amount != right_amount {
                discrepancies.push(Discrepancy {
                    left,
                    right,
                    left_amount,
                    right_amount,
                    difference: left_amount.subtract(&right_amount)?,
                });
            }
            Ok(())
        };

        if let Some(cleared) = cleared_balance {
            check(
                BalanceSource::Statement,
                input.statement_closing_balance,
                BalanceSource::ClearedActivity,
                cleared,
            )?;
        }
        check(
            BalanceSource::Statement,
            adjusted_statement_balance,
            BalanceSource::Book,
            account.book_balance,
        )?;
        check(
            BalanceSource::Statement,
            adjusted_statement_balance,
            BalanceSource::ClientLedgers,
            ledger_total,
        )?;
        check(
            BalanceSource::Book,
            account.book_balance,
            BalanceSource::ClientLedgers,
            ledger_total,
        )?;

        Ok(ReconciliationReport {
            trust_account_id: account.id,
            period: input.period,
            statement_closing_balance: input.statement_closing_balance,
            outstanding_deposits,
            outstanding_withdrawals,
            adjusted_statement_balance,
            cleared_balance,
            book_balance: account.book_balance,
            ledger_total,
            outstanding_transaction_ids,
            is_balanced: discrepancies.is_empty(),
            discrepancies,
        })
    }

    /// The imported statement must describe the same account, period and
    /// closing balance as the run.
    fn check_statement(
        statement: &BankStatementImport,
        input: &ReconcileInput<'_>,
    ) -> Result<(), ReconciliationError> {
        if statement.trust_account_id != input.account.id {
            return Err(ReconciliationError::StatementAccountMismatch(statement.id));
        }
        if statement.period != input.period {
            return Err(ReconciliationError::StatementPeriodMismatch {
                id: statement.id,
                statement_start: statement.period.start,
                statement_end: statement.period.end,
                start: input.period.start,
                end: input.period.end,
            });
        }
        if statement.closing_balance != input.statement_closing_balance {
            return Err(ReconciliationError::StatementBalanceMismatch {
                id: statement.id,
                on_statement: statement.closing_balance,
                given: input.statement_closing_balance,
            });
        }
        Ok(())
    }

    /// Opening balance plus every transaction cleared on `statement`.
    fn cleared_balance(
        statement: &BankStatementImport,
        transactions: &[TrustTransaction],
    ) -> Result<Money, ReconciliationError> {
        let mut balance = statement.opening_balance;
        for txn in transactions.iter().filter(|t| {
            t.clearance
                .as_ref()
                .is_some_and(|c| c.statement_import_id == statement.id)
        }) {
            balance = balance.add(&txn.signed_amount()?)?;
        }
        Ok(balance)
    }

    /// Wraps a report in a new reconciliation record: `Draft` when balanced,
    /// `Flagged` otherwise.
    #[must_use]
    pub fn prepare(
        organization_id: OrganizationId,
        report: ReconciliationReport,
        statement_import_id: Option<StatementImportId>,
        prepared_by: UserId,
        now: DateTime<Utc>,
    ) -> Reconciliation {
        let status = if report.is_balanced {
            ReconciliationStatus::Draft
        } else {
            ReconciliationStatus::Flagged
        };
        Reconciliation {
            id: ReconciliationId::new(),
            organization_id,
            statement_import_id,
            report,
            status,
            prepared_by,
            prepared_at: now,
            submitted_by: None,
            approved_by: None,
            approved_at: None,
            override_justification: None,
        }
    }

    /// Draft → Pending.
    ///
    /// # Errors
    ///
    /// Returns `UnbalancedReconciliation` for a flagged run and
    /// `InvalidTransition` from any other status.
    pub fn submit(
        reconciliation: &Reconciliation,
        submitted_by: UserId,
    ) -> Result<Reconciliation, ReconciliationError> {
        match reconciliation.status {
            ReconciliationStatus::Draft => {
                let mut next = reconciliation.clone();
                next.status = ReconciliationStatus::Pending;
                next.submitted_by = Some(submitted_by);
                Ok(next)
            }
            ReconciliationStatus::Flagged => Err(Self::unbalanced(reconciliation)),
            from => Err(ReconciliationError::InvalidTransition {
                from,
                action: "submit",
            }),
        }
    }

    /// Pending → Approved. Only balanced runs can be approved this way.
    ///
    /// # Errors
    ///
    /// Returns `UnbalancedReconciliation` if the run has discrepancies and
    /// `InvalidTransition` unless it is pending.
    pub fn approve(
        reconciliation: &Reconciliation,
        approver: &Approver,
        now: DateTime<Utc>,
    ) -> Result<Reconciliation, ReconciliationError> {
        if !reconciliation.report.is_balanced {
            return Err(Self::unbalanced(reconciliation));
        }
        if reconciliation.status != ReconciliationStatus::Pending {
            return Err(ReconciliationError::InvalidTransition {
                from: reconciliation.status,
                action: "approve",
            });
        }

        let mut next = reconciliation.clone();
        next.status = ReconciliationStatus::Approved;
        next.approved_by = Some(approver.user_id);
        next.approved_at = Some(now);
        Ok(next)
    }

    /// Approves a pending or flagged run despite discrepancies.
    ///
    /// # Errors
    ///
    /// Returns `JustificationRequired` for a blank justification,
    /// `OverrideNotAuthorized` if `policy` refuses the approver, and
    /// `InvalidTransition` for draft or approved runs.
    pub fn approve_with_override(
        reconciliation: &Reconciliation,
        approver: &Approver,
        justification: &str,
        policy: &dyn OverridePolicy,
        now: DateTime<Utc>,
    ) -> Result<Reconciliation, ReconciliationError> {
        let justification = justification.trim();
        if justification.is_empty() {
            return Err(ReconciliationError::JustificationRequired);
        }
        if !policy.may_override(approver) {
            return Err(ReconciliationError::OverrideNotAuthorized(
                approver.role.clone(),
            ));
        }
        if !matches!(
            reconciliation.status,
            ReconciliationStatus::Pending | ReconciliationStatus::Flagged
        ) {
            return Err(ReconciliationError::InvalidTransition {
                from: reconciliation.status,
                action: "override",
            });
        }

        let mut next = reconciliation.clone();
        next.status = ReconciliationStatus::Approved;
        next.approved_by = Some(approver.user_id);
        next.approved_at = Some(now);
        next.override_justification = Some(justification.to_string());
        Ok(next)
    }

    /// Stamps the account with the approved period end and book balance.
    ///
    /// An older period never moves the stamp backwards.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` unless the run is approved, and
    /// `AccountNotFound` if it belongs to another account.
    pub fn apply_to_account(
        account: &TrustAccount,
        reconciliation: &Reconciliation,
    ) -> Result<TrustAccount, ReconciliationError> {
        if reconciliation.status != ReconciliationStatus::Approved {
            return Err(ReconciliationError::InvalidTransition {
                from: reconciliation.status,
                action: "apply",
            });
        }
        if reconciliation.report.trust_account_id != account.id {
            return Err(ReconciliationError::AccountNotFound(
                reconciliation.report.trust_account_id,
            ));
        }

        let period_end = reconciliation.report.period.end;
        let mut updated = account.clone();
        if account.last_reconciled_date.is_none_or(|d| d <= period_end) {
            updated.last_reconciled_date = Some(period_end);
            updated.last_reconciled_balance = Some(reconciliation.report.book_balance);
        }
        Ok(updated)
    }

    fn unbalanced(reconciliation: &Reconciliation) -> ReconciliationError {
        ReconciliationError::UnbalancedReconciliation(reconciliation.report.discrepancies.len())
    }
}
