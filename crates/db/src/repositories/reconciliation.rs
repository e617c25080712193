//! Reconciliation repository for statement imports, clearing and the
//! reconciliation workflow.
//!
//! Reconciliation runs are read-mostly: the account row is share-locked while
//! the ledgers and transactions are read, and the only write is the new
//! reconciliation row. Approval takes the account row exclusively to move its
//! last reconciled date forward.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use tracing::{info, warn};

use frith_core::reconciliation::{
    Approver, BankStatementImport, NewStatementImport, OverridePolicy, ReconcileInput,
    Reconciliation, ReconciliationEngine, ReconciliationError, StatementPeriod,
};
use frith_core::trust::{TrustAccount, TrustError, TrustTransaction};
use frith_shared::Money;
use frith_shared::types::{
    OrganizationId, ReconciliationId, StatementImportId, TrustAccountId, TrustTransactionId,
    UserId,
};

use crate::convert;
use crate::entities::{
    bank_statement_imports, bank_statement_lines, reconciliations, trust_accounts,
    trust_transactions,
};
use crate::rls::begin_scoped;

use super::trust::{RowLock, load_account, load_account_transactions, load_ledgers};

fn db(err: DbErr) -> ReconciliationError {
    ReconciliationError::Database(err.to_string())
}

fn trust(err: TrustError) -> ReconciliationError {
    match err {
        TrustError::AccountNotFound(id) => ReconciliationError::AccountNotFound(id),
        other => ReconciliationError::Database(other.to_string()),
    }
}

/// Reconciliation repository.
#[derive(Debug, Clone)]
pub struct ReconciliationRepository {
    db: DatabaseConnection,
}

impl ReconciliationRepository {
    /// Creates a new reconciliation repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Stores a bank statement and its lines. Statements are read-only once
    /// stored.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound`, any validation error from
    /// `ReconciliationEngine::import_statement`, or `Database`.
    pub async fn import_statement(
        &self,
        organization_id: OrganizationId,
        account_id: TrustAccountId,
        input: NewStatementImport,
    ) -> Result<BankStatementImport, ReconciliationError> {
        let now = Utc::now();
        let txn = begin_scoped(&self.db, organization_id).await.map_err(db)?;
        let account = load_account(&txn, organization_id, account_id, RowLock::Shared)
            .await
            .map_err(trust)?;

        let statement = ReconciliationEngine::import_statement(&account, input, now)?;
        bank_statement_imports::ActiveModel {
            id: Set(statement.id.into_inner()),
            organization_id: Set(organization_id.into_inner()),
            trust_account_id: Set(account.id.into_inner()),
            period_start: Set(statement.period.start),
            period_end: Set(statement.period.end),
            currency: Set(account.currency.code().to_string()),
            opening_balance: Set(statement.opening_balance.minor_units),
            closing_balance: Set(statement.closing_balance.minor_units),
            format: Set(statement.format.as_str().to_string()),
            imported_by: Set(statement.imported_by.into_inner()),
            imported_at: Set(now.into()),
        }
        .insert(&txn)
        .await
        .map_err(db)?;

        if !statement.lines.is_empty() {
            let mut lines = Vec::with_capacity(statement.lines.len());
            for (position, line) in statement.lines.iter().enumerate() {
                lines.push(bank_statement_lines::ActiveModel {
                    id: Set(line.id.into_inner()),
                    statement_import_id: Set(statement.id.into_inner()),
                    position: Set(i32::try_from(position).map_err(|_| {
                        ReconciliationError::Database("Too many statement lines".to_string())
                    })?),
                    line_date: Set(line.date),
                    amount: Set(line.amount.minor_units),
                    description: Set(line.description.clone()),
                    reference: Set(line.reference.clone()),
                });
            }
            bank_statement_lines::Entity::insert_many(lines)
                .exec(&txn)
                .await
                .map_err(db)?;
        }

        txn.commit().await.map_err(db)?;
        info!(
            statement_import_id = %statement.id,
            trust_account_id = %account_id,
            lines = statement.lines.len(),
            closing_balance = %statement.closing_balance,
            "Bank statement imported"
        );
        Ok(statement)
    }

    /// Fetches an imported statement with its lines.
    ///
    /// # Errors
    ///
    /// Returns `StatementNotFound` or `Database`.
    pub async fn get_statement(
        &self,
        organization_id: OrganizationId,
        statement_id: StatementImportId,
    ) -> Result<BankStatementImport, ReconciliationError> {
        let txn = begin_scoped(&self.db, organization_id).await.map_err(db)?;
        let statement = load_statement(&txn, organization_id, statement_id).await?;
        txn.commit().await.map_err(db)?;
        Ok(statement)
    }

    /// Clears transactions against a statement import, all or nothing.
    ///
    /// # Errors
    ///
    /// Returns `StatementNotFound`, `TransactionNotInAccount` (also for ids
    /// that do not exist), `AlreadyCleared`, `TransactionAfterPeriod`, or
    /// `Database`.
    pub async fn mark_cleared(
        &self,
        organization_id: OrganizationId,
        statement_id: StatementImportId,
        transaction_ids: &[TrustTransactionId],
        cleared_by: UserId,
    ) -> Result<Vec<TrustTransaction>, ReconciliationError> {
        let now = Utc::now();
        let txn = begin_scoped(&self.db, organization_id).await.map_err(db)?;
        let statement = load_statement(&txn, organization_id, statement_id).await?;
        let account = load_account(
            &txn,
            organization_id,
            statement.trust_account_id,
            RowLock::None,
        )
        .await
        .map_err(trust)?;

        let models = trust_transactions::Entity::find()
            .filter(
                trust_transactions::Column::Id
                    .is_in(transaction_ids.iter().map(|id| id.into_inner())),
            )
            .filter(trust_transactions::Column::OrganizationId.eq(organization_id.into_inner()))
            .lock_exclusive()
            .all(&txn)
            .await
            .map_err(db)?;

        // Keep the caller's order so duplicates reach the engine.
        let mut selected = Vec::with_capacity(transaction_ids.len());
        for id in transaction_ids {
            let model = models
                .iter()
                .find(|m| m.id == id.into_inner())
                .cloned()
                .ok_or(ReconciliationError::TransactionNotInAccount(*id))?;
            selected.push(convert::trust_transaction(model, account.currency).map_err(db)?);
        }

        let cleared =
            ReconciliationEngine::clear_transactions(&statement, &selected, cleared_by, now)
                .inspect_err(|err| {
                    warn!(statement_import_id = %statement_id, error = %err, "Clearing rejected");
                })?;

        for txn_row in &cleared {
            let Some(clearance) = &txn_row.clearance else {
                continue;
            };
            trust_transactions::ActiveModel {
                id: Set(txn_row.id.into_inner()),
                cleared_statement_id: Set(Some(clearance.statement_import_id.into_inner())),
                cleared_period_end: Set(Some(clearance.statement_period_end)),
                cleared_by: Set(Some(clearance.cleared_by.into_inner())),
                cleared_at: Set(Some(clearance.cleared_at.into())),
                ..Default::default()
            }
            .update(&txn)
            .await
            .map_err(db)?;
        }

        txn.commit().await.map_err(db)?;
        info!(
            statement_import_id = %statement_id,
            cleared = cleared.len(),
            "Trust transactions cleared"
        );
        Ok(cleared)
    }

    /// Runs a reconciliation and stores it as a new draft (or flagged) row.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound`, `StatementNotFound`, any error from
    /// `ReconciliationEngine::reconcile`, or `Database`.
    pub async fn reconcile(
        &self,
        organization_id: OrganizationId,
        account_id: TrustAccountId,
        period: StatementPeriod,
        statement_closing_balance: Money,
        statement_id: Option<StatementImportId>,
        prepared_by: UserId,
    ) -> Result<Reconciliation, ReconciliationError> {
        let now = Utc::now();
        let txn = begin_scoped(&self.db, organization_id).await.map_err(db)?;
        let account = load_account(&txn, organization_id, account_id, RowLock::Shared)
            .await
            .map_err(trust)?;
        let ledgers = load_ledgers(&txn, &account, RowLock::None)
            .await
            .map_err(trust)?;
        let transactions = load_account_transactions(&txn, &account)
            .await
            .map_err(trust)?;
        let statement = match statement_id {
            Some(id) => Some(load_statement(&txn, organization_id, id).await?),
            None => None,
        };

        let report = ReconciliationEngine::reconcile(ReconcileInput {
            account: &account,
            ledgers: &ledgers,
            transactions: &transactions,
            period,
            statement_closing_balance,
            statement: statement.as_ref(),
        })?;
        let reconciliation =
            ReconciliationEngine::prepare(organization_id, report, statement_id, prepared_by, now);

        insert_reconciliation(&txn, &reconciliation).await?;
        txn.commit().await.map_err(db)?;

        if reconciliation.report.is_balanced {
            info!(
                reconciliation_id = %reconciliation.id,
                trust_account_id = %account_id,
                period_end = %period.end,
                "Trust account reconciled"
            );
        } else {
            warn!(
                reconciliation_id = %reconciliation.id,
                trust_account_id = %account_id,
                period_end = %period.end,
                discrepancies = reconciliation.report.discrepancies.len(),
                "Trust account reconciliation is unbalanced"
            );
        }
        Ok(reconciliation)
    }

    /// Fetches a reconciliation.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or `Database`.
    pub async fn get(
        &self,
        organization_id: OrganizationId,
        reconciliation_id: ReconciliationId,
    ) -> Result<Reconciliation, ReconciliationError> {
        let txn = begin_scoped(&self.db, organization_id).await.map_err(db)?;
        let reconciliation =
            load_reconciliation(&txn, organization_id, reconciliation_id, false).await?;
        txn.commit().await.map_err(db)?;
        Ok(reconciliation)
    }

    /// Lists an account's reconciliations, latest period first.
    ///
    /// # Errors
    ///
    /// Returns `Database` on failure.
    pub async fn list(
        &self,
        organization_id: OrganizationId,
        account_id: TrustAccountId,
    ) -> Result<Vec<Reconciliation>, ReconciliationError> {
        let txn = begin_scoped(&self.db, organization_id).await.map_err(db)?;
        let models = reconciliations::Entity::find()
            .filter(reconciliations::Column::OrganizationId.eq(organization_id.into_inner()))
            .filter(reconciliations::Column::TrustAccountId.eq(account_id.into_inner()))
            .order_by_desc(reconciliations::Column::PeriodEnd)
            .order_by_desc(reconciliations::Column::PreparedAt)
            .all(&txn)
            .await
            .map_err(db)?;
        txn.commit().await.map_err(db)?;
        models
            .into_iter()
            .map(|m| convert::reconciliation(m).map_err(db))
            .collect()
    }

    /// Moves a draft reconciliation to pending.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `UnbalancedReconciliation`, `InvalidTransition` or
    /// `Database`.
    pub async fn submit(
        &self,
        organization_id: OrganizationId,
        reconciliation_id: ReconciliationId,
        submitted_by: UserId,
    ) -> Result<Reconciliation, ReconciliationError> {
        let txn = begin_scoped(&self.db, organization_id).await.map_err(db)?;
        let current = load_reconciliation(&txn, organization_id, reconciliation_id, true).await?;
        let next = ReconciliationEngine::submit(&current, submitted_by)?;
        save_workflow(&txn, &next).await?;
        txn.commit().await.map_err(db)?;
        info!(reconciliation_id = %reconciliation_id, "Reconciliation submitted");
        Ok(next)
    }

    /// Approves a pending, balanced reconciliation and records it on the
    /// trust account.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `UnbalancedReconciliation`, `InvalidTransition` or
    /// `Database`.
    pub async fn approve(
        &self,
        organization_id: OrganizationId,
        reconciliation_id: ReconciliationId,
        approver: &Approver,
    ) -> Result<Reconciliation, ReconciliationError> {
        let now = Utc::now();
        let txn = begin_scoped(&self.db, organization_id).await.map_err(db)?;
        let current = load_reconciliation(&txn, organization_id, reconciliation_id, true).await?;
        let approved = ReconciliationEngine::approve(&current, approver, now).inspect_err(|err| {
            warn!(reconciliation_id = %reconciliation_id, error = %err, "Approval rejected");
        })?;
        self.finish_approval(txn, organization_id, &approved).await?;
        info!(reconciliation_id = %reconciliation_id, approved_by = %approver.user_id, "Reconciliation approved");
        Ok(approved)
    }

    /// Approves a reconciliation despite discrepancies, recording the
    /// justification and approver.
    ///
    /// # Errors
    ///
    /// Returns `JustificationRequired`, `OverrideNotAuthorized`,
    /// `InvalidTransition`, `NotFound` or `Database`.
    pub async fn approve_with_override(
        &self,
        organization_id: OrganizationId,
        reconciliation_id: ReconciliationId,
        approver: &Approver,
        justification: &str,
        policy: &dyn OverridePolicy,
    ) -> Result<Reconciliation, ReconciliationError> {
        let now = Utc::now();
        let txn = begin_scoped(&self.db, organization_id).await.map_err(db)?;
        let current = load_reconciliation(&txn, organization_id, reconciliation_id, true).await?;
        let approved = ReconciliationEngine::approve_with_override(
            &current,
            approver,
            justification,
            policy,
            now,
        )
        .inspect_err(|err| {
            warn!(reconciliation_id = %reconciliation_id, error = %err, "Override rejected");
        })?;
        self.finish_approval(txn, organization_id, &approved).await?;
        warn!(
            reconciliation_id = %reconciliation_id,
            approved_by = %approver.user_id,
            role = %approver.role,
            discrepancies = approved.report.discrepancies.len(),
            "Reconciliation approved by override"
        );
        Ok(approved)
    }

    async fn finish_approval(
        &self,
        txn: DatabaseTransaction,
        organization_id: OrganizationId,
        approved: &Reconciliation,
    ) -> Result<(), ReconciliationError> {
        let account = load_account(
            &txn,
            organization_id,
            approved.report.trust_account_id,
            RowLock::Exclusive,
        )
        .await
        .map_err(trust)?;
        let updated: TrustAccount = ReconciliationEngine::apply_to_account(&account, approved)?;

        if updated != account {
            trust_accounts::ActiveModel {
                id: Set(updated.id.into_inner()),
                last_reconciled_date: Set(updated.last_reconciled_date),
                last_reconciled_balance: Set(updated.last_reconciled_balance.map(|m| m.minor_units)),
                updated_at: Set(Utc::now().into()),
                ..Default::default()
            }
            .update(&txn)
            .await
            .map_err(db)?;
        }

        save_workflow(&txn, approved).await?;
        txn.commit().await.map_err(db)
    }
}

// ============================================================================
// Loading and saving helpers
// ============================================================================

async fn load_statement(
    txn: &DatabaseTransaction,
    organization_id: OrganizationId,
    statement_id: StatementImportId,
) -> Result<BankStatementImport, ReconciliationError> {
    let header = bank_statement_imports::Entity::find_by_id(statement_id.into_inner())
        .filter(bank_statement_imports::Column::OrganizationId.eq(organization_id.into_inner()))
        .one(txn)
        .await
        .map_err(db)?
        .ok_or(ReconciliationError::StatementNotFound(statement_id))?;
    let lines = bank_statement_lines::Entity::find()
        .filter(bank_statement_lines::Column::StatementImportId.eq(statement_id.into_inner()))
        .order_by_asc(bank_statement_lines::Column::Position)
        .all(txn)
        .await
        .map_err(db)?;
    convert::statement_import(header, lines).map_err(db)
}

async fn load_reconciliation(
    txn: &DatabaseTransaction,
    organization_id: OrganizationId,
    reconciliation_id: ReconciliationId,
    for_update: bool,
) -> Result<Reconciliation, ReconciliationError> {
    let mut query = reconciliations::Entity::find_by_id(reconciliation_id.into_inner())
        .filter(reconciliations::Column::OrganizationId.eq(organization_id.into_inner()));
    if for_update {
        query = query.lock_exclusive();
    }
    let model = query
        .one(txn)
        .await
        .map_err(db)?
        .ok_or(ReconciliationError::NotFound(reconciliation_id))?;
    convert::reconciliation(model).map_err(db)
}

async fn insert_reconciliation(
    txn: &DatabaseTransaction,
    reconciliation: &Reconciliation,
) -> Result<(), ReconciliationError> {
    let report = serde_json::to_value(&reconciliation.report)
        .map_err(|e| ReconciliationError::Database(e.to_string()))?;
    reconciliations::ActiveModel {
        id: Set(reconciliation.id.into_inner()),
        organization_id: Set(reconciliation.organization_id.into_inner()),
        trust_account_id: Set(reconciliation.report.trust_account_id.into_inner()),
        statement_import_id: Set(reconciliation.statement_import_id.map(StatementImportId::into_inner)),
        period_start: Set(reconciliation.report.period.start),
        period_end: Set(reconciliation.report.period.end),
        status: Set(reconciliation.status.as_str().to_string()),
        is_balanced: Set(reconciliation.report.is_balanced),
        report: Set(report),
        prepared_by: Set(reconciliation.prepared_by.into_inner()),
        prepared_at: Set(reconciliation.prepared_at.into()),
        submitted_by: Set(None),
        approved_by: Set(None),
        approved_at: Set(None),
        override_justification: Set(None),
    }
    .insert(txn)
    .await
    .map_err(db)?;
    Ok(())
}

/// Writes the workflow columns; the report itself never changes.
async fn save_workflow(
    txn: &DatabaseTransaction,
    reconciliation: &Reconciliation,
) -> Result<(), ReconciliationError> {
    reconciliations::ActiveModel {
        id: Set(reconciliation.id.into_inner()),
        status: Set(reconciliation.status.as_str().to_string()),
        submitted_by: Set(reconciliation.submitted_by.map(UserId::into_inner)),
        approved_by: Set(reconciliation.approved_by.map(UserId::into_inner)),
        approved_at: Set(reconciliation.approved_at.map(Into::into)),
        override_justification: Set(reconciliation.override_justification.clone()),
        ..Default::default()
    }
    .update(txn)
    .await
    .map_err(db)?;
    Ok(())
}
