//! Trust repository for trust accounts, client ledgers and their transactions.
//!
//! Every posting runs in one database transaction that locks the trust account
//! row first and the client ledger row second. The account lock serializes
//! postings per account, so the ledger total read inside the transaction is
//! the one the engine checks against the book balance.

use chrono::Utc;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use tracing::{info, warn};
use uuid::Uuid;

use frith_core::trust::{
    AccountSnapshot, ClientLedger, ComplianceAlert, ComplianceChecker, ComplianceThresholds,
    CreateTrustAccountInput, IntegrityReport, OpenLedgerInput, Posting, RecordTransactionInput,
    TrustAccount, TrustError, TrustLedgerEngine, TrustTransaction,
};
use frith_shared::types::{
    ClientLedgerId, OrganizationId, PageRequest, PageResponse, TrustAccountId, TrustTransactionId,
    UserId,
};
use frith_shared::{Currency, Money};

use crate::convert;
use crate::entities::{client_ledgers, trust_accounts, trust_transactions};
use crate::rls::begin_scoped;

/// Row lock taken when loading a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RowLock {
    /// Plain read.
    None,
    /// `FOR SHARE`: blocks writers, not other readers.
    Shared,
    /// `FOR UPDATE`.
    Exclusive,
}

fn db(err: DbErr) -> TrustError {
    TrustError::Database(err.to_string())
}

/// Trust repository for ledger operations.
#[derive(Debug, Clone)]
pub struct TrustRepository {
    db: DatabaseConnection,
}

impl TrustRepository {
    /// Creates a new trust repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates an empty trust account.
    ///
    /// # Errors
    ///
    /// Returns `TrustError::Database` if the insert fails.
    pub async fn create_account(
        &self,
        input: CreateTrustAccountInput,
    ) -> Result<TrustAccount, TrustError> {
        let now = Utc::now();
        let txn = begin_scoped(&self.db, input.organization_id)
            .await
            .map_err(db)?;

        let account = TrustLedgerEngine::create_account(input, now);
        trust_accounts::ActiveModel {
            id: Set(account.id.into_inner()),
            organization_id: Set(account.organization_id.into_inner()),
            name: Set(account.name.clone()),
            bank_name: Set(account.bank_name.clone()),
            account_number_last4: Set(account.account_number_last4.clone()),
            account_type: Set(account.account_type.as_str().to_string()),
            currency: Set(account.currency.code().to_string()),
            status: Set(account.status.as_str().to_string()),
            book_balance: Set(account.book_balance.minor_units),
            last_reconciled_date: Set(None),
            last_reconciled_balance: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(&txn)
        .await
        .map_err(db)?;

        txn.commit().await.map_err(db)?;
        info!(trust_account_id = %account.id, currency = %account.currency, "Trust account created");
        Ok(account)
    }

    /// Fetches a trust account.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` if it does not exist in the organization.
    pub async fn get_account(
        &self,
        organization_id: OrganizationId,
        account_id: TrustAccountId,
    ) -> Result<TrustAccount, TrustError> {
        let txn = begin_scoped(&self.db, organization_id).await.map_err(db)?;
        let account = load_account(&txn, organization_id, account_id, RowLock::None).await?;
        txn.commit().await.map_err(db)?;
        Ok(account)
    }

    /// Lists the organization's trust accounts by name.
    ///
    /// # Errors
    ///
    /// Returns `TrustError::Database` on failure.
    pub async fn list_accounts(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<TrustAccount>, TrustError> {
        let txn = begin_scoped(&self.db, organization_id).await.map_err(db)?;
        let models = trust_accounts::Entity::find()
            .filter(trust_accounts::Column::OrganizationId.eq(organization_id.into_inner()))
            .order_by_asc(trust_accounts::Column::Name)
            .all(&txn)
            .await
            .map_err(db)?;
        txn.commit().await.map_err(db)?;
        models
            .into_iter()
            .map(|m| convert::trust_account(m).map_err(db))
            .collect()
    }

    /// Opens a zero-balance client ledger.
    ///
    /// The account row is share-locked so it cannot close concurrently.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` or `AccountClosed`.
    pub async fn open_ledger(
        &self,
        organization_id: OrganizationId,
        account_id: TrustAccountId,
        input: OpenLedgerInput,
    ) -> Result<ClientLedger, TrustError> {
        let now = Utc::now();
        let txn = begin_scoped(&self.db, organization_id).await.map_err(db)?;
        let account = load_account(&txn, organization_id, account_id, RowLock::Shared).await?;

        let ledger = TrustLedgerEngine::open_ledger(&account, input, now)?;
        client_ledgers::ActiveModel {
            id: Set(ledger.id.into_inner()),
            organization_id: Set(organization_id.into_inner()),
            trust_account_id: Set(account.id.into_inner()),
            client_id: Set(ledger.client_id.into_inner()),
            matter_id: Set(ledger.matter_id.map(|m| m.into_inner())),
            name: Set(ledger.name.clone()),
            balance: Set(0),
            status: Set(ledger.status.as_str().to_string()),
            version: Set(ledger.version),
            last_activity_at: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(&txn)
        .await
        .map_err(db)?;

        txn.commit().await.map_err(db)?;
        info!(client_ledger_id = %ledger.id, trust_account_id = %account.id, "Client ledger opened");
        Ok(ledger)
    }

    /// Fetches a client ledger.
    ///
    /// # Errors
    ///
    /// Returns `LedgerNotFound` if it does not exist in the organization.
    pub async fn get_ledger(
        &self,
        organization_id: OrganizationId,
        ledger_id: ClientLedgerId,
    ) -> Result<ClientLedger, TrustError> {
        let txn = begin_scoped(&self.db, organization_id).await.map_err(db)?;
        let account_id = ledger_account_id(&txn, organization_id, ledger_id).await?;
        let account = load_account(&txn, organization_id, account_id, RowLock::None).await?;
        let ledger =
            load_ledger(&txn, organization_id, ledger_id, account.currency, RowLock::None).await?;
        txn.commit().await.map_err(db)?;
        Ok(ledger)
    }

    /// Lists every ledger under an account, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` or `TrustError::Database`.
    pub async fn list_ledgers(
        &self,
        organization_id: OrganizationId,
        account_id: TrustAccountId,
    ) -> Result<Vec<ClientLedger>, TrustError> {
        let txn = begin_scoped(&self.db, organization_id).await.map_err(db)?;
        let account = load_account(&txn, organization_id, account_id, RowLock::None).await?;
        let ledgers = load_ledgers(&txn, &account, RowLock::None).await?;
        txn.commit().await.map_err(db)?;
        Ok(ledgers)
    }

    /// Records a trust transaction against a client ledger.
    ///
    /// Locks the account, then the ledger; reads the ledger total; lets the
    /// engine validate; writes the transaction row, the ledger balance and the
    /// account book balance; commits. Any failure rolls everything back.
    ///
    /// # Errors
    ///
    /// Returns every error `TrustLedgerEngine::record_transaction` can
    /// return, `LedgerNotFound`, `ConcurrentModification` or `Database`.
    pub async fn record_transaction(
        &self,
        organization_id: OrganizationId,
        ledger_id: ClientLedgerId,
        input: RecordTransactionInput,
    ) -> Result<Posting, TrustError> {
        let now = Utc::now();
        let txn = begin_scoped(&self.db, organization_id).await.map_err(db)?;

        let account_id = ledger_account_id(&txn, organization_id, ledger_id).await?;
        let account = load_account(&txn, organization_id, account_id, RowLock::Exclusive).await?;
        let ledger =
            load_ledger(&txn, organization_id, ledger_id, account.currency, RowLock::Exclusive)
                .await?;
        let ledger_total = ledger_total(&txn, &account).await?;

        let transaction_type = input.transaction_type;
        let amount = input.amount;
        let posting =
            match TrustLedgerEngine::record_transaction(&account, &ledger, ledger_total, input, now)
            {
                Ok(posting) => posting,
                Err(err) => {
                    warn!(
                        client_ledger_id = %ledger_id,
                        transaction_type = %transaction_type,
                        amount = %amount,
                        error = %err,
                        "Trust transaction rejected"
                    );
                    return Err(err);
                }
            };

        persist_posting(&txn, organization_id, &ledger, &posting).await?;
        txn.commit().await.map_err(db)?;

        info!(
            transaction_id = %posting.transaction.id,
            client_ledger_id = %ledger_id,
            transaction_type = %transaction_type,
            amount = %amount,
            balance_after = %posting.transaction.balance_after,
            "Trust transaction recorded"
        );
        Ok(posting)
    }

    /// Posts a reversal of an uncleared transaction.
    ///
    /// # Errors
    ///
    /// Returns `TransactionNotFound`, every error
    /// `TrustLedgerEngine::reverse_transaction` can return, or `Database`.
    pub async fn reverse_transaction(
        &self,
        organization_id: OrganizationId,
        transaction_id: TrustTransactionId,
        reason: &str,
        reversed_by: UserId,
    ) -> Result<Posting, TrustError> {
        let now = Utc::now();
        let txn = begin_scoped(&self.db, organization_id).await.map_err(db)?;

        let original = trust_transactions::Entity::find_by_id(transaction_id.into_inner())
            .filter(trust_transactions::Column::OrganizationId.eq(organization_id.into_inner()))
            .one(&txn)
            .await
            .map_err(db)?
            .ok_or(TrustError::TransactionNotFound(transaction_id))?;
        let ledger_id = ClientLedgerId::from_uuid(original.client_ledger_id);
        let account_id = TrustAccountId::from_uuid(original.trust_account_id);

        let account = load_account(&txn, organization_id, account_id, RowLock::Exclusive).await?;
        let ledger =
            load_ledger(&txn, organization_id, ledger_id, account.currency, RowLock::Exclusive)
                .await?;
        let original = convert::trust_transaction(original, account.currency).map_err(db)?;

        let already_reversed = trust_transactions::Entity::find()
            .filter(trust_transactions::Column::ReversalOf.eq(transaction_id.into_inner()))
            .count(&txn)
            .await
            .map_err(db)?
            > 0;
        let ledger_total = ledger_total(&txn, &account).await?;

        let posting = TrustLedgerEngine::reverse_transaction(
            &account,
            &ledger,
            ledger_total,
            &original,
            already_reversed,
            reason,
            reversed_by,
            now,
        )
        .inspect_err(|err| {
            warn!(transaction_id = %transaction_id, error = %err, "Trust reversal rejected");
        })?;

        persist_posting(&txn, organization_id, &ledger, &posting).await?;
        txn.commit().await.map_err(db)?;

        info!(
            transaction_id = %posting.transaction.id,
            reversal_of = %transaction_id,
            "Trust transaction reversed"
        );
        Ok(posting)
    }

    /// Closes a zero-balance ledger with no uncleared transactions.
    ///
    /// # Errors
    ///
    /// Returns `LedgerClosed`, `NonZeroBalance`, `PendingClearance`,
    /// `LedgerNotFound` or `Database`.
    pub async fn close_ledger(
        &self,
        organization_id: OrganizationId,
        ledger_id: ClientLedgerId,
    ) -> Result<ClientLedger, TrustError> {
        let txn = begin_scoped(&self.db, organization_id).await.map_err(db)?;
        let account_id = ledger_account_id(&txn, organization_id, ledger_id).await?;
        let account = load_account(&txn, organization_id, account_id, RowLock::Exclusive).await?;
        let ledger =
            load_ledger(&txn, organization_id, ledger_id, account.currency, RowLock::Exclusive)
                .await?;

        let transactions: Vec<TrustTransaction> = trust_transactions::Entity::find()
            .filter(trust_transactions::Column::ClientLedgerId.eq(ledger_id.into_inner()))
            .all(&txn)
            .await
            .map_err(db)?
            .into_iter()
            .map(|m| convert::trust_transaction(m, account.currency).map_err(db))
            .collect::<Result<_, _>>()?;
        let pending = TrustLedgerEngine::pending_clearance(&transactions);

        let closed = TrustLedgerEngine::close_ledger(&ledger, pending)?;
        client_ledgers::ActiveModel {
            id: Set(closed.id.into_inner()),
            status: Set(closed.status.as_str().to_string()),
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        }
        .update(&txn)
        .await
        .map_err(db)?;

        txn.commit().await.map_err(db)?;
        info!(client_ledger_id = %ledger_id, "Client ledger closed");
        Ok(closed)
    }

    /// Closes an account whose book balance and ledgers are all zero.
    ///
    /// # Errors
    ///
    /// Returns `AccountClosed`, `NonZeroBalance`, `AccountNotFound` or
    /// `Database`.
    pub async fn close_account(
        &self,
        organization_id: OrganizationId,
        account_id: TrustAccountId,
    ) -> Result<TrustAccount, TrustError> {
        let txn = begin_scoped(&self.db, organization_id).await.map_err(db)?;
        let account = load_account(&txn, organization_id, account_id, RowLock::Exclusive).await?;
        let ledgers = load_ledgers(&txn, &account, RowLock::Exclusive).await?;

        let closed = TrustLedgerEngine::close_account(&account, &ledgers)?;
        trust_accounts::ActiveModel {
            id: Set(closed.id.into_inner()),
            status: Set(closed.status.as_str().to_string()),
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        }
        .update(&txn)
        .await
        .map_err(db)?;

        txn.commit().await.map_err(db)?;
        info!(trust_account_id = %account_id, "Trust account closed");
        Ok(closed)
    }

    /// Lists a ledger's transactions in posting order.
    ///
    /// # Errors
    ///
    /// Returns `LedgerNotFound` or `Database`.
    pub async fn list_transactions(
        &self,
        organization_id: OrganizationId,
        ledger_id: ClientLedgerId,
        page: &PageRequest,
    ) -> Result<PageResponse<TrustTransaction>, TrustError> {
        let txn = begin_scoped(&self.db, organization_id).await.map_err(db)?;
        let account_id = ledger_account_id(&txn, organization_id, ledger_id).await?;
        let account = load_account(&txn, organization_id, account_id, RowLock::None).await?;

        let query = trust_transactions::Entity::find()
            .filter(trust_transactions::Column::ClientLedgerId.eq(ledger_id.into_inner()));
        let total = query.clone().count(&txn).await.map_err(db)?;
        let models = query
            .order_by_asc(trust_transactions::Column::CreatedAt)
            .order_by_asc(trust_transactions::Column::Id)
            .offset(page.offset())
            .limit(page.limit())
            .all(&txn)
            .await
            .map_err(db)?;
        txn.commit().await.map_err(db)?;

        let data = models
            .into_iter()
            .map(|m| convert::trust_transaction(m, account.currency).map_err(db))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PageResponse::new(data, page, total))
    }

    /// Compares the book balance with the ledger total and replays every
    /// ledger's history. Reports drift; never corrects it.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` or `Database`.
    pub async fn verify_integrity(
        &self,
        organization_id: OrganizationId,
        account_id: TrustAccountId,
    ) -> Result<IntegrityReport, TrustError> {
        let txn = begin_scoped(&self.db, organization_id).await.map_err(db)?;
        let account = load_account(&txn, organization_id, account_id, RowLock::Shared).await?;
        let ledgers = load_ledgers(&txn, &account, RowLock::None).await?;
        let transactions = load_account_transactions(&txn, &account).await?;
        txn.commit().await.map_err(db)?;

        let report =
            TrustLedgerEngine::verify_trust_account_integrity(&account, &ledgers, &transactions)?;
        if !report.is_consistent {
            warn!(
                trust_account_id = %account_id,
                book_balance = %report.book_balance,
                ledger_total = %report.ledger_total,
                drifted_ledgers = report.drift.len(),
                "Trust account integrity check failed"
            );
        }
        Ok(report)
    }

    /// Runs the compliance checks over every account in the organization.
    ///
    /// # Errors
    ///
    /// Returns `Database` on failure.
    pub async fn compliance_alerts(
        &self,
        organization_id: OrganizationId,
        thresholds: ComplianceThresholds,
    ) -> Result<Vec<ComplianceAlert>, TrustError> {
        let txn = begin_scoped(&self.db, organization_id).await.map_err(db)?;
        let accounts = trust_accounts::Entity::find()
            .filter(trust_accounts::Column::OrganizationId.eq(organization_id.into_inner()))
            .order_by_asc(trust_accounts::Column::Name)
            .all(&txn)
            .await
            .map_err(db)?;

        let mut snapshots = Vec::with_capacity(accounts.len());
        for model in accounts {
            let account = convert::trust_account(model).map_err(db)?;
            let ledgers = load_ledgers(&txn, &account, RowLock::None).await?;
            snapshots.push(AccountSnapshot { account, ledgers });
        }
        txn.commit().await.map_err(db)?;

        ComplianceChecker::run(&snapshots, thresholds, Utc::now())
    }
}

// ============================================================================
// Loading helpers, shared with the reconciliation repository
// ============================================================================

fn with_lock<Q: QuerySelect>(query: Q, lock: RowLock) -> Q {
    match lock {
        RowLock::None => query,
        RowLock::Shared => query.lock_shared(),
        RowLock::Exclusive => query.lock_exclusive(),
    }
}

pub(crate) async fn load_account(
    txn: &DatabaseTransaction,
    organization_id: OrganizationId,
    account_id: TrustAccountId,
    lock: RowLock,
) -> Result<TrustAccount, TrustError> {
    let query = trust_accounts::Entity::find_by_id(account_id.into_inner())
        .filter(trust_accounts::Column::OrganizationId.eq(organization_id.into_inner()));
    let model = with_lock(query, lock)
        .one(txn)
        .await
        .map_err(db)?
        .ok_or(TrustError::AccountNotFound(account_id))?;
    convert::trust_account(model).map_err(db)
}

async fn load_ledger(
    txn: &DatabaseTransaction,
    organization_id: OrganizationId,
    ledger_id: ClientLedgerId,
    currency: Currency,
    lock: RowLock,
) -> Result<ClientLedger, TrustError> {
    let query = client_ledgers::Entity::find_by_id(ledger_id.into_inner())
        .filter(client_ledgers::Column::OrganizationId.eq(organization_id.into_inner()));
    let model = with_lock(query, lock)
        .one(txn)
        .await
        .map_err(db)?
        .ok_or(TrustError::LedgerNotFound(ledger_id))?;
    convert::client_ledger(model, currency).map_err(db)
}

pub(crate) async fn load_ledgers(
    txn: &DatabaseTransaction,
    account: &TrustAccount,
    lock: RowLock,
) -> Result<Vec<ClientLedger>, TrustError> {
    let query = client_ledgers::Entity::find()
        .filter(client_ledgers::Column::TrustAccountId.eq(account.id.into_inner()))
        .order_by_asc(client_ledgers::Column::CreatedAt)
        .order_by_asc(client_ledgers::Column::Id);
    with_lock(query, lock)
        .all(txn)
        .await
        .map_err(db)?
        .into_iter()
        .map(|m| convert::client_ledger(m, account.currency).map_err(db))
        .collect()
}

/// Every transaction of the account in posting order.
pub(crate) async fn load_account_transactions(
    txn: &DatabaseTransaction,
    account: &TrustAccount,
) -> Result<Vec<TrustTransaction>, TrustError> {
    trust_transactions::Entity::find()
        .filter(trust_transactions::Column::TrustAccountId.eq(account.id.into_inner()))
        .order_by_asc(trust_transactions::Column::CreatedAt)
        .order_by_asc(trust_transactions::Column::Id)
        .all(txn)
        .await
        .map_err(db)?
        .into_iter()
        .map(|m| convert::trust_transaction(m, account.currency).map_err(db))
        .collect()
}

async fn ledger_account_id(
    txn: &DatabaseTransaction,
    organization_id: OrganizationId,
    ledger_id: ClientLedgerId,
) -> Result<TrustAccountId, TrustError> {
    client_ledgers::Entity::find_by_id(ledger_id.into_inner())
        .filter(client_ledgers::Column::OrganizationId.eq(organization_id.into_inner()))
        .select_only()
        .column(client_ledgers::Column::TrustAccountId)
        .into_tuple::<Uuid>()
        .one(txn)
        .await
        .map_err(db)?
        .map(TrustAccountId::from_uuid)
        .ok_or(TrustError::LedgerNotFound(ledger_id))
}

/// Sum of active ledger balances under `account`.
async fn ledger_total(
    txn: &DatabaseTransaction,
    account: &TrustAccount,
) -> Result<Money, TrustError> {
    let total = client_ledgers::Entity::find()
        .select_only()
        .column_as(Expr::cust("COALESCE(SUM(balance), 0)::BIGINT"), "total")
        .filter(client_ledgers::Column::TrustAccountId.eq(account.id.into_inner()))
        .filter(client_ledgers::Column::Status.eq("active"))
        .into_tuple::<i64>()
        .one(txn)
        .await
        .map_err(db)?
        .unwrap_or(0);
    Ok(Money::from_minor(total, account.currency))
}

/// Writes a posting: the new transaction row, then the ledger (guarded by
/// its version), then the account.
async fn persist_posting(
    txn: &DatabaseTransaction,
    organization_id: OrganizationId,
    previous: &ClientLedger,
    posting: &Posting,
) -> Result<(), TrustError> {
    let t = &posting.transaction;
    trust_transactions::ActiveModel {
        id: Set(t.id.into_inner()),
        organization_id: Set(organization_id.into_inner()),
        trust_account_id: Set(t.trust_account_id.into_inner()),
        client_ledger_id: Set(t.client_ledger_id.into_inner()),
        transaction_type: Set(t.transaction_type.as_str().to_string()),
        amount: Set(t.amount.minor_units),
        balance_after: Set(t.balance_after.minor_units),
        description: Set(t.description.clone()),
        transaction_date: Set(t.transaction_date),
        reference: Set(t.reference.clone()),
        reversal_of: Set(t.reversal_of.map(TrustTransactionId::into_inner)),
        created_by: Set(t.created_by.into_inner()),
        created_at: Set(t.created_at.into()),
        cleared_statement_id: Set(None),
        cleared_period_end: Set(None),
        cleared_by: Set(None),
        cleared_at: Set(None),
    }
    .insert(txn)
    .await
    .map_err(db)?;

    let ledger = &posting.ledger;
    let updated = client_ledgers::Entity::update_many()
        .col_expr(client_ledgers::Column::Balance, Expr::value(ledger.balance.minor_units))
        .col_expr(client_ledgers::Column::Version, Expr::value(ledger.version))
        .col_expr(
            client_ledgers::Column::LastActivityAt,
            Expr::value(ledger.last_activity_at.map(DateTimeWithTimeZone::from)),
        )
        .col_expr(
            client_ledgers::Column::UpdatedAt,
            Expr::value(DateTimeWithTimeZone::from(t.created_at)),
        )
        .filter(client_ledgers::Column::Id.eq(ledger.id.into_inner()))
        .filter(client_ledgers::Column::Version.eq(previous.version))
        .exec(txn)
        .await
        .map_err(db)?;
    if updated.rows_affected != 1 {
        return Err(TrustError::ConcurrentModification);
    }

    trust_accounts::ActiveModel {
        id: Set(posting.account.id.into_inner()),
        book_balance: Set(posting.account.book_balance.minor_units),
        updated_at: Set(t.created_at.into()),
        ..Default::default()
    }
    .update(txn)
    .await
    .map_err(db)?;

    Ok(())
}
