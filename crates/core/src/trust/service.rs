//! Trust ledger engine.
//!
//! Pure state transitions for trust accounts and client ledgers. Callers load
//! the account, the ledger, and the ledger total inside one database
//! transaction with the rows locked, call the engine, and persist the returned
//! [`Posting`] in that same transaction.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};

use frith_shared::types::{ClientLedgerId, TrustAccountId, TrustTransactionId, UserId};
use frith_shared::{Currency, Money};

use super::error::TrustError;
use super::types::{
    BalanceEffect, ClientLedger, CreateTrustAccountInput, IntegrityReport, LedgerDrift,
    OpenLedgerInput, Posting, RecordTransactionInput, Replay, TrustAccount, TrustStatus,
    TrustTransaction,
};

/// Trust ledger engine.
///
/// This service contains pure business logic with no database dependencies.
pub struct TrustLedgerEngine;

impl TrustLedgerEngine {
    /// Builds a new, empty trust account.
    #[must_use]
    pub fn create_account(input: CreateTrustAccountInput, now: DateTime<Utc>) -> TrustAccount {
        TrustAccount {
            id: TrustAccountId::new(),
            organization_id: input.organization_id,
            name: input.name,
            bank_name: input.bank_name,
            account_number_last4: input.account_number_last4,
            account_type: input.account_type,
            currency: input.currency,
            status: TrustStatus::Active,
            book_balance: Money::zero(input.currency),
            last_reconciled_date: None,
            last_reconciled_balance: None,
            created_at: now,
        }
    }

    /// Opens a zero-balance client ledger under an active account.
    ///
    /// # Errors
    ///
    /// Returns `AccountClosed` if the account is closed.
    pub fn open_ledger(
        account: &TrustAccount,
        input: OpenLedgerInput,
        now: DateTime<Utc>,
    ) -> Result<ClientLedger, TrustError> {
        if !account.is_active() {
            return Err(TrustError::AccountClosed(account.id));
        }

        Ok(ClientLedger {
            id: ClientLedgerId::new(),
            trust_account_id: account.id,
            client_id: input.client_id,
            matter_id: input.matter_id,
            name: input.name,
            balance: Money::zero(account.currency),
            status: TrustStatus::Active,
            version: 0,
            last_activity_at: None,
            created_at: now,
        })
    }

    /// Validates and computes a new posting against a client ledger.
    ///
    /// `ledger_total` is the sum of every ledger balance under `account`, read
    /// in the same transaction as `account` and `ledger`. The engine refuses to
    /// post when it disagrees with the book balance.
    ///
    /// Validation order:
    /// 1. Amount strictly positive
    /// 2. Ledger belongs to the account; currencies match
    /// 3. Account and ledger are active
    /// 4. Book balance equals the ledger total
    /// 5. Decreasing postings leave the ledger non-negative
    ///
    /// # Errors
    ///
    /// Returns `TrustError` if any check fails. Nothing is changed on error.
    pub fn record_transaction(
        account: &TrustAccount,
        ledger: &ClientLedger,
        ledger_total: Money,
        input: RecordTransactionInput,
        now: DateTime<Utc>,
    ) -> Result<Posting, TrustError> {
        Self::post(
            account,
            ledger,
            ledger_total,
            PostingDraft {
                transaction_type: input.transaction_type,
                effect: input.transaction_type.effect(),
                amount: input.amount,
                description: input.description,
                transaction_date: input.transaction_date,
                reference: input.reference,
                reversal_of: None,
                created_by: input.created_by,
            },
            now,
        )
    }

    /// Posts an entry that undoes `original`.
    ///
    /// The original stays untouched; the reversal carries the same type and
    /// amount with `reversal_of` set, which inverts its balance effect.
    ///
    /// # Errors
    ///
    /// Returns `TransactionCleared`, `AlreadyReversed`, `ReversalOfReversal`,
    /// or any error [`record_transaction`](Self::record_transaction) can
    /// return (reversing a spent deposit fails with `InsufficientTrustFunds`).
    #[allow(clippy::too_many_arguments)]
    pub fn reverse_transaction(
        account: &TrustAccount,
        ledger: &ClientLedger,
        ledger_total: Money,
        original: &TrustTransaction,
        already_reversed: bool,
        reason: &str,
        reversed_by: UserId,
        now: DateTime<Utc>,
    ) -> Result<Posting, TrustError> {
        if original.client_ledger_id != ledger.id {
            return Err(TrustError::TransactionNotFound(original.id));
        }
        if original.reversal_of.is_some() {
            return Err(TrustError::ReversalOfReversal(original.id));
        }
        if original.is_cleared() {
            return Err(TrustError::TransactionCleared(original.id));
        }
        if already_reversed {
            return Err(TrustError::AlreadyReversed(original.id));
        }

        Self::post(
            account,
            ledger,
            ledger_total,
            PostingDraft {
                transaction_type: original.transaction_type,
                effect: original.effect().inverse(),
                amount: original.amount,
                description: format!("Reversal: {reason}"),
                transaction_date: now.date_naive(),
                reference: original.reference.clone(),
                reversal_of: Some(original.id),
                created_by: reversed_by,
            },
            now,
        )
    }

    fn post(
        account: &TrustAccount,
        ledger: &ClientLedger,
        ledger_total: Money,
        draft: PostingDraft,
        now: DateTime<Utc>,
    ) -> Result<Posting, TrustError> {
        if !draft.amount.is_positive() {
            return Err(TrustError::InvalidAmount(draft.amount));
        }
        if ledger.trust_account_id != account.id {
            return Err(TrustError::LedgerAccountMismatch {
                ledger_id: ledger.id,
                account_id: account.id,
            });
        }
        // Surfaces CurrencyMismatch before any balance arithmetic.
        draft.amount.compare(&ledger.balance)?;

        if !account.is_active() {
            return Err(TrustError::AccountClosed(account.id));
        }
        if !ledger.is_active() {
            return Err(TrustError::LedgerClosed(ledger.id));
        }
        if ledger_total != account.book_balance {
            return Err(TrustError::IntegrityViolation {
                book_balance: account.book_balance,
                ledger_total,
            });
        }

        let (ledger_balance, book_balance) = match draft.effect {
            BalanceEffect::Increase => (
                ledger.balance.add(&draft.amount)?,
                account.book_balance.add(&draft.amount)?,
            ),
            BalanceEffect::Decrease => (
                ledger.balance.subtract(&draft.amount)?,
                account.book_balance.subtract(&draft.amount)?,
            ),
        };

        if ledger_balance.is_negative() {
            return Err(TrustError::InsufficientTrustFunds {
                available: ledger.balance,
                requested: draft.amount,
            });
        }

        let transaction = TrustTransaction {
            id: TrustTransactionId::new(),
            trust_account_id: account.id,
            client_ledger_id: ledger.id,
            transaction_type: draft.transaction_type,
            amount: draft.amount,
            balance_after: ledger_balance,
            description: draft.description,
            transaction_date: draft.transaction_date,
            reference: draft.reference,
            reversal_of: draft.reversal_of,
            created_by: draft.created_by,
            created_at: now,
            clearance: None,
        };

        let mut updated_ledger = ledger.clone();
        updated_ledger.balance = ledger_balance;
        updated_ledger.version += 1;
        updated_ledger.last_activity_at = Some(now);

        let mut updated_account = account.clone();
        updated_account.book_balance = book_balance;

        Ok(Posting {
            transaction,
            ledger: updated_ledger,
            account: updated_account,
        })
    }

    /// Returns the current ledger balance.
    #[must_use]
    pub const fn get_balance(ledger: &ClientLedger) -> Money {
        ledger.balance
    }

    /// Number of transactions still waiting to appear on a bank statement.
    ///
    /// An uncleared transaction and its uncleared reversal net to nothing at
    /// the bank and never show up on a statement, so the pair is not pending.
    #[must_use]
    pub fn pending_clearance(transactions: &[TrustTransaction]) -> u64 {
        let uncleared: HashSet<TrustTransactionId> = transactions
            .iter()
            .filter(|t| !t.is_cleared())
            .map(|t| t.id)
            .collect();
        let netted: HashSet<TrustTransactionId> = transactions
            .iter()
            .filter(|t| !t.is_cleared())
            .filter_map(|t| t.reversal_of.map(|original| (t.id, original)))
            .filter(|(_, original)| uncleared.contains(original))
            .flat_map(|(reversal, original)| [reversal, original])
            .collect();
        u64::try_from(uncleared.difference(&netted).count()).unwrap_or(u64::MAX)
    }

    /// Closes a ledger.
    ///
    /// # Errors
    ///
    /// Returns `LedgerClosed` if already closed, `NonZeroBalance` unless the
    /// balance is zero, and `PendingClearance` while uncleared transactions
    /// remain.
    pub fn close_ledger(
        ledger: &ClientLedger,
        uncleared_count: u64,
    ) -> Result<ClientLedger, TrustError> {
        if !ledger.is_active() {
            return Err(TrustError::LedgerClosed(ledger.id));
        }
        if !ledger.balance.is_zero() {
            return Err(TrustError::NonZeroBalance(ledger.balance));
        }
        if uncleared_count > 0 {
            return Err(TrustError::PendingClearance(uncleared_count));
        }

        let mut closed = ledger.clone();
        closed.status = TrustStatus::Closed;
        Ok(closed)
    }

    /// Closes a trust account.
    ///
    /// # Errors
    ///
    /// Returns `AccountClosed` if already closed and `NonZeroBalance` unless
    /// the book balance and every ledger balance are zero.
    pub fn close_account(
        account: &TrustAccount,
        ledgers: &[ClientLedger],
    ) -> Result<TrustAccount, TrustError> {
        if !account.is_active() {
            return Err(TrustError::AccountClosed(account.id));
        }
        if !account.book_balance.is_zero() {
            return Err(TrustError::NonZeroBalance(account.book_balance));
        }
        if let Some(funded) = ledgers.iter().find(|l| !l.balance.is_zero()) {
            return Err(TrustError::NonZeroBalance(funded.balance));
        }

        let mut closed = account.clone();
        closed.status = TrustStatus::Closed;
        Ok(closed)
    }

    /// Sums ledger balances in the account currency.
    ///
    /// # Errors
    ///
    /// Returns `TrustError::Money` on a currency mismatch or overflow.
    pub fn ledger_total(currency: Currency, ledgers: &[ClientLedger]) -> Result<Money, TrustError> {
        Ok(Money::sum(
            currency,
            ledgers.iter().filter(|l| l.is_active()).map(|l| &l.balance),
        )?)
    }

    /// Replays a transaction history in order.
    ///
    /// # Errors
    ///
    /// Returns `TrustError::Money` on a currency mismatch or overflow.
    pub fn replay(currency: Currency, transactions: &[TrustTransaction]) -> Result<Replay, TrustError> {
        let mut balance = Money::zero(currency);
        let mut lowest_balance = balance;
        for txn in transactions {
            balance = balance.add(&txn.signed_amount()?)?;
            if balance.minor_units < lowest_balance.minor_units {
                lowest_balance = balance;
            }
        }
        Ok(Replay {
            balance,
            lowest_balance,
        })
    }

    /// Checks that the book balance equals the sum of active ledger balances
    /// and that every ledger's stored balance matches its history.
    ///
    /// Mismatches are reported, never corrected.
    ///
    /// # Errors
    ///
    /// Returns `TrustError::Money` on a currency mismatch or overflow.
    pub fn verify_trust_account_integrity(
        account: &TrustAccount,
        ledgers: &[ClientLedger],
        transactions: &[TrustTransaction],
    ) -> Result<IntegrityReport, TrustError> {
        let ledger_total = Self::ledger_total(account.currency, ledgers)?;
        let difference = account.book_balance.subtract(&ledger_total)?;

        let mut by_ledger: HashMap<ClientLedgerId, Vec<TrustTransaction>> = HashMap::new();
        for txn in transactions {
            by_ledger
                .entry(txn.client_ledger_id)
                .or_default()
                .push(txn.clone());
        }

        let mut drift = Vec::new();
        for ledger in ledgers {
            let history = by_ledger.remove(&ledger.id).unwrap_or_default();
            let replay = Self::replay(account.currency, &history)?;
            if replay.balance != ledger.balance {
                drift.push(LedgerDrift {
                    client_ledger_id: ledger.id,
                    stored_balance: ledger.balance,
                    replayed_balance: replay.balance,
                });
            }
        }

        Ok(IntegrityReport {
            trust_account_id: account.id,
            book_balance: account.book_balance,
            ledger_total,
            difference,
            is_consistent: difference.is_zero() && drift.is_empty(),
            drift,
        })
    }
}

/// Everything needed to post, whether a fresh entry or a reversal.
struct PostingDraft {
    transaction_type: super::types::TrustTransactionType,
    effect: BalanceEffect,
    amount: Money,
    description: String,
    transaction_date: NaiveDate,
    reference: Option<String>,
    reversal_of: Option<TrustTransactionId>,
    created_by: UserId,
}
