//! Trust ledger error types.

use frith_shared::types::{ClientLedgerId, TrustAccountId, TrustTransactionId};
use frith_shared::{Money, MoneyError};
use thiserror::Error;

/// Errors that can occur during trust ledger operations.
#[derive(Debug, Error)]
pub enum TrustError {
    // ========== Validation Errors ==========
    /// Amount must be strictly positive.
    #[error("Amount must be positive, got {0}")]
    InvalidAmount(Money),

    /// Money arithmetic failed (currency mismatch, overflow).
    #[error(transparent)]
    Money(#[from] MoneyError),

    /// Ledger does not belong to the account it was posted through.
    #[error("Ledger {ledger_id} does not belong to trust account {account_id}")]
    LedgerAccountMismatch {
        /// The ledger.
        ledger_id: ClientLedgerId,
        /// The account.
        account_id: TrustAccountId,
    },

    // ========== Balance Errors ==========
    /// Posting would drive the ledger negative.
    #[error("Insufficient trust funds: available {available}, requested {requested}")]
    InsufficientTrustFunds {
        /// Current ledger balance.
        available: Money,
        /// Amount requested.
        requested: Money,
    },

    /// Close requires a zero balance.
    #[error("Balance must be zero to close, current balance {0}")]
    NonZeroBalance(Money),

    /// Close requires every transaction to have cleared.
    #[error("{0} transaction(s) are still pending clearance")]
    PendingClearance(u64),

    /// Book balance and ledger total disagree; postings are refused until
    /// the discrepancy is resolved.
    #[error("Trust account out of balance: book {book_balance}, ledgers {ledger_total}")]
    IntegrityViolation {
        /// Stored book balance.
        book_balance: Money,
        /// Sum of ledger balances.
        ledger_total: Money,
    },

    // ========== State Errors ==========
    /// Ledger is closed.
    #[error("Client ledger {0} is closed")]
    LedgerClosed(ClientLedgerId),

    /// Account is closed.
    #[error("Trust account {0} is closed")]
    AccountClosed(TrustAccountId),

    /// Transaction has already been reversed.
    #[error("Trust transaction {0} has already been reversed")]
    AlreadyReversed(TrustTransactionId),

    /// A reversal entry cannot itself be reversed.
    #[error("Trust transaction {0} is a reversal and cannot be reversed")]
    ReversalOfReversal(TrustTransactionId),

    /// Cleared transactions are part of a statement and cannot be reversed.
    #[error("Trust transaction {0} has cleared the bank and cannot be reversed")]
    TransactionCleared(TrustTransactionId),

    // ========== Not Found ==========
    /// Trust account not found.
    #[error("Trust account not found: {0}")]
    AccountNotFound(TrustAccountId),

    /// Client ledger not found.
    #[error("Client ledger not found: {0}")]
    LedgerNotFound(ClientLedgerId),

    /// Trust transaction not found.
    #[error("Trust transaction not found: {0}")]
    TransactionNotFound(TrustTransactionId),

    // ========== Infrastructure ==========
    /// Concurrent modification detected.
    #[error("Concurrent modification detected, please retry")]
    ConcurrentModification,

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

impl TrustError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::Money(MoneyError::CurrencyMismatch { .. }) => "CURRENCY_MISMATCH",
            Self::Money(MoneyError::Overflow) => "AMOUNT_OVERFLOW",
            Self::Money(_) => "INVALID_MONEY",
            Self::LedgerAccountMismatch { .. } => "LEDGER_ACCOUNT_MISMATCH",
            Self::InsufficientTrustFunds { .. } => "INSUFFICIENT_TRUST_FUNDS",
            Self::NonZeroBalance(_) => "NON_ZERO_BALANCE",
            Self::PendingClearance(_) => "PENDING_CLEARANCE",
            Self::IntegrityViolation { .. } => "TRUST_INTEGRITY_VIOLATION",
            Self::LedgerClosed(_) => "LEDGER_CLOSED",
            Self::AccountClosed(_) => "ACCOUNT_CLOSED",
            Self::AlreadyReversed(_) => "ALREADY_REVERSED",
            Self::ReversalOfReversal(_) => "REVERSAL_OF_REVERSAL",
            Self::TransactionCleared(_) => "TRANSACTION_CLEARED",
            Self::AccountNotFound(_) => "TRUST_ACCOUNT_NOT_FOUND",
            Self::LedgerNotFound(_) => "CLIENT_LEDGER_NOT_FOUND",
            Self::TransactionNotFound(_) => "TRUST_TRANSACTION_NOT_FOUND",
            Self::ConcurrentModification => "CONCURRENT_MODIFICATION",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - malformed input
            Self::InvalidAmount(_) | Self::Money(_) | Self::LedgerAccountMismatch { .. } => 400,

            // 404 Not Found
            Self::AccountNotFound(_) | Self::LedgerNotFound(_) | Self::TransactionNotFound(_) => {
                404
            }

            // 409 Conflict - state and concurrency
            Self::LedgerClosed(_)
            | Self::AccountClosed(_)
            | Self::AlreadyReversed(_)
            | Self::ConcurrentModification => 409,

            // 422 Unprocessable - business rule violations
            Self::InsufficientTrustFunds { .. }
            | Self::NonZeroBalance(_)
            | Self::PendingClearance(_)
            | Self::ReversalOfReversal(_)
            | Self::TransactionCleared(_) => 422,

            // 500 Internal Server Error
            Self::IntegrityViolation { .. } | Self::Database(_) => 500,
        }
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentModification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use frith_shared::Currency;

    fn usd(minor: i64) -> Money {
        Money::from_minor(minor, Currency::USD)
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            TrustError::InsufficientTrustFunds {
                available: usd(50_000),
                requested: usd(60_000),
            }
            .error_code(),
            "INSUFFICIENT_TRUST_FUNDS"
        );
        assert_eq!(
            TrustError::from(MoneyError::CurrencyMismatch {
                left: Currency::USD,
                right: Currency::EUR,
            })
            .error_code(),
            "CURRENCY_MISMATCH"
        );
        assert_eq!(TrustError::NonZeroBalance(usd(1)).error_code(), "NON_ZERO_BALANCE");
    }

    #[test]
    fn test_http_status_codes() {
        assert_eq!(TrustError::InvalidAmount(usd(0)).http_status_code(), 400);
        assert_eq!(
            TrustError::LedgerNotFound(ClientLedgerId::new()).http_status_code(),
            404
        );
        assert_eq!(TrustError::ConcurrentModification.http_status_code(), 409);
        assert_eq!(
            TrustError::InsufficientTrustFunds {
                available: usd(0),
                requested: usd(1),
            }
            .http_status_code(),
            422
        );
        assert_eq!(TrustError::Database("x".into()).http_status_code(), 500);
    }

    #[test]
    fn test_retryable_errors() {
        assert!(TrustError::ConcurrentModification.is_retryable());
        assert!(!TrustError::NonZeroBalance(usd(1)).is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = TrustError::InsufficientTrustFunds {
            available: usd(50_000),
            requested: usd(60_000),
        };
        assert_eq!(
            err.to_string(),
            "Insufficient trust funds: available 500.00 USD, requested 600.00 USD"
        );
    }
}
