//! Reconciliation error types.

use chrono::NaiveDate;
use frith_shared::types::{
    ReconciliationId, StatementImportId, TrustAccountId, TrustTransactionId,
};
use frith_shared::{Money, MoneyError};
use thiserror::Error;

use super::types::ReconciliationStatus;

/// Errors that can occur during reconciliation operations.
#[derive(Debug, Error)]
pub enum ReconciliationError {
    // ========== Validation Errors ==========
    /// Money arithmetic failed (currency mismatch, overflow).
    #[error(transparent)]
    Money(#[from] MoneyError),

    /// Statement period starts after it ends.
    #[error("Invalid statement period: {start} is after {end}")]
    InvalidPeriod {
        /// Period start.
        start: NaiveDate,
        /// Period end.
        end: NaiveDate,
    },

    /// A statement line is dated outside the statement period.
    #[error("Statement line dated {0} falls outside the statement period")]
    LineOutsidePeriod(NaiveDate),

    /// Statement file could not be parsed.
    #[error("Statement parse error on line {line}: {message}")]
    StatementParse {
        /// 1-based record number (header is line 1).
        line: u64,
        /// What went wrong.
        message: String,
    },

    /// Statement file lacks a required column.
    #[error("Statement is missing a {0} column")]
    MissingColumn(&'static str),

    // ========== Clearing Errors ==========
    /// Transaction belongs to another trust account.
    #[error("Trust transaction {0} does not belong to the statement's account")]
    TransactionNotInAccount(TrustTransactionId),

    /// Transaction has already been cleared.
    #[error("Trust transaction {0} has already been cleared")]
    AlreadyCleared(TrustTransactionId),

    /// Transaction is dated after the statement period.
    #[error("Trust transaction {id} dated {date} is after the statement period end {period_end}")]
    TransactionAfterPeriod {
        /// Transaction.
        id: TrustTransactionId,
        /// Transaction date.
        date: NaiveDate,
        /// Statement period end.
        period_end: NaiveDate,
    },

    /// Statement belongs to another trust account.
    #[error("Statement {0} does not belong to this trust account")]
    StatementAccountMismatch(StatementImportId),

    /// Statement covers a different period than the one reconciled.
    #[error(
        "Statement {id} covers {statement_start} to {statement_end}, not {start} to {end}"
    )]
    StatementPeriodMismatch {
        /// Statement.
        id: StatementImportId,
        /// First day on the statement.
        statement_start: NaiveDate,
        /// Last day on the statement.
        statement_end: NaiveDate,
        /// First day reconciled.
        start: NaiveDate,
        /// Last day reconciled.
        end: NaiveDate,
    },

    /// Closing balance differs from the one on the imported statement.
    #[error("Statement {id} closes at {on_statement}, not {given}")]
    StatementBalanceMismatch {
        /// Statement.
        id: StatementImportId,
        /// Closing balance on the statement.
        on_statement: Money,
        /// Closing balance supplied for the run.
        given: Money,
    },

    // ========== Workflow Errors ==========
    /// Approval requires a balanced reconciliation.
    #[error("Reconciliation is unbalanced with {0} discrepancy(ies)")]
    UnbalancedReconciliation(usize),

    /// Action not allowed from the current status.
    #[error("Cannot {action} a reconciliation in status {from}")]
    InvalidTransition {
        /// Current status.
        from: ReconciliationStatus,
        /// Attempted action.
        action: &'static str,
    },

    /// Override approval needs a written justification.
    #[error("Override approval requires a justification")]
    JustificationRequired,

    /// Approver may not override.
    #[error("Role '{0}' may not approve an unbalanced reconciliation")]
    OverrideNotAuthorized(String),

    // ========== Not Found ==========
    /// Trust account not found.
    #[error("Trust account not found: {0}")]
    AccountNotFound(TrustAccountId),

    /// Statement import not found.
    #[error("Statement import not found: {0}")]
    StatementNotFound(StatementImportId),

    /// Reconciliation not found.
    #[error("Reconciliation not found: {0}")]
    NotFound(ReconciliationId),

    // ========== Infrastructure ==========
    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

impl ReconciliationError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Money(MoneyError::CurrencyMismatch { .. }) => "CURRENCY_MISMATCH",
            Self::Money(_) => "INVALID_MONEY",
            Self::InvalidPeriod { .. } => "INVALID_PERIOD",
            Self::LineOutsidePeriod(_) => "LINE_OUTSIDE_PERIOD",
            Self::StatementParse { .. } => "STATEMENT_PARSE_ERROR",
            Self::MissingColumn(_) => "MISSING_COLUMN",
            Self::TransactionNotInAccount(_) => "TRANSACTION_NOT_IN_ACCOUNT",
            Self::AlreadyCleared(_) => "ALREADY_CLEARED",
            Self::TransactionAfterPeriod { .. } => "TRANSACTION_AFTER_PERIOD",
            Self::StatementAccountMismatch(_) => "STATEMENT_ACCOUNT_MISMATCH",
            Self::StatementPeriodMismatch { .. } => "STATEMENT_PERIOD_MISMATCH",
            Self::StatementBalanceMismatch { .. } => "STATEMENT_BALANCE_MISMATCH",
            Self::UnbalancedReconciliation(_) => "UNBALANCED_RECONCILIATION",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::JustificationRequired => "JUSTIFICATION_REQUIRED",
            Self::OverrideNotAuthorized(_) => "OVERRIDE_NOT_AUTHORIZED",
            Self::AccountNotFound(_) => "TRUST_ACCOUNT_NOT_FOUND",
            Self::StatementNotFound(_) => "STATEMENT_NOT_FOUND",
            Self::NotFound(_) => "RECONCILIATION_NOT_FOUND",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::Money(_)
            | Self::InvalidPeriod { .. }
            | Self::LineOutsidePeriod(_)
            | Self::StatementParse { .. }
            | Self::MissingColumn(_)
            | Self::TransactionNotInAccount(_)
            | Self::StatementAccountMismatch(_)
            | Self::StatementPeriodMismatch { .. }
            | Self::StatementBalanceMismatch { .. }
            | Self::JustificationRequired => 400,

            Self::OverrideNotAuthorized(_) => 403,

            Self::AccountNotFound(_) | Self::StatementNotFound(_) | Self::NotFound(_) => 404,

            Self::AlreadyCleared(_) | Self::InvalidTransition { .. } => 409,

            Self::TransactionAfterPeriod { .. } | Self::UnbalancedReconciliation(_) => 422,

            Self::Database(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_and_statuses() {
        let err = ReconciliationError::UnbalancedReconciliation(2);
        assert_eq!(err.error_code(), "UNBALANCED_RECONCILIATION");
        assert_eq!(err.http_status_code(), 422);
        assert_eq!(
            err.to_string(),
            "Reconciliation is unbalanced with 2 discrepancy(ies)"
        );

        let err = ReconciliationError::OverrideNotAuthorized("member".into());
        assert_eq!(err.http_status_code(), 403);

        let err = ReconciliationError::InvalidTransition {
            from: ReconciliationStatus::Approved,
            action: "submit",
        };
        assert_eq!(err.to_string(), "Cannot submit a reconciliation in status approved");
    }
}
