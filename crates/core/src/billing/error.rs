//! Billing error types.

use frith_shared::types::{InvoiceId, PaymentId};
use frith_shared::{Money, MoneyError};
use rust_decimal::Decimal;
use thiserror::Error;

use super::types::InvoiceStatus;

/// Errors that can occur during invoice and payment operations.
#[derive(Debug, Error)]
pub enum BillingError {
    // ========== Validation Errors ==========
    /// Money arithmetic failed (currency mismatch, overflow).
    #[error(transparent)]
    Money(#[from] MoneyError),

    /// Amount must be strictly positive.
    #[error("Amount must be positive, got {0}")]
    InvalidAmount(Money),

    /// Quantity must be strictly positive.
    #[error("Quantity must be positive, got {0}")]
    InvalidQuantity(Decimal),

    /// Rate must not be negative.
    #[error("Rate must not be negative, got {0}")]
    InvalidRate(Money),

    /// Due date precedes issue date.
    #[error("Due date must not be before the issue date")]
    InvalidDueDate,

    /// A reason is required for this action.
    #[error("A reason is required to {0} an invoice")]
    ReasonRequired(&'static str),

    /// Tax calculator produced an unusable result.
    #[error("Tax calculation failed: {0}")]
    TaxCalculation(String),

    // ========== State Errors ==========
    /// Line items and totals can only change while the invoice is a draft.
    #[error("Invoice {id} is {status} and can no longer be edited")]
    InvoiceLocked {
        /// Invoice.
        id: InvoiceId,
        /// Current status.
        status: InvoiceStatus,
    },

    /// Attempted an invalid status transition.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        /// The current status.
        from: InvoiceStatus,
        /// The attempted target status.
        to: InvoiceStatus,
    },

    /// Invoice has no line items.
    #[error("Invoice has no line items")]
    NoLineItems,

    /// Totals must be finalized before submission.
    #[error("Invoice totals have not been finalized")]
    TotalsNotFinalized,

    /// Invoice is not in a status that accepts payments.
    #[error("Invoice in status {0} does not accept payments")]
    NotPayable(InvoiceStatus),

    /// Payment exceeds the balance due and overpayment was not allowed.
    #[error("Payment {attempted} exceeds balance due {balance_due}")]
    Overpayment {
        /// Current balance due.
        balance_due: Money,
        /// Payment amount.
        attempted: Money,
    },

    /// Write-off exceeds the balance due.
    #[error("Write-off {requested} exceeds balance due {balance_due}")]
    WriteOffExceedsBalance {
        /// Current balance due.
        balance_due: Money,
        /// Requested write-off.
        requested: Money,
    },

    /// Invoices with payments cannot be cancelled.
    #[error("Invoice has payments of {0} and cannot be cancelled")]
    HasPayments(Money),

    // ========== Conflicts ==========
    /// Invoice number already used in the organization.
    #[error("Invoice number {0} already exists")]
    DuplicateInvoiceNumber(String),

    /// Concurrent modification detected.
    #[error("Concurrent modification detected, please retry")]
    ConcurrentModification,

    // ========== Not Found ==========
    /// Invoice not found.
    #[error("Invoice not found: {0}")]
    InvoiceNotFound(InvoiceId),

    /// Payment not found.
    #[error("Payment not found: {0}")]
    PaymentNotFound(PaymentId),

    // ========== Infrastructure ==========
    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

impl BillingError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Money(MoneyError::CurrencyMismatch { .. }) => "CURRENCY_MISMATCH",
            Self::Money(MoneyError::Overflow) => "AMOUNT_OVERFLOW",
            Self::Money(_) => "INVALID_MONEY",
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::InvalidQuantity(_) => "INVALID_QUANTITY",
            Self::InvalidRate(_) => "INVALID_RATE",
            Self::InvalidDueDate => "INVALID_DUE_DATE",
            Self::ReasonRequired(_) => "REASON_REQUIRED",
            Self::TaxCalculation(_) => "TAX_CALCULATION_FAILED",
            Self::InvoiceLocked { .. } => "INVOICE_LOCKED",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::NoLineItems => "NO_LINE_ITEMS",
            Self::TotalsNotFinalized => "TOTALS_NOT_FINALIZED",
            Self::NotPayable(_) => "INVOICE_NOT_PAYABLE",
            Self::Overpayment { .. } => "OVERPAYMENT",
            Self::WriteOffExceedsBalance { .. } => "WRITE_OFF_EXCEEDS_BALANCE",
            Self::HasPayments(_) => "INVOICE_HAS_PAYMENTS",
            Self::DuplicateInvoiceNumber(_) => "DUPLICATE_INVOICE_NUMBER",
            Self::ConcurrentModification => "CONCURRENT_MODIFICATION",
            Self::InvoiceNotFound(_) => "INVOICE_NOT_FOUND",
            Self::PaymentNotFound(_) => "PAYMENT_NOT_FOUND",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::Money(_)
            | Self::InvalidAmount(_)
            | Self::InvalidQuantity(_)
            | Self::InvalidRate(_)
            | Self::InvalidDueDate
            | Self::ReasonRequired(_) => 400,

            Self::InvoiceNotFound(_) | Self::PaymentNotFound(_) => 404,

            Self::InvoiceLocked { .. }
            | Self::InvalidTransition { .. }
            | Self::DuplicateInvoiceNumber(_)
            | Self::ConcurrentModification => 409,

            Self::NoLineItems
            | Self::TotalsNotFinalized
            | Self::NotPayable(_)
            | Self::Overpayment { .. }
            | Self::WriteOffExceedsBalance { .. }
            | Self::HasPayments(_) => 422,

            Self::TaxCalculation(_) | Self::Database(_) => 500,
        }
    }

    /// Returns true if this error is retryable.
    ///
    /// A duplicate number means another request took the sequence value
    /// first; allocating again succeeds.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConcurrentModification | Self::DuplicateInvoiceNumber(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use frith_shared::Currency;

    #[test]
    fn test_invoice_locked() {
        let err = BillingError::InvoiceLocked {
            id: InvoiceId::new(),
            status: InvoiceStatus::Sent,
        };
        assert_eq!(err.error_code(), "INVOICE_LOCKED");
        assert_eq!(err.http_status_code(), 409);
        assert!(err.to_string().contains("is sent and can no longer be edited"));
    }

    #[test]
    fn test_overpayment_display() {
        let err = BillingError::Overpayment {
            balance_due: Money::from_minor(15_000, Currency::USD),
            attempted: Money::from_minor(20_000, Currency::USD),
        };
        assert_eq!(
            err.to_string(),
            "Payment 200.00 USD exceeds balance due 150.00 USD"
        );
        assert_eq!(err.http_status_code(), 422);
    }

    #[test]
    fn test_retryable() {
        assert!(BillingError::DuplicateInvoiceNumber("FRITH-000001".into()).is_retryable());
        assert!(!BillingError::NoLineItems.is_retryable());
    }
}
