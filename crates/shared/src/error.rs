//! Errors that do not belong to a single domain module.
//!
//! Trust, reconciliation and billing each carry their own error enum; this
//! type covers money parsing at the request boundary and startup failures.

use thiserror::Error;

use crate::types::MoneyError;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Cross-cutting application error.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed input, such as an amount with too many decimal places.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Well-formed input that breaks a money rule.
    #[error("Business rule violation: {0}")]
    BusinessRule(String),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Configuration(#[from] config::ConfigError),

    /// Arithmetic overflow or another condition that should not happen.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::BusinessRule(_) => 422,
            Self::Configuration(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::BusinessRule(_) => "BUSINESS_RULE_VIOLATION",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<MoneyError> for AppError {
    fn from(err: MoneyError) -> Self {
        match err {
            MoneyError::CurrencyMismatch { .. } => Self::BusinessRule(err.to_string()),
            MoneyError::Overflow => Self::Internal(err.to_string()),
            MoneyError::PrecisionLoss { .. }
            | MoneyError::InvalidCurrency(_)
            | MoneyError::InvalidAmount(_) => Self::Validation(err.to_string()),
        }
    }
}
