//! Rendering error types.

use thiserror::Error;

/// Errors that can occur while rendering an invoice.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Template cannot be laid out.
    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    /// A date could not be formatted with the template pattern.
    #[error("Date formatting failed")]
    DateFormat,

    /// Document could not be serialized.
    #[error("Serialization failed: {0}")]
    Serialization(String),
}

impl RenderError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidTemplate(_) => "INVALID_TEMPLATE",
            Self::DateFormat => "DATE_FORMAT_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::InvalidTemplate(_) => 400,
            Self::DateFormat | Self::Serialization(_) => 500,
        }
    }
}
