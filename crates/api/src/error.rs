//! Mapping from domain errors to JSON error responses.
//!
//! Every error body has the shape `{"error": CODE, "message": text}`. Server
//! errors are logged and their message replaced so database details never
//! leave the process.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use frith_core::billing::BillingError;
use frith_core::reconciliation::ReconciliationError;
use frith_core::render::RenderError;
use frith_core::trust::TrustError;
use frith_shared::AppError;

/// An error response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    /// Creates an error response.
    #[must_use]
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    /// 403 for a caller acting outside their organization.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    /// 400 for a malformed request.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    /// HTTP status of the response.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    fn domain(status: u16, code: &'static str, message: String) -> Self {
        Self::new(
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            code,
            message,
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = if self.status.is_server_error() {
            error!(code = self.code, error = %self.message, "Request failed");
            "An internal error occurred".to_string()
        } else {
            self.message
        };
        (
            self.status,
            Json(json!({ "error": self.code, "message": message })),
        )
            .into_response()
    }
}

impl From<TrustError> for ApiError {
    fn from(err: TrustError) -> Self {
        Self::domain(err.http_status_code(), err.error_code(), err.to_string())
    }
}

impl From<ReconciliationError> for ApiError {
    fn from(err: ReconciliationError) -> Self {
        Self::domain(err.http_status_code(), err.error_code(), err.to_string())
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        Self::domain(err.http_status_code(), err.error_code(), err.to_string())
    }
}

impl From<RenderError> for ApiError {
    fn from(err: RenderError) -> Self {
        Self::domain(err.http_status_code(), err.error_code(), err.to_string())
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self::domain(err.status_code(), err.error_code(), err.to_string())
    }
}
