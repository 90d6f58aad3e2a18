//! Error types for the Billing API service.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use tollgate_billing_core::BillingError;

/// API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Billing(#[from] BillingError),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized | Self::Billing(BillingError::Authentication) => {
                StatusCode::UNAUTHORIZED
            }
            Self::BadRequest(_)
            | Self::Billing(BillingError::Validation(_))
            | Self::Billing(BillingError::Signature(_)) => StatusCode::BAD_REQUEST,
            Self::Billing(BillingError::Conflict) => StatusCode::CONFLICT,
            Self::Billing(BillingError::RateLimit { .. }) => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) | Self::Billing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized | Self::Billing(BillingError::Authentication) => "UNAUTHORIZED",
            Self::BadRequest(_) | Self::Billing(BillingError::Validation(_)) => "BAD_REQUEST",
            Self::Billing(BillingError::Signature(_)) => "INVALID_SIGNATURE",
            Self::Billing(BillingError::Conflict) => "CHANGE_IN_PROGRESS",
            Self::Billing(BillingError::RateLimit { .. }) => "RATE_LIMITED",
            Self::Internal(_) | Self::Billing(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        if status.is_server_error() {
            tracing::error!(error = ?self, "Internal API error");
        }

        let details = match &self {
            Self::Billing(BillingError::RateLimit { retry_after_secs }) => Some(serde_json::json!({
                "retry_after_secs": retry_after_secs,
            })),
            _ => None,
        };
        let retry_after = match &self {
            Self::Billing(BillingError::RateLimit { retry_after_secs }) => Some(*retry_after_secs),
            _ => None,
        };

        let body = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
                details,
            },
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = secs.to_string().parse() {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
