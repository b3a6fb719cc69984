// Error handling types for the API

use axum::{
    http::{HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use super::validation::ValidationResult;

/// API error types
///
/// Every variant maps to a stable `code` string that clients can branch on.
/// Internal details (database errors, mail failures) are logged and replaced
/// with a generic message before leaving the process.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Validation Error: {0}")]
    ValidationError(String),
    #[error("Email taken: {0}")]
    EmailTaken(String),
    #[error("Not Found: {0}")]
    NotFound(String),
    #[error("OTP cooldown: wait {wait_seconds}s")]
    OtpCooldown { wait_seconds: i64 },
    #[error("OTP rate limit: {0}")]
    OtpRateLimit(String),
    #[error("OTP missing")]
    OtpMissing,
    #[error("OTP already used")]
    OtpUsed,
    #[error("OTP expired")]
    OtpExpired,
    #[error("OTP invalid")]
    OtpInvalid,
    #[error("Google token invalid: {0}")]
    GoogleInvalid(String),
    #[error("Provider mismatch: {0}")]
    ProviderMismatch(String),
    #[error("Configuration missing: {0}")]
    ConfigMissing(String),
    #[error("CSRF token mismatch")]
    CsrfMismatch,
    #[error("Unauthenticated")]
    Unauthenticated,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Internal Server Error: {0}")]
    InternalServer(String),
    #[error("Database Error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// JSON error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<i64>,
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::ValidationError(_) => "VALIDATION_ERROR",
            ApiError::EmailTaken(_) => "EMAIL_TAKEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::OtpCooldown { .. } => "OTP_COOLDOWN",
            ApiError::OtpRateLimit(_) => "OTP_RATE_LIMIT",
            ApiError::OtpMissing => "OTP_MISSING",
            ApiError::OtpUsed => "OTP_USED",
            ApiError::OtpExpired => "OTP_EXPIRED",
            ApiError::OtpInvalid => "OTP_INVALID",
            ApiError::GoogleInvalid(_) => "GOOGLE_INVALID",
            ApiError::ProviderMismatch(_) => "PROVIDER_MISMATCH",
            ApiError::ConfigMissing(_) => "CONFIG_MISSING",
            ApiError::CsrfMismatch => "CSRF_MISMATCH",
            ApiError::Unauthenticated => "UNAUTHENTICATED",
            ApiError::InvalidToken => "INVALID_TOKEN",
            ApiError::InternalServer(_) | ApiError::DatabaseError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::ValidationError(_)
            | ApiError::OtpMissing
            | ApiError::OtpUsed
            | ApiError::OtpExpired
            | ApiError::OtpInvalid => StatusCode::BAD_REQUEST,
            ApiError::EmailTaken(_) | ApiError::ProviderMismatch(_) => StatusCode::CONFLICT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::OtpCooldown { .. } | ApiError::OtpRateLimit(_) => {
                StatusCode::TOO_MANY_REQUESTS
            }
            ApiError::GoogleInvalid(_) | ApiError::Unauthenticated | ApiError::InvalidToken => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::CsrfMismatch => StatusCode::FORBIDDEN,
            ApiError::ConfigMissing(_)
            | ApiError::InternalServer(_)
            | ApiError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the client.
    pub fn client_message(&self) -> String {
        match self {
            ApiError::ValidationError(msg)
            | ApiError::EmailTaken(msg)
            | ApiError::NotFound(msg)
            | ApiError::OtpRateLimit(msg)
            | ApiError::ProviderMismatch(msg)
            | ApiError::ConfigMissing(msg) => msg.clone(),
            ApiError::OtpCooldown { wait_seconds } => {
                format!("Please wait {}s before requesting another OTP.", wait_seconds)
            }
            ApiError::OtpMissing => "Please request a new OTP.".to_string(),
            ApiError::OtpUsed => "OTP already used, request a new one.".to_string(),
            ApiError::OtpExpired => "OTP expired, request a new one.".to_string(),
            ApiError::OtpInvalid => "Incorrect OTP.".to_string(),
            ApiError::GoogleInvalid(_) => "Invalid Google token".to_string(),
            ApiError::CsrfMismatch => "Invalid CSRF token".to_string(),
            ApiError::Unauthenticated => "Missing token".to_string(),
            ApiError::InvalidToken => "Invalid token".to_string(),
            ApiError::InternalServer(_) | ApiError::DatabaseError(_) => {
                "Something went wrong".to_string()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        match &self {
            ApiError::DatabaseError(e) => error!(error = %e, "Database error occurred"),
            ApiError::InternalServer(msg) => error!(error = %msg, "Internal error occurred"),
            _ => {}
        }

        let retry_after = match &self {
            ApiError::OtpCooldown { wait_seconds } => Some(*wait_seconds),
            _ => None,
        };

        let error_response = ErrorResponse {
            code: self.code().to_string(),
            message: self.client_message(),
            retry_after,
        };

        let mut response = (self.status(), Json(error_response)).into_response();
        if let Some(seconds) = retry_after {
            if let Ok(retry_header) = HeaderValue::from_str(&seconds.to_string()) {
                response.headers_mut().insert("retry-after", retry_header);
            }
        }
        response
    }
}

/// Helper function to convert ValidationResult to ApiError
impl From<ValidationResult> for ApiError {
    fn from(result: ValidationResult) -> Self {
        if result.is_valid {
            ApiError::InternalServer(
                "Validation result was valid but converted to error".to_string(),
            )
        } else {
            let error_messages: Vec<String> = result
                .errors
                .iter()
                .map(|e| format!("{}: {}", e.field, e.message))
                .collect();
            ApiError::ValidationError(error_messages.join(", "))
        }
    }
}
