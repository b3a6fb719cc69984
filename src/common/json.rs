//! JSON body extractor whose rejections use the API error format.

use axum::extract::rejection::JsonRejection;
use axum::extract::FromRequest;

use super::ApiError;

/// Like `axum::Json`, but malformed or mistyped bodies come back as
/// `VALIDATION_ERROR` instead of axum's plain-text rejection.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::ValidationError(rejection.body_text())
    }
}
