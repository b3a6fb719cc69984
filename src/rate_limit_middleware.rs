// rate_limit_middleware.rs
use crate::common::error::ErrorResponse;
use crate::common::helpers::extract_ip_address;
use crate::services::rate_limit::{RateLimitResult, RateLimitService};
use axum::{
    extract::{ConnectInfo, Extension, Request},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, warn};

/// Global per-IP rate limiting middleware
pub async fn rate_limit_middleware(
    Extension(rate_limit_service): Extension<Arc<RateLimitService>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Response {
    let ip_address = extract_ip_address(request.headers(), connect_info.as_ref());
    let path = request.uri().path().to_string();

    match rate_limit_service
        .check_rate_limit(ip_address.as_deref())
        .await
    {
        RateLimitResult::Allowed => {
            debug!(ip = ?ip_address, path = %path, "Request allowed by rate limiter");
            next.run(request).await
        }
        RateLimitResult::Limited { retry_after } => {
            rate_limit_service.log_violation(ip_address.as_deref(), &path);

            let error_response = ErrorResponse {
                code: "RATE_LIMIT_EXCEEDED".to_string(),
                message: "Rate limit exceeded. Please try again later.".to_string(),
                retry_after: Some(retry_after as i64),
            };

            let mut response =
                (StatusCode::TOO_MANY_REQUESTS, Json(error_response)).into_response();

            if let Ok(retry_header) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert("retry-after", retry_header);
            }
            if let Ok(limit_header) =
                HeaderValue::from_str(&rate_limit_service.config().per_ip_limit.to_string())
            {
                response
                    .headers_mut()
                    .insert("x-ratelimit-limit", limit_header);
            }

            warn!(ip = ?ip_address, path = %path, retry_after, "Request blocked by rate limiter");
            response
        }
    }
}
