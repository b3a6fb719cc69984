//! Double-submit CSRF protection.
//!
//! The `csrf` cookie is readable by the frontend, which echoes it in the
//! `x-csrf-token` header. State-changing requests must carry both, equal.

use axum::{
    extract::Request,
    http::{HeaderValue, Method},
    middleware::Next,
    response::Response,
};
use rand::RngCore;
use tracing::warn;

use super::session::CookiePolicy;
use crate::common::helpers::read_cookie;
use crate::common::ApiError;

pub const CSRF_COOKIE: &str = "csrf";
pub const CSRF_HEADER: &str = "x-csrf-token";
const CSRF_COOKIE_MAX_AGE: i64 = 7 * 24 * 60 * 60;

/// 16 random bytes, hex encoded.
pub fn issue_token() -> String {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn validate(header: Option<&str>, cookie: Option<&str>) -> Result<(), ApiError> {
    match (header, cookie) {
        (Some(header), Some(cookie)) if !header.is_empty() && constant_time_eq(header, cookie) => {
            Ok(())
        }
        _ => Err(ApiError::CsrfMismatch),
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub fn csrf_cookie(token: &str, policy: &CookiePolicy) -> Result<HeaderValue, ApiError> {
    policy.build(format!(
        "{}={}; {}; Max-Age={}",
        CSRF_COOKIE,
        token,
        policy.attributes(),
        CSRF_COOKIE_MAX_AGE
    ))
}

pub fn clear_csrf_cookie(policy: &CookiePolicy) -> Result<HeaderValue, ApiError> {
    policy.build(format!("{}=; {}; Max-Age=0", CSRF_COOKIE, policy.attributes()))
}

fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Rejects unsafe requests whose header and cookie tokens differ.
pub async fn require_csrf(request: Request, next: Next) -> Result<Response, ApiError> {
    if !is_safe_method(request.method()) {
        let header = request
            .headers()
            .get(CSRF_HEADER)
            .and_then(|v| v.to_str().ok());
        let cookie = read_cookie(request.headers(), CSRF_COOKIE);

        if let Err(e) = validate(header, cookie.as_deref()) {
            warn!(
                method = %request.method(),
                path = %request.uri().path(),
                has_header = header.is_some(),
                has_cookie = cookie.is_some(),
                "CSRF check failed"
            );
            return Err(e);
        }
    }

    Ok(next.run(request).await)
}
