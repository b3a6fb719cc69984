// src/logging_middleware.rs
//! Middleware for logging request and response bodies at debug level.
//!
//! Codes and ID tokens are masked before anything is written.

use axum::body::{to_bytes, Bytes, HttpBody};
use axum::{body::Body, extract::Request, http::StatusCode, middleware::Next, response::Response};
use serde_json::Value;
use tracing::{debug, enabled, Level};

const REDACTED_KEYS: [&str; 3] = ["otp", "idToken", "token"];
const MAX_BUFFERED_BODY: usize = 2 * 1024 * 1024;

fn redact(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, field) in map.iter_mut() {
                if REDACTED_KEYS.contains(&key.as_str()) {
                    *field = Value::String("[REDACTED]".to_string());
                } else {
                    redact(field);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact),
        _ => {}
    }
}

/// Pretty JSON with secrets masked, or `None` for bodies that aren't JSON.
fn loggable_body(bytes: &[u8]) -> Option<String> {
    let mut json: Value = serde_json::from_slice(bytes).ok()?;
    redact(&mut json);
    serde_json::to_string_pretty(&json).ok()
}

/// Reads a body for logging, refusing anything over `MAX_BUFFERED_BODY`.
async fn buffer_body(body: Body) -> Result<Bytes, StatusCode> {
    to_bytes(body, MAX_BUFFERED_BODY)
        .await
        .map_err(|_| StatusCode::PAYLOAD_TOO_LARGE)
}

/// Middleware to log request and response bodies in debug mode
pub async fn log_request_response(request: Request, next: Next) -> Result<Response, StatusCode> {
    if !enabled!(Level::DEBUG) {
        return Ok(next.run(request).await);
    }

    let (parts, body) = request.into_parts();
    let bytes = buffer_body(body).await?;

    if !bytes.is_empty() {
        let request_body =
            loggable_body(&bytes).unwrap_or_else(|| format!("<{} bytes>", bytes.len()));
        debug!(method = %parts.method, uri = %parts.uri, request_body = %request_body, "Request");
    }

    let request = Request::from_parts(parts, Body::from(bytes));
    let response = next.run(request).await;

    let (parts, body) = response.into_parts();
    let fits = body
        .size_hint()
        .upper()
        .is_some_and(|len| len <= MAX_BUFFERED_BODY as u64);
    if !fits {
        debug!(status = %parts.status, "Response body not logged");
        return Ok(Response::from_parts(parts, body));
    }
    let bytes = to_bytes(body, MAX_BUFFERED_BODY)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if !bytes.is_empty() {
        let response_body =
            loggable_body(&bytes).unwrap_or_else(|| format!("<{} bytes>", bytes.len()));
        debug!(status = %parts.status, response_body = %response_body, "Response");
    }

    Ok(Response::from_parts(parts, Body::from(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_secrets_are_redacted() {
        let body = json!({
            "email": "a@x.com",
            "otp": "123456",
            "nested": { "idToken": "eyJ..." }
        });
        let logged = loggable_body(body.to_string().as_bytes()).unwrap();
        assert!(logged.contains("a@x.com"));
        assert!(!logged.contains("123456"));
        assert!(!logged.contains("eyJ"));
        assert_eq!(logged.matches("[REDACTED]").count(), 2);
    }

    #[tokio::test]
    async fn test_oversized_request_body_is_refused() {
        let small = buffer_body(Body::from("{\"ok\":true}")).await.unwrap();
        assert_eq!(small.len(), 11);

        let large = Body::from(vec![b'a'; MAX_BUFFERED_BODY + 1]);
        assert_eq!(
            buffer_body(large).await.unwrap_err(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[test]
    fn test_non_json_body_is_not_logged_verbatim() {
        assert!(loggable_body(b"otp=123456").is_none());
    }
}
