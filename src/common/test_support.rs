//! Fixtures shared by the module tests.

use chrono::{TimeZone, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::Arc;

use super::clock::ManualClock;
use super::config::{AppConfig, Environment, HashCost};
use super::migrations::create_schema;
use super::AppState;
use crate::services::email::CapturingMailer;
use crate::services::google::StubVerifier;
use crate::services::rate_limit::{RateLimitConfig, RateLimitService};

pub const TEST_JWT_SECRET: &str = "test-secret-that-is-at-least-32-characters";

/// Cheap enough to keep the suite fast.
pub const FAST_HASH: HashCost = HashCost {
    m_cost: 8,
    t_cost: 1,
    p_cost: 1,
};

/// Single-connection in-memory database with the schema applied.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    create_schema(&pool).await.expect("schema");
    pool
}

pub fn test_config() -> AppConfig {
    AppConfig {
        environment: Environment::Test,
        port: 0,
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: TEST_JWT_SECRET.to_string(),
        google_client_id: Some("test-client-id".to_string()),
        cors_origins: vec!["http://localhost:5173".to_string()],
        ses_from_email: None,
        aws_region: None,
        otp_hash: FAST_HASH,
    }
}

pub struct TestApp {
    pub state: Arc<AppState>,
    pub clock: Arc<ManualClock>,
    pub mailer: Arc<CapturingMailer>,
}

pub async fn test_app(google: StubVerifier) -> TestApp {
    test_app_with(google, RateLimitConfig::default()).await
}

pub async fn test_app_with(google: StubVerifier, rate_limit: RateLimitConfig) -> TestApp {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
    ));
    let mailer = Arc::new(CapturingMailer::default());
    let state = AppState::new(
        test_pool().await,
        test_config(),
        clock.clone(),
        mailer.clone(),
        Arc::new(google),
        Arc::new(RateLimitService::new(rate_limit)),
    );
    TestApp {
        state: Arc::new(state),
        clock,
        mailer,
    }
}

/// Drives one request through the router and decodes the JSON body.
pub async fn send(
    app: &axum::Router,
    request: axum::http::Request<axum::body::Body>,
) -> (axum::http::StatusCode, axum::http::HeaderMap, serde_json::Value) {
    use tower::ServiceExt;

    let response = app.clone().oneshot(request).await.expect("router is infallible");
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, headers, json)
}

pub fn json_request(
    method: &str,
    uri: &str,
    body: serde_json::Value,
    cookie: Option<&str>,
    csrf: Option<&str>,
) -> axum::http::Request<axum::body::Body> {
    let mut builder = axum::http::Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    if let Some(csrf) = csrf {
        builder = builder.header("x-csrf-token", csrf);
    }
    builder
        .body(axum::body::Body::from(body.to_string()))
        .expect("request")
}

pub fn get_request(uri: &str, cookie: Option<&str>) -> axum::http::Request<axum::body::Body> {
    let mut builder = axum::http::Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    builder.body(axum::body::Body::empty()).expect("request")
}

/// All `Set-Cookie` values on a response.
pub fn set_cookies(headers: &axum::http::HeaderMap) -> Vec<String> {
    headers
        .get_all(axum::http::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok().map(str::to_string))
        .collect()
}

/// Value of the named cookie as set by the response.
pub fn cookie_value(headers: &axum::http::HeaderMap, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    set_cookies(headers).into_iter().find_map(|cookie| {
        cookie
            .strip_prefix(&prefix)
            .map(|rest| rest.split(';').next().unwrap_or("").to_string())
    })
}

/// Inserts an email-provider user and returns its id.
pub async fn insert_user(pool: &SqlitePool, email: &str) -> String {
    use crate::auth::models::{NewUser, Provider};
    use crate::auth::store::CredentialStore;

    CredentialStore::new(pool.clone())
        .create_user_if_absent(
            &NewUser {
                email: email.to_string(),
                name: "Test User".to_string(),
                dob: None,
                provider: Provider::Email,
                provider_id: None,
            },
            0,
        )
        .await
        .expect("insert user")
        .id
}
