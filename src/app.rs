// src/app.rs
//! Router composition shared by `main` and the router-level tests.

use axum::{
    extract::Extension,
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

use crate::auth::{self, csrf::CSRF_HEADER, middleware::attach_session};
use crate::common::AppState;
use crate::logging_middleware::log_request_response;
use crate::notes;
use crate::rate_limit_middleware::rate_limit_middleware;

/// GET /health
async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(CSRF_HEADER),
            HeaderName::from_static("x-request-id"),
        ])
        .allow_credentials(true)
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.cors_origins);
    let rate_limit_service = state.rate_limit_service.clone();

    Router::new()
        .route("/health", get(health))
        // ====================================================================
        // AUTHENTICATION ROUTES
        // ====================================================================
        .merge(auth::auth_routes())
        // ====================================================================
        // NOTES ROUTES (session + CSRF)
        // ====================================================================
        .merge(notes::notes_routes())
        // ====================================================================
        // MIDDLEWARE AND LAYERS
        // ====================================================================
        .layer(middleware::from_fn(attach_session))
        .layer(middleware::from_fn(log_request_response))
        .layer(middleware::from_fn(rate_limit_middleware))
        .layer(Extension(rate_limit_service))
        .layer(Extension(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
