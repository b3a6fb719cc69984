//! Authentication routes

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers;

/// Creates and returns the authentication router
///
/// # Routes
/// - `POST /api/auth/request-otp` - Email a one-time code
/// - `POST /api/auth/verify-otp` - Exchange a code for a session
/// - `POST /api/auth/google` - Google ID token sign-in
/// - `POST /api/auth/logout` - Clear session cookies
/// - `GET /api/auth/me` - Current user or null
pub fn auth_routes() -> Router {
    Router::new()
        .route("/api/auth/request-otp", post(handlers::request_otp))
        .route("/api/auth/verify-otp", post(handlers::verify_otp))
        .route("/api/auth/google", post(handlers::google_auth))
        .route("/api/auth/logout", post(handlers::logout_handler))
        .route("/api/auth/me", get(handlers::me_handler))
}
