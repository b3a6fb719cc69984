use super::handlers;
use crate::auth::csrf::require_csrf;
use crate::auth::middleware::require_auth;
use axum::{
    middleware,
    routing::{delete, get},
    Router,
};

/// Creates the notes router. Every route requires a session, checked before
/// the CSRF token on unsafe methods.
pub fn notes_routes() -> Router {
    Router::new()
        .route(
            "/api/notes",
            get(handlers::list_notes).post(handlers::create_note),
        )
        .route("/api/notes/:id", delete(handlers::delete_note))
        .route_layer(middleware::from_fn(require_csrf))
        .route_layer(middleware::from_fn(require_auth))
}
