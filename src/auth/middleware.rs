//! Attaches the session to every request and slides short sessions forward.

use axum::{
    extract::{Extension, Request},
    http::header::SET_COOKIE,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::error;

use super::extractors::AuthedUser;
use super::session::{CurrentSession, SESSION_COOKIE};
use crate::common::helpers::read_cookie;
use crate::common::AppState;

pub async fn attach_session(
    Extension(state): Extension<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = read_cookie(request.headers(), SESSION_COOKIE);
    let session = state.sessions.attach(token.as_deref());

    let refreshed = match &session {
        CurrentSession::Active {
            refreshed: Some(issued),
            ..
        } => match state.sessions.session_cookie(&issued.token, false) {
            Ok(cookie) => Some(cookie),
            Err(e) => {
                error!(error = %e, "Failed to build refreshed session cookie");
                None
            }
        },
        _ => None,
    };

    request.extensions_mut().insert(session);
    let mut response = next.run(request).await;

    // A handler that already set or cleared the session cookie wins.
    if let Some(cookie) = refreshed {
        let prefix = format!("{}=", SESSION_COOKIE);
        let handler_set_session = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(|v| v.starts_with(&prefix));
        if !handler_set_session {
            response.headers_mut().append(SET_COOKIE, cookie);
        }
    }

    response
}

/// Rejects requests without a valid session before any later layer runs.
pub async fn require_auth(_user: AuthedUser, request: Request, next: Next) -> Response {
    next.run(request).await
}
