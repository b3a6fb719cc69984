//! Authentication extractors for Axum

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::{debug, warn};

use super::session::CurrentSession;
use crate::common::{safe_email_log, ApiError};

/// Authenticated user extractor
///
/// Reads the session attached by `attach_session`. Missing cookie is
/// `UNAUTHENTICATED`, a cookie that fails verification is `INVALID_TOKEN`.
/// The token is trusted as-is; no database lookup happens here.
#[derive(Debug, Clone)]
pub struct AuthedUser {
    pub id: String,
    pub email: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<CurrentSession>()
            .ok_or_else(|| ApiError::InternalServer("session middleware not installed".into()))?;

        match session {
            CurrentSession::Anonymous => {
                warn!(path = %parts.uri.path(), "Authentication failed: missing session cookie");
                Err(ApiError::Unauthenticated)
            }
            CurrentSession::Invalid => {
                warn!(path = %parts.uri.path(), "Authentication failed: invalid session token");
                Err(ApiError::InvalidToken)
            }
            CurrentSession::Active { claims, .. } => {
                debug!(
                    user_id = %claims.uid,
                    email = %safe_email_log(&claims.email),
                    "User authentication successful via extractor"
                );
                Ok(AuthedUser {
                    id: claims.uid.clone(),
                    email: claims.email.clone(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::SessionClaims;
    use axum::http::Request;

    fn parts_with(session: Option<CurrentSession>) -> Parts {
        let (mut parts, _) = Request::new(()).into_parts();
        if let Some(session) = session {
            parts.extensions.insert(session);
        }
        parts
    }

    #[tokio::test]
    async fn test_active_session_yields_id_and_email() {
        let claims = SessionClaims {
            uid: "U_ABC123".to_string(),
            email: "a@x.com".to_string(),
            remember: false,
            iat: 0,
            exp: 1800,
        };
        let mut parts = parts_with(Some(CurrentSession::Active {
            claims,
            refreshed: None,
        }));
        let user = AuthedUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(user.id, "U_ABC123");
        assert_eq!(user.email, "a@x.com");
    }

    #[tokio::test]
    async fn test_rejections() {
        let mut parts = parts_with(Some(CurrentSession::Anonymous));
        let err = AuthedUser::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthenticated));

        let mut parts = parts_with(Some(CurrentSession::Invalid));
        let err = AuthedUser::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidToken));

        let mut parts = parts_with(None);
        let err = AuthedUser::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert!(matches!(err, ApiError::InternalServer(_)));
    }
}
