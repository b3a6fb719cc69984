//! Session tokens (HS256 JWT in an HttpOnly cookie) with sliding refresh.

use axum::http::HeaderValue;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

use crate::common::clock::Clock;
use crate::common::helpers::safe_token_log;
use crate::common::ApiError;

pub const SESSION_COOKIE: &str = "token";
pub const SHORT_SESSION_TTL_SECONDS: i64 = 30 * 60;
pub const REMEMBER_SESSION_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
pub const REFRESH_THRESHOLD_SECONDS: i64 = 10 * 60;

/// JWT claims carried by the session cookie.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    pub uid: String,
    pub email: String,
    pub remember: bool,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub claims: SessionClaims,
}

/// Per-request view of the session cookie, attached by middleware.
#[derive(Debug, Clone)]
pub enum CurrentSession {
    Anonymous,
    Invalid,
    Active {
        claims: SessionClaims,
        refreshed: Option<IssuedSession>,
    },
}

impl CurrentSession {
    pub fn claims(&self) -> Option<&SessionClaims> {
        match self {
            CurrentSession::Active { claims, .. } => Some(claims),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Lax,
    None,
}

/// Attributes shared by every cookie the API sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookiePolicy {
    pub secure: bool,
    pub same_site: SameSite,
}

impl CookiePolicy {
    /// Production is served cross-site behind TLS.
    pub fn for_production(production: bool) -> Self {
        if production {
            Self {
                secure: true,
                same_site: SameSite::None,
            }
        } else {
            Self {
                secure: false,
                same_site: SameSite::Lax,
            }
        }
    }

    pub fn attributes(&self) -> String {
        let same_site = match self.same_site {
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        };
        if self.secure {
            format!("Path=/; SameSite={}; Secure", same_site)
        } else {
            format!("Path=/; SameSite={}", same_site)
        }
    }

    pub fn build(&self, cookie: String) -> Result<HeaderValue, ApiError> {
        HeaderValue::from_str(&cookie)
            .map_err(|e| ApiError::InternalServer(format!("invalid cookie header: {}", e)))
    }
}

#[derive(Clone)]
pub struct SessionIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    clock: Arc<dyn Clock>,
    cookies: CookiePolicy,
}

impl SessionIssuer {
    pub fn new(secret: &str, clock: Arc<dyn Clock>, cookies: CookiePolicy) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            clock,
            cookies,
        }
    }

    pub fn cookie_policy(&self) -> CookiePolicy {
        self.cookies
    }

    /// Remembered sessions last 7 days, others 30 minutes.
    pub fn issue(&self, uid: &str, email: &str, remember: bool) -> Result<IssuedSession, ApiError> {
        let now = self.clock.now().timestamp();
        let ttl = if remember {
            REMEMBER_SESSION_TTL_SECONDS
        } else {
            SHORT_SESSION_TTL_SECONDS
        };
        let claims = SessionClaims {
            uid: uid.to_string(),
            email: email.to_string(),
            remember,
            iat: now,
            exp: now + ttl,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(|e| {
            error!(error = %e, "Failed to sign session token");
            ApiError::InternalServer("failed to sign session token".to_string())
        })?;

        Ok(IssuedSession { token, claims })
    }

    /// Returns the claims when the signature checks out and the token has not
    /// expired against this issuer's clock.
    pub fn verify(&self, token: &str) -> Option<SessionClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;

        let claims = match decode::<SessionClaims>(token, &self.decoding, &validation) {
            Ok(data) => data.claims,
            Err(e) => {
                debug!(token = %safe_token_log(token), error = %e, "Session token rejected");
                return None;
            }
        };

        if self.clock.now().timestamp() < claims.exp {
            Some(claims)
        } else {
            debug!(uid = %claims.uid, "Session token expired");
            None
        }
    }

    /// Short sessions inside their last ten minutes get a fresh 30-minute token.
    pub fn refresh_if_needed(&self, claims: &SessionClaims) -> Result<Option<IssuedSession>, ApiError> {
        if claims.remember {
            return Ok(None);
        }
        let remaining = claims.exp - self.clock.now().timestamp();
        if remaining > 0 && remaining < REFRESH_THRESHOLD_SECONDS {
            debug!(uid = %claims.uid, remaining, "Refreshing session token");
            return self.issue(&claims.uid, &claims.email, false).map(Some);
        }
        Ok(None)
    }

    /// Resolves the session cookie value for one request.
    pub fn attach(&self, token: Option<&str>) -> CurrentSession {
        let Some(token) = token else {
            return CurrentSession::Anonymous;
        };
        let Some(claims) = self.verify(token) else {
            return CurrentSession::Invalid;
        };
        let refreshed = match self.refresh_if_needed(&claims) {
            Ok(refreshed) => refreshed,
            Err(e) => {
                error!(error = %e, "Session refresh failed, keeping current token");
                None
            }
        };
        CurrentSession::Active { claims, refreshed }
    }

    /// `token` cookie. Remembered sessions persist for 7 days, others end
    /// with the browser session.
    pub fn session_cookie(&self, token: &str, remember: bool) -> Result<HeaderValue, ApiError> {
        let mut cookie = format!(
            "{}={}; HttpOnly; {}",
            SESSION_COOKIE,
            token,
            self.cookies.attributes()
        );
        if remember {
            cookie.push_str(&format!("; Max-Age={}", REMEMBER_SESSION_TTL_SECONDS));
        }
        self.cookies.build(cookie)
    }

    pub fn clear_session_cookie(&self) -> Result<HeaderValue, ApiError> {
        self.cookies.build(format!(
            "{}=; HttpOnly; {}; Max-Age=0",
            SESSION_COOKIE,
            self.cookies.attributes()
        ))
    }
}
