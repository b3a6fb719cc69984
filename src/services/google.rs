// src/services/google.rs
//! Google ID token verification.
//!
//! Tokens are checked locally against Google's published signing keys (JWKS)
//! with a fixed expected audience, instead of a round trip to the tokeninfo
//! endpoint per sign-in. Keys are cached for as long as Google's
//! `Cache-Control: max-age` allows.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub const GOOGLE_CERTS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];
const DEFAULT_KEY_TTL_SECONDS: i64 = 3600;

#[derive(Debug, Error)]
pub enum GoogleError {
    #[error("Google OAuth not configured")]
    NotConfigured,

    #[error("Token rejected: {0}")]
    InvalidToken(String),

    #[error("Failed to fetch signing keys: {0}")]
    KeyFetch(String),

    #[error("Token missing claim: {0}")]
    MissingClaim(&'static str),

    #[error("Google account email is not verified")]
    UnverifiedEmail,
}

/// Identity extracted from a verified ID token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleIdentity {
    pub email: String,
    pub name: Option<String>,
    pub subject: String,
}

#[async_trait]
pub trait IdTokenVerifier: Send + Sync {
    async fn verify(&self, id_token: &str) -> Result<GoogleIdentity, GoogleError>;
}

#[derive(Debug, Clone, Deserialize)]
struct Jwk {
    kid: String,
    n: String,
    e: String,
}

#[derive(Debug, Deserialize)]
struct JwkSet {
    keys: Vec<Jwk>,
}

#[derive(Debug, Clone)]
struct CachedKeys {
    keys: Vec<Jwk>,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct GoogleClaims {
    sub: Option<String>,
    email: Option<String>,
    email_verified: Option<bool>,
    name: Option<String>,
}

pub struct GoogleIdTokenVerifier {
    http: Client,
    client_id: Option<String>,
    certs_url: String,
    cache: RwLock<Option<CachedKeys>>,
}

impl GoogleIdTokenVerifier {
    pub fn new(http: Client, client_id: Option<String>) -> Self {
        Self {
            http,
            client_id,
            certs_url: GOOGLE_CERTS_URL.to_string(),
            cache: RwLock::new(None),
        }
    }

    /// Returns the signing key for `kid`, refetching the key set when it is
    /// stale or does not contain the key (Google rotates keys regularly).
    async fn key_for(&self, kid: &str) -> Result<Jwk, GoogleError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.expires_at > Utc::now() {
                    if let Some(key) = cached.keys.iter().find(|k| k.kid == kid) {
                        return Ok(key.clone());
                    }
                }
            }
        }

        let fresh = self.fetch_keys().await?;
        let key = fresh.keys.iter().find(|k| k.kid == kid).cloned();
        *self.cache.write().await = Some(fresh);

        key.ok_or_else(|| GoogleError::InvalidToken(format!("unknown signing key '{}'", kid)))
    }

    async fn fetch_keys(&self) -> Result<CachedKeys, GoogleError> {
        debug!(url = %self.certs_url, "Fetching Google signing keys");

        let resp = self
            .http
            .get(&self.certs_url)
            .send()
            .await
            .map_err(|e| GoogleError::KeyFetch(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(GoogleError::KeyFetch(format!("HTTP {}", resp.status())));
        }

        let ttl = resp
            .headers()
            .get(reqwest::header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_max_age)
            .unwrap_or(DEFAULT_KEY_TTL_SECONDS);

        let set: JwkSet = resp
            .json()
            .await
            .map_err(|e| GoogleError::KeyFetch(e.to_string()))?;

        info!(key_count = set.keys.len(), ttl_seconds = ttl, "Google signing keys refreshed");

        Ok(CachedKeys {
            keys: set.keys,
            expires_at: Utc::now() + Duration::seconds(ttl),
        })
    }
}

#[async_trait]
impl IdTokenVerifier for GoogleIdTokenVerifier {
    async fn verify(&self, id_token: &str) -> Result<GoogleIdentity, GoogleError> {
        let client_id = self.client_id.as_deref().ok_or(GoogleError::NotConfigured)?;

        let header =
            decode_header(id_token).map_err(|e| GoogleError::InvalidToken(e.to_string()))?;
        if header.alg != Algorithm::RS256 {
            return Err(GoogleError::InvalidToken(format!(
                "unexpected algorithm {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| GoogleError::InvalidToken("missing key id".to_string()))?;

        let jwk = self.key_for(&kid).await?;
        let key = DecodingKey::from_rsa_components(&jwk.n, &jwk.e)
            .map_err(|e| GoogleError::KeyFetch(e.to_string()))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[client_id]);
        validation.set_issuer(&GOOGLE_ISSUERS);

        let claims = decode::<GoogleClaims>(id_token, &key, &validation)
            .map_err(|e| {
                warn!(error = %e, "Google ID token validation failed");
                GoogleError::InvalidToken(e.to_string())
            })?
            .claims;

        identity_from_claims(claims)
    }
}

fn identity_from_claims(claims: GoogleClaims) -> Result<GoogleIdentity, GoogleError> {
    let email = claims
        .email
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .ok_or(GoogleError::MissingClaim("email"))?;
    let subject = claims
        .sub
        .filter(|s| !s.is_empty())
        .ok_or(GoogleError::MissingClaim("sub"))?;

    if claims.email_verified == Some(false) {
        return Err(GoogleError::UnverifiedEmail);
    }

    Ok(GoogleIdentity {
        email,
        name: claims.name.filter(|n| !n.trim().is_empty()),
        subject,
    })
}

fn parse_max_age(cache_control: &str) -> Option<i64> {
    cache_control
        .split(',')
        .filter_map(|directive| directive.trim().strip_prefix("max-age="))
        .find_map(|secs| secs.trim().parse::<i64>().ok())
}

/// Test double returning a fixed outcome.
#[cfg(test)]
pub struct StubVerifier {
    pub identity: Option<GoogleIdentity>,
    pub configured: bool,
}

#[cfg(test)]
impl StubVerifier {
    pub fn accepting(email: &str, name: &str, subject: &str) -> Self {
        Self {
            identity: Some(GoogleIdentity {
                email: email.to_string(),
                name: Some(name.to_string()),
                subject: subject.to_string(),
            }),
            configured: true,
        }
    }

    pub fn rejecting() -> Self {
        Self {
            identity: None,
            configured: true,
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            identity: None,
            configured: false,
        }
    }
}

#[cfg(test)]
#[async_trait]
impl IdTokenVerifier for StubVerifier {
    async fn verify(&self, _id_token: &str) -> Result<GoogleIdentity, GoogleError> {
        if !self.configured {
            return Err(GoogleError::NotConfigured);
        }
        self.identity
            .clone()
            .ok_or_else(|| GoogleError::InvalidToken("stub rejects".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_max_age() {
        assert_eq!(
            parse_max_age("public, max-age=19845, must-revalidate, no-transform"),
            Some(19845)
        );
        assert_eq!(parse_max_age("no-cache"), None);
    }

    #[test]
    fn test_identity_requires_email_and_subject() {
        let missing_email = GoogleClaims {
            sub: Some("123".into()),
            email: None,
            email_verified: Some(true),
            name: None,
        };
        assert!(matches!(
            identity_from_claims(missing_email),
            Err(GoogleError::MissingClaim("email"))
        ));

        let ok = GoogleClaims {
            sub: Some("123".into()),
            email: Some(" Someone@Gmail.com ".into()),
            email_verified: Some(true),
            name: Some("Someone".into()),
        };
        let identity = identity_from_claims(ok).unwrap();
        assert_eq!(identity.email, "someone@gmail.com");
        assert_eq!(identity.subject, "123");
    }

    #[test]
    fn test_unverified_email_rejected() {
        let claims = GoogleClaims {
            sub: Some("123".into()),
            email: Some("a@x.com".into()),
            email_verified: Some(false),
            name: None,
        };
        assert!(matches!(
            identity_from_claims(claims),
            Err(GoogleError::UnverifiedEmail)
        ));
    }

    #[tokio::test]
    async fn test_unconfigured_verifier() {
        let verifier = GoogleIdTokenVerifier::new(Client::new(), None);
        assert!(matches!(
            verifier.verify("a.b.c").await,
            Err(GoogleError::NotConfigured)
        ));
    }

    #[tokio::test]
    async fn test_garbage_token_rejected_before_key_fetch() {
        let verifier =
            GoogleIdTokenVerifier::new(Client::new(), Some("client-id".to_string()));
        assert!(matches!(
            verifier.verify("not-a-jwt").await,
            Err(GoogleError::InvalidToken(_))
        ));
    }
}
