//! Auth gateway: the five externally visible auth operations.
//!
//! Handlers stay thin; everything that decides who is signed in, and which
//! cookies go back to the browser, lives here.

use axum::http::HeaderValue;
use std::sync::Arc;
use tracing::{info, warn};

use super::csrf;
use super::models::{default_name, NewUser, Provider, PublicUser, User};
use super::otp::{OtpIssuer, OtpRequest, OtpVerification};
use super::session::{CurrentSession, SessionIssuer};
use super::store::CredentialStore;
use crate::common::clock::Clock;
use crate::common::{safe_email_log, ApiError};
use crate::services::google::{GoogleError, IdTokenVerifier};

/// Result of a successful sign-in.
#[derive(Debug, Clone)]
pub struct SignIn {
    pub user: PublicUser,
    #[cfg(test)]
    pub session_token: String,
    /// `Set-Cookie` values, session first.
    pub cookies: Vec<HeaderValue>,
}

#[derive(Clone)]
pub struct AuthGateway {
    store: CredentialStore,
    otp: OtpIssuer,
    sessions: SessionIssuer,
    google: Arc<dyn IdTokenVerifier>,
    clock: Arc<dyn Clock>,
}

impl AuthGateway {
    pub fn new(
        store: CredentialStore,
        otp: OtpIssuer,
        sessions: SessionIssuer,
        google: Arc<dyn IdTokenVerifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            otp,
            sessions,
            google,
            clock,
        }
    }

    pub async fn request_otp(&self, request: OtpRequest) -> Result<(), ApiError> {
        self.otp.request(&request).await
    }

    pub async fn verify_otp(
        &self,
        verification: OtpVerification,
        remember: bool,
    ) -> Result<SignIn, ApiError> {
        let user = self.otp.verify(&verification).await?;
        self.sign_in(&user, remember)
    }

    /// Signs in (or signs up) with a Google ID token. Accounts created through
    /// email OTP cannot be entered this way.
    pub async fn google(&self, id_token: &str, remember: bool) -> Result<SignIn, ApiError> {
        let identity = self.google.verify(id_token).await.map_err(|e| match e {
            GoogleError::NotConfigured => {
                ApiError::ConfigMissing("Google client ID not configured".to_string())
            }
            other => {
                warn!(error = %other, "Google sign-in rejected");
                ApiError::GoogleInvalid(other.to_string())
            }
        })?;

        let user = match self.store.find_user_by_email(&identity.email).await? {
            Some(existing) if existing.provider != Provider::Google => {
                warn!(
                    email = %safe_email_log(&identity.email),
                    "Google sign-in attempted for an email OTP account"
                );
                return Err(ApiError::ProviderMismatch(
                    "This email is registered with OTP. Please sign in using email OTP."
                        .to_string(),
                ));
            }
            Some(existing) => existing,
            None => {
                let new_user = NewUser {
                    name: identity
                        .name
                        .clone()
                        .unwrap_or_else(|| default_name(&identity.email)),
                    email: identity.email.clone(),
                    dob: None,
                    provider: Provider::Google,
                    provider_id: Some(identity.subject.clone()),
                };
                let created = self
                    .store
                    .create_user_if_absent(&new_user, self.clock.now().timestamp_millis())
                    .await?;
                if created.provider != Provider::Google {
                    return Err(ApiError::ProviderMismatch(
                        "This email is registered with OTP. Please sign in using email OTP."
                            .to_string(),
                    ));
                }
                info!(user_id = %created.id, "Google user created");
                created
            }
        };

        self.sign_in(&user, remember)
    }

    /// Cookies that clear both the session and the CSRF token.
    pub fn logout(&self) -> Result<Vec<HeaderValue>, ApiError> {
        let policy = self.sessions.cookie_policy();
        Ok(vec![
            self.sessions.clear_session_cookie()?,
            csrf::clear_csrf_cookie(&policy)?,
        ])
    }

    /// The signed-in user, or `None` for anonymous, invalid or orphaned
    /// sessions.
    pub async fn me(&self, session: &CurrentSession) -> Result<Option<PublicUser>, ApiError> {
        let Some(claims) = session.claims() else {
            return Ok(None);
        };
        let user = self.store.find_user_by_id(&claims.uid).await?;
        Ok(user.as_ref().map(PublicUser::from))
    }

    fn sign_in(&self, user: &User, remember: bool) -> Result<SignIn, ApiError> {
        let session = self.sessions.issue(&user.id, &user.email, remember)?;
        let csrf_token = csrf::issue_token();
        let policy = self.sessions.cookie_policy();

        let cookies = vec![
            self.sessions.session_cookie(&session.token, remember)?,
            csrf::csrf_cookie(&csrf_token, &policy)?,
        ];

        info!(user_id = %user.id, provider = %user.provider, remember, "User signed in");

        Ok(SignIn {
            user: PublicUser::from(user),
            #[cfg(test)]
            session_token: session.token,
            cookies,
        })
    }
}
