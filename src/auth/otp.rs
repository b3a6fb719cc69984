//! One-time code issuing and verification.
//!
//! Codes are six digits, hashed with Argon2id before they touch the database,
//! and only the newest code for an (email, purpose) pair can ever succeed.
//! Abuse controls:
//! - a 60s cooldown per email (any purpose) and per requesting IP
//! - at most 5 codes per email in a 10 minute window
//! - at most 5 wrong guesses per code

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use chrono::Duration;
use rand::Rng;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use super::models::{default_name, NewUser, OneTimeCode, OtpPurpose, Provider, User};
use super::store::CredentialStore;
use crate::common::clock::Clock;
use crate::common::config::HashCost;
use crate::common::{generate_otp_id, safe_email_log, ApiError};
use crate::services::email::{otp_email, Mailer};

#[derive(Debug, Clone)]
pub struct OtpPolicy {
    pub code_ttl: Duration,
    pub cooldown: Duration,
    pub window: Duration,
    pub max_per_window: i64,
    pub max_attempts: i64,
    pub hash_cost: HashCost,
}

impl Default for OtpPolicy {
    fn default() -> Self {
        Self {
            code_ttl: Duration::minutes(10),
            cooldown: Duration::seconds(60),
            window: Duration::minutes(10),
            max_per_window: 5,
            max_attempts: 5,
            hash_cost: HashCost::default(),
        }
    }
}

impl OtpPolicy {
    pub fn with_hash_cost(hash_cost: HashCost) -> Self {
        Self {
            hash_cost,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct OtpRequest {
    pub purpose: OtpPurpose,
    pub email: String,
    pub ip: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OtpVerification {
    pub purpose: OtpPurpose,
    pub email: String,
    pub otp: String,
    pub name: Option<String>,
    pub dob: Option<String>,
}

#[derive(Debug, Error)]
pub enum OtpHashError {
    #[error("argon2: {0}")]
    Argon2(String),

    #[error("hashing task failed: {0}")]
    Join(String),
}

impl From<OtpHashError> for ApiError {
    fn from(e: OtpHashError) -> Self {
        ApiError::InternalServer(e.to_string())
    }
}

#[derive(Clone)]
pub struct OtpIssuer {
    store: CredentialStore,
    mailer: Arc<dyn Mailer>,
    clock: Arc<dyn Clock>,
    policy: OtpPolicy,
}

impl OtpIssuer {
    pub fn new(
        store: CredentialStore,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
        policy: OtpPolicy,
    ) -> Self {
        Self {
            store,
            mailer,
            clock,
            policy,
        }
    }

    /// Issues a code and mails it. The record is persisted before the send,
    /// so a failed send still counts against the cooldown.
    pub async fn request(&self, request: &OtpRequest) -> Result<(), ApiError> {
        let email = request.email.as_str();
        let existing = self.store.find_user_by_email(email).await?;

        match (request.purpose, existing.as_ref()) {
            (OtpPurpose::Signup, Some(user)) => {
                return Err(ApiError::EmailTaken(email_taken_message(user.provider)));
            }
            (OtpPurpose::Login, None) => {
                return Err(ApiError::NotFound(
                    "No account found. Please sign up.".to_string(),
                ));
            }
            (OtpPurpose::Login, Some(user)) if user.provider == Provider::Google => {
                return Err(ApiError::ProviderMismatch(
                    "This email is registered with Google. Please sign in with Google."
                        .to_string(),
                ));
            }
            _ => {}
        }

        let now = self.clock.now().timestamp_millis();

        let cooldown_since = now - self.policy.cooldown.num_milliseconds();
        let recent_for_email = self.store.count_otps_for_email_since(email, cooldown_since).await?;
        let recent_for_ip = match request.ip.as_deref() {
            Some(ip) => self.store.count_otps_for_ip_since(ip, cooldown_since).await?,
            None => 0,
        };
        if recent_for_email > 0 || recent_for_ip > 0 {
            let last = self.store.latest_otp_for_email(email).await?;
            let wait_seconds = cooldown_remaining(
                self.policy.cooldown.num_seconds(),
                now,
                last.as_ref().map(|record| record.created_at),
            );
            warn!(
                email = %safe_email_log(email),
                ip = ?request.ip,
                wait_seconds,
                "OTP requested during cooldown"
            );
            return Err(ApiError::OtpCooldown { wait_seconds });
        }

        let window_since = now - self.policy.window.num_milliseconds();
        let in_window = self.store.count_otps_for_email_since(email, window_since).await?;
        if in_window >= self.policy.max_per_window {
            warn!(email = %safe_email_log(email), in_window, "OTP request limit reached");
            return Err(ApiError::OtpRateLimit(
                "Too many OTP requests. Please try again later.".to_string(),
            ));
        }

        let code = generate_code();
        let code_hash = hash_code(code.clone(), self.policy.hash_cost).await?;

        let record = OneTimeCode {
            id: generate_otp_id(),
            email: email.to_string(),
            code_hash,
            purpose: request.purpose,
            expires_at: now + self.policy.code_ttl.num_milliseconds(),
            attempts: 0,
            used: false,
            ip: request.ip.clone(),
            created_at: now,
        };
        self.store.insert_otp(&record).await?;

        let message = otp_email(email, &code, self.policy.code_ttl.num_minutes());
        self.mailer.send(message).await.map_err(|e| {
            ApiError::InternalServer(format!("failed to send OTP email: {}", e))
        })?;

        info!(
            email = %safe_email_log(email),
            purpose = %request.purpose,
            otp_id = %record.id,
            "OTP issued"
        );
        Ok(())
    }

    /// Checks a submitted code against the newest record for the pair and
    /// returns the signed-in user. Signup creates the user on success.
    pub async fn verify(&self, verification: &OtpVerification) -> Result<User, ApiError> {
        let email = verification.email.as_str();
        let record = self
            .store
            .latest_otp(email, verification.purpose)
            .await?
            .ok_or(ApiError::OtpMissing)?;

        if record.used {
            return Err(ApiError::OtpUsed);
        }

        let now = self.clock.now();
        if now.timestamp_millis() >= record.expires_at {
            return Err(ApiError::OtpExpired);
        }

        if record.attempts >= self.policy.max_attempts {
            return Err(ApiError::OtpRateLimit(
                "Too many attempts, request a new OTP.".to_string(),
            ));
        }

        if !verify_code(verification.otp.clone(), record.code_hash.clone()).await? {
            self.store.increment_otp_attempts(&record.id).await?;
            warn!(
                email = %safe_email_log(email),
                attempts = record.attempts + 1,
                "Incorrect OTP submitted"
            );
            return Err(ApiError::OtpInvalid);
        }

        if !self.store.mark_otp_used(&record.id).await? {
            return Err(ApiError::OtpUsed);
        }

        let user = match verification.purpose {
            OtpPurpose::Signup => {
                let new_user = NewUser {
                    email: email.to_string(),
                    name: verification
                        .name
                        .clone()
                        .unwrap_or_else(|| default_name(email)),
                    dob: verification.dob.clone(),
                    provider: Provider::Email,
                    provider_id: None,
                };
                self.store
                    .create_user_if_absent(&new_user, now.timestamp_millis())
                    .await?
            }
            OtpPurpose::Login => self
                .store
                .find_user_by_email(email)
                .await?
                .ok_or_else(|| ApiError::NotFound("Account not found.".to_string()))?,
        };

        if user.provider != Provider::Email {
            return Err(ApiError::ProviderMismatch(
                "This email is registered with Google. Please sign in with Google.".to_string(),
            ));
        }

        info!(user_id = %user.id, purpose = %verification.purpose, "OTP verified");
        Ok(user)
    }
}

/// Whole seconds left, within `0..=cooldown` even when `last_created_at` is
/// ahead of `now`.
fn cooldown_remaining(cooldown: i64, now: i64, last_created_at: Option<i64>) -> i64 {
    match last_created_at {
        Some(created_at) => {
            let elapsed = (now - created_at).div_euclid(1000);
            (cooldown - elapsed).clamp(0, cooldown)
        }
        None => cooldown,
    }
}

pub fn email_taken_message(provider: Provider) -> String {
    match provider {
        Provider::Google => {
            "Email already registered with Google. Please sign in with Google.".to_string()
        }
        Provider::Email => "Email already registered. Please sign in.".to_string(),
    }
}

/// Uniform over 100000..=999999.
fn generate_code() -> String {
    OsRng.gen_range(100_000..=999_999).to_string()
}

fn hasher(cost: HashCost) -> Result<Argon2<'static>, OtpHashError> {
    let params = Params::new(cost.m_cost, cost.t_cost, cost.p_cost, None)
        .map_err(|e| OtpHashError::Argon2(e.to_string()))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

async fn hash_code(code: String, cost: HashCost) -> Result<String, OtpHashError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        hasher(cost)?
            .hash_password(code.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| OtpHashError::Argon2(e.to_string()))
    })
    .await
    .map_err(|e| OtpHashError::Join(e.to_string()))?
}

/// Parameters are read back from the PHC string, so codes hashed under an
/// older cost still verify.
async fn verify_code(code: String, phc: String) -> Result<bool, OtpHashError> {
    tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&phc).map_err(|e| OtpHashError::Argon2(e.to_string()))?;
        match Argon2::default().verify_password(code.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(OtpHashError::Argon2(e.to_string())),
        }
    })
    .await
    .map_err(|e| OtpHashError::Join(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAST: HashCost = HashCost {
        m_cost: 8,
        t_cost: 1,
        p_cost: 1,
    };

    #[test]
    fn test_generated_codes_are_six_digits() {
        for _ in 0..200 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            let value: u32 = code.parse().unwrap();
            assert!((100_000..=999_999).contains(&value));
        }
    }

    #[tokio::test]
    async fn test_hash_is_salted_and_verifies() {
        let first = hash_code("123456".into(), FAST).await.unwrap();
        let second = hash_code("123456".into(), FAST).await.unwrap();
        assert_ne!(first, second);
        assert!(!first.contains("123456"));
        assert!(first.starts_with("$argon2id$"));

        assert!(verify_code("123456".into(), first.clone()).await.unwrap());
        assert!(!verify_code("654321".into(), first).await.unwrap());
    }

    #[tokio::test]
    async fn test_malformed_hash_is_an_error() {
        assert!(verify_code("123456".into(), "not-a-phc".into()).await.is_err());
    }

    #[test]
    fn test_cooldown_remaining_stays_in_range() {
        assert_eq!(cooldown_remaining(60, 1_000_000, Some(999_000)), 59);
        assert_eq!(cooldown_remaining(60, 1_000_000, Some(999_001)), 60);
        assert_eq!(cooldown_remaining(60, 1_000_000, Some(900_000)), 0);
        assert_eq!(cooldown_remaining(60, 1_000_000, None), 60);
        // Record written by a writer whose clock runs ahead.
        assert_eq!(cooldown_remaining(60, 1_000_000, Some(1_120_000)), 60);
    }

    #[test]
    fn test_email_taken_message_depends_on_provider() {
        assert!(email_taken_message(Provider::Google).contains("Google"));
        assert_eq!(
            email_taken_message(Provider::Email),
            "Email already registered. Please sign in."
        );
    }
}
