//! Authentication data models

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

/// How a user proves their identity. Fixed when the user is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Email,
    Google,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Email => "email",
            Provider::Google => "google",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Provider {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "email" => Ok(Provider::Email),
            "google" => Ok(Provider::Google),
            _ => Err(UnknownVariant {
                kind: "provider",
                value,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OtpPurpose {
    Signup,
    Login,
}

impl OtpPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpPurpose::Signup => "signup",
            OtpPurpose::Login => "login",
        }
    }
}

impl fmt::Display for OtpPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for OtpPurpose {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "signup" => Ok(OtpPurpose::Signup),
            "login" => Ok(OtpPurpose::Login),
            _ => Err(UnknownVariant {
                kind: "purpose",
                value,
            }),
        }
    }
}

/// User database model
#[derive(FromRow, Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub dob: Option<String>,
    #[sqlx(try_from = "String")]
    pub provider: Provider,
    pub provider_id: Option<String>,
    /// Unix milliseconds
    pub created_at: i64,
}

/// Fields needed to create a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub dob: Option<String>,
    pub provider: Provider,
    pub provider_id: Option<String>,
}

/// The user as exposed to clients.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PublicUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub provider: Provider,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            provider: user.provider,
        }
    }
}

/// One-time code record. Only the hash of the code is ever stored.
#[derive(FromRow, Debug, Clone)]
pub struct OneTimeCode {
    pub id: String,
    pub email: String,
    pub code_hash: String,
    #[sqlx(try_from = "String")]
    pub purpose: OtpPurpose,
    /// Unix milliseconds
    pub expires_at: i64,
    pub attempts: i64,
    pub used: bool,
    pub ip: Option<String>,
    /// Unix milliseconds
    pub created_at: i64,
}

// ---- Request payloads ----

#[derive(Debug, Clone, Deserialize)]
pub struct RequestOtpPayload {
    pub purpose: OtpPurpose,
    pub name: Option<String>,
    pub dob: Option<String>,
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyOtpPayload {
    pub purpose: OtpPurpose,
    pub name: Option<String>,
    pub dob: Option<String>,
    pub email: String,
    pub otp: String,
    pub remember: Option<bool>,
}

/// Google ID token payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GooglePayload {
    pub id_token: String,
    pub remember: Option<bool>,
}

/// Trims and lower-cases an email address before any lookup or insert.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Fallback display name: the local part of the address.
pub fn default_name(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_string()
}
