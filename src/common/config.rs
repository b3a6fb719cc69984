//! Process configuration read once at startup.
//!
//! A missing or malformed required value is fatal: `from_env` returns an error
//! and `main` aborts before binding the listener.

use std::env;
use std::str::FromStr;
use thiserror::Error;

const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            "test" => Ok(Environment::Test),
            other => Err(format!("unknown environment '{}'", other)),
        }
    }
}

/// Argon2 cost parameters for OTP hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashCost {
    /// Memory in KiB.
    pub m_cost: u32,
    pub t_cost: u32,
    pub p_cost: u32,
}

impl HashCost {
    /// Rejects costs Argon2 would refuse at hashing time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        argon2::Params::new(self.m_cost, self.t_cost, self.p_cost, None)
            .map(|_| ())
            .map_err(|e| ConfigError::Invalid {
                key: "OTP_HASH_*",
                reason: e.to_string(),
            })
    }
}

impl Default for HashCost {
    fn default() -> Self {
        // Roughly 150-300ms per verification on commodity hardware.
        Self {
            m_cost: 65536,
            t_cost: 3,
            p_cost: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub google_client_id: Option<String>,
    pub cors_origins: Vec<String>,
    pub ses_from_email: Option<String>,
    pub aws_region: Option<String>,
    pub otp_hash: HashCost,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so tests don't have to
    /// touch the process environment.
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let environment = match non_empty("APP_ENV") {
            Some(raw) => raw.parse().map_err(|reason| ConfigError::Invalid {
                key: "APP_ENV",
                reason,
            })?,
            None => Environment::Development,
        };

        let port = match non_empty("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::Invalid {
                key: "PORT",
                reason: e.to_string(),
            })?,
            None => 4000,
        };

        let jwt_secret = non_empty("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::Invalid {
                key: "JWT_SECRET",
                reason: format!("must be at least {} chars", MIN_JWT_SECRET_LEN),
            });
        }

        let database_url =
            non_empty("DATABASE_URL").unwrap_or_else(|| "sqlite://notes.db".to_string());

        let cors_origins = non_empty("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let defaults = HashCost::default();
        let otp_hash = HashCost {
            m_cost: parse_or("OTP_HASH_M_COST", non_empty("OTP_HASH_M_COST"), defaults.m_cost)?,
            t_cost: parse_or("OTP_HASH_T_COST", non_empty("OTP_HASH_T_COST"), defaults.t_cost)?,
            p_cost: parse_or("OTP_HASH_P_COST", non_empty("OTP_HASH_P_COST"), defaults.p_cost)?,
        };
        otp_hash.validate()?;

        Ok(Self {
            environment,
            port,
            database_url,
            jwt_secret,
            google_client_id: non_empty("GOOGLE_CLIENT_ID"),
            cors_origins,
            ses_from_email: non_empty("SES_FROM_EMAIL"),
            aws_region: non_empty("AWS_REGION"),
            otp_hash,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

fn parse_or(key: &'static str, raw: Option<String>, default: u32) -> Result<u32, ConfigError> {
    match raw {
        Some(value) => value.parse::<u32>().map_err(|e| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_with_only_secret() {
        let config = AppConfig::from_lookup(lookup(&[("JWT_SECRET", SECRET)])).unwrap();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.port, 4000);
        assert_eq!(config.database_url, "sqlite://notes.db");
        assert_eq!(config.cors_origins, vec!["http://localhost:5173".to_string()]);
        assert!(config.google_client_id.is_none());
        assert_eq!(config.otp_hash, HashCost::default());
        assert!(!config.is_production());
    }

    #[test]
    fn test_missing_secret_is_fatal() {
        let err = AppConfig::from_lookup(lookup(&[])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("JWT_SECRET"));
    }

    #[test]
    fn test_short_secret_is_rejected() {
        let err = AppConfig::from_lookup(lookup(&[("JWT_SECRET", "short")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "JWT_SECRET", .. }));
    }

    #[test]
    fn test_unusable_hash_cost_is_rejected() {
        let err = AppConfig::from_lookup(lookup(&[
            ("JWT_SECRET", SECRET),
            ("OTP_HASH_M_COST", "1"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "OTP_HASH_*", .. }));

        let err = AppConfig::from_lookup(lookup(&[
            ("JWT_SECRET", SECRET),
            ("OTP_HASH_T_COST", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "OTP_HASH_*", .. }));
    }

    #[test]
    fn test_production_and_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("JWT_SECRET", SECRET),
            ("APP_ENV", "production"),
            ("PORT", "8081"),
            ("GOOGLE_CLIENT_ID", "client.apps.googleusercontent.com"),
            ("CORS_ORIGINS", "https://a.example, https://b.example"),
            ("OTP_HASH_T_COST", "1"),
        ]))
        .unwrap();
        assert!(config.is_production());
        assert_eq!(config.port, 8081);
        assert_eq!(
            config.google_client_id.as_deref(),
            Some("client.apps.googleusercontent.com")
        );
        assert_eq!(config.cors_origins.len(), 2);
        assert_eq!(config.otp_hash.t_cost, 1);
    }

    #[test]
    fn test_invalid_environment() {
        let err =
            AppConfig::from_lookup(lookup(&[("JWT_SECRET", SECRET), ("APP_ENV", "staging")]))
                .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "APP_ENV", .. }));
    }
}
