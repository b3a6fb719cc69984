// Application state shared across all modules

use sqlx::SqlitePool;
use std::sync::Arc;

use super::clock::Clock;
use super::config::AppConfig;
use crate::auth::gateway::AuthGateway;
use crate::auth::otp::{OtpIssuer, OtpPolicy};
use crate::auth::session::{CookiePolicy, SessionIssuer};
use crate::auth::store::CredentialStore;
use crate::services::{IdTokenVerifier, Mailer, RateLimitService};

/// Application state containing database pool, services, and configuration
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<AppConfig>,
    pub clock: Arc<dyn Clock>,
    pub sessions: SessionIssuer,
    pub gateway: Arc<AuthGateway>,
    pub rate_limit_service: Arc<RateLimitService>,
}

impl AppState {
    /// Wires the auth components together. `main` and the tests share this so
    /// they run the same graph with different transports and clocks.
    pub fn new(
        db: SqlitePool,
        config: AppConfig,
        clock: Arc<dyn Clock>,
        mailer: Arc<dyn Mailer>,
        google: Arc<dyn IdTokenVerifier>,
        rate_limit_service: Arc<RateLimitService>,
    ) -> Self {
        let store = CredentialStore::new(db.clone());
        let sessions = SessionIssuer::new(
            &config.jwt_secret,
            clock.clone(),
            CookiePolicy::for_production(config.is_production()),
        );
        let otp = OtpIssuer::new(
            store.clone(),
            mailer,
            clock.clone(),
            OtpPolicy::with_hash_cost(config.otp_hash),
        );
        let gateway = AuthGateway::new(store, otp, sessions.clone(), google, clock.clone());

        Self {
            db,
            config: Arc::new(config),
            clock,
            sessions,
            gateway: Arc::new(gateway),
            rate_limit_service,
        }
    }
}
