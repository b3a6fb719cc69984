// src/main.rs
use dotenv::dotenv;
use reqwest::Client;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::PathBuf;
use std::time::Duration;
use std::{net::SocketAddr, str::FromStr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

// ============================================================================
// MODULE IMPORTS
// ============================================================================

mod app;
mod auth;
mod common;
mod logging_middleware;
mod notes;
mod rate_limit_middleware;
mod services;

// ============================================================================
// COMMON IMPORTS
// ============================================================================

use common::clock::SystemClock;
use common::config::AppConfig;
use common::AppState;
use services::{
    GoogleIdTokenVerifier, LogMailer, Mailer, RateLimitConfig, RateLimitService, SesMailer,
};

// ============================================================================
// MAIN APPLICATION ENTRY POINT
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // ========================================================================
    // ENVIRONMENT CONFIGURATION
    // ========================================================================

    let config = AppConfig::from_env().map_err(|e| {
        error!(error = %e, "Invalid configuration, refusing to start");
        e
    })?;
    info!(
        environment = ?config.environment,
        port = config.port,
        google_configured = config.google_client_id.is_some(),
        cors_origins = ?config.cors_origins,
        "Configuration loaded"
    );

    // ========================================================================
    // DATABASE SETUP
    // ========================================================================

    if let Some(path_part) = config.database_url.strip_prefix("sqlite://") {
        let path_without_params = path_part.split('?').next().unwrap_or("");
        if !path_without_params.is_empty() && !path_without_params.starts_with(':') {
            let db_path = PathBuf::from(path_without_params);
            if let Some(parent) = db_path.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
        }
    }

    let connect_options =
        SqliteConnectOptions::from_str(&config.database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .connect_with(connect_options)
        .await?;

    common::migrations::run_migrations(&pool).await?;

    // ========================================================================
    // SERVICE INITIALIZATION
    // ========================================================================

    let http_client = Client::builder().timeout(Duration::from_secs(10)).build()?;

    let mailer: Arc<dyn Mailer> = match config.ses_from_email.as_deref() {
        Some(from) => {
            info!("SES mailer initialized");
            Arc::new(SesMailer::new(config.aws_region.clone(), from).await)
        }
        None => {
            warn!("SES_FROM_EMAIL not set, OTP emails will only be logged");
            Arc::new(LogMailer)
        }
    };

    let google = Arc::new(GoogleIdTokenVerifier::new(
        http_client,
        config.google_client_id.clone(),
    ));
    info!("Google ID token verifier initialized");

    let rate_limit_service = Arc::new(RateLimitService::new(RateLimitConfig::from_env()));
    {
        let service = rate_limit_service.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(service.config().window());
            loop {
                interval.tick().await;
                service.cleanup_expired().await;
            }
        });
    }
    info!("RateLimitService cleanup task started");

    // ========================================================================
    // APPLICATION STATE
    // ========================================================================

    let port = config.port;
    let app_state = AppState::new(
        pool,
        config,
        Arc::new(SystemClock),
        mailer,
        google,
        rate_limit_service,
    );

    let app = app::build_router(Arc::new(app_state));

    // ========================================================================
    // SERVER STARTUP
    // ========================================================================

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
