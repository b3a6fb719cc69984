// src/services/rate_limit.rs
//! Global per-IP request limiter (fixed window, in memory).
//!
//! This sits in front of every route. The OTP-specific cooldown and
//! per-email limits live in `auth::otp` and are backed by the database.

use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub per_ip_limit: u32,
    pub window_seconds: u32,
    pub whitelist_ips: Vec<String>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            per_ip_limit: 100, // 100 requests per window per IP
            window_seconds: 60,
            whitelist_ips: Vec::new(),
        }
    }
}

impl RateLimitConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // RATE_LIMIT_ENABLED - set to "false" to disable rate limiting
        if let Ok(enabled) = env::var("RATE_LIMIT_ENABLED") {
            config.enabled = enabled.to_lowercase() != "false";
        }

        // RATE_LIMIT_PER_IP - requests per window per IP address
        if let Ok(limit) = env::var("RATE_LIMIT_PER_IP") {
            if let Ok(val) = limit.parse::<u32>() {
                config.per_ip_limit = val;
            }
        }

        // RATE_LIMIT_WINDOW_SECONDS - time window in seconds
        if let Ok(window) = env::var("RATE_LIMIT_WINDOW_SECONDS") {
            if let Ok(val) = window.parse::<u32>() {
                config.window_seconds = val.max(1);
            }
        }

        // RATE_LIMIT_WHITELIST_IPS - comma-separated list of whitelisted IPs
        if let Ok(whitelist) = env::var("RATE_LIMIT_WHITELIST_IPS") {
            config.whitelist_ips = whitelist
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        config
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds as u64)
    }
}

#[derive(Debug, Clone)]
struct RateLimitState {
    count: u32,
    window_start: Instant,
}

impl RateLimitState {
    fn new() -> Self {
        Self {
            count: 0,
            window_start: Instant::now(),
        }
    }

    fn reset(&mut self) {
        self.count = 0;
        self.window_start = Instant::now();
    }

    fn is_expired(&self, window_duration: Duration) -> bool {
        self.window_start.elapsed() >= window_duration
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum RateLimitResult {
    Allowed,
    Limited { retry_after: u32 },
}

#[derive(Debug, Clone)]
pub struct RateLimitService {
    config: RateLimitConfig,
    rate_limiter: Arc<RwLock<HashMap<String, RateLimitState>>>,
}

impl RateLimitService {
    pub fn new(config: RateLimitConfig) -> Self {
        info!(
            enabled = config.enabled,
            per_ip_limit = config.per_ip_limit,
            window_seconds = config.window_seconds,
            whitelist_ips = ?config.whitelist_ips,
            "Initializing RateLimitService"
        );
        Self {
            config,
            rate_limiter: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Check the limit for a client. Requests without a resolvable IP share
    /// one bucket.
    pub async fn check_rate_limit(&self, ip_address: Option<&str>) -> RateLimitResult {
        if !self.config.enabled {
            return RateLimitResult::Allowed;
        }

        if let Some(ip) = ip_address {
            if self.config.whitelist_ips.iter().any(|w| w == ip) {
                return RateLimitResult::Allowed;
            }
        }

        let key = match ip_address {
            Some(ip) => format!("ip:{}", ip),
            None => "unknown".to_string(),
        };

        self.check_limit_for_key(&key, self.config.per_ip_limit, self.config.window())
            .await
    }

    async fn check_limit_for_key(
        &self,
        key: &str,
        limit: u32,
        window_duration: Duration,
    ) -> RateLimitResult {
        let mut limiter = self.rate_limiter.write().await;

        let state = limiter
            .entry(key.to_string())
            .or_insert_with(RateLimitState::new);

        if state.is_expired(window_duration) {
            state.reset();
        }

        if state.count >= limit {
            let elapsed = state.window_start.elapsed().as_secs() as u32;
            let retry_after = (window_duration.as_secs() as u32)
                .saturating_sub(elapsed)
                .max(1);
            debug!(key = %key, retry_after = retry_after, "Rate limit bucket exhausted");
            return RateLimitResult::Limited { retry_after };
        }

        state.count += 1;
        RateLimitResult::Allowed
    }

    /// Log a rate limit violation
    pub fn log_violation(&self, ip_address: Option<&str>, endpoint: &str) {
        warn!(
            ip_address = ?ip_address,
            endpoint = %endpoint,
            "Rate limit violation detected"
        );
    }

    /// Drop buckets whose window has passed. Called periodically from `main`.
    pub async fn cleanup_expired(&self) {
        let window = self.config.window();
        let mut limiter = self.rate_limiter.write().await;
        let before = limiter.len();
        limiter.retain(|_, state| !state.is_expired(window));
        debug!(removed = before - limiter.len(), "Cleaned up expired rate limit entries");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service_with(limit: u32, whitelist: &[&str]) -> RateLimitService {
        RateLimitService::new(RateLimitConfig {
            enabled: true,
            per_ip_limit: limit,
            window_seconds: 60,
            whitelist_ips: whitelist.iter().map(|s| s.to_string()).collect(),
        })
    }

    #[tokio::test]
    async fn test_rate_limit_allows_within_limit() {
        let service = service_with(3, &[]);
        for _ in 0..3 {
            assert_eq!(
                service.check_rate_limit(Some("192.168.1.1")).await,
                RateLimitResult::Allowed
            );
        }
    }

    #[tokio::test]
    async fn test_rate_limit_blocks_when_exceeded() {
        let service = service_with(2, &[]);
        service.check_rate_limit(Some("10.0.0.1")).await;
        service.check_rate_limit(Some("10.0.0.1")).await;

        let result = service.check_rate_limit(Some("10.0.0.1")).await;
        assert!(matches!(result, RateLimitResult::Limited { retry_after } if retry_after <= 60));
    }

    #[tokio::test]
    async fn test_whitelist_bypasses_rate_limit() {
        let service = service_with(1, &["127.0.0.1"]);
        for _ in 0..10 {
            assert_eq!(
                service.check_rate_limit(Some("127.0.0.1")).await,
                RateLimitResult::Allowed
            );
        }
    }

    #[tokio::test]
    async fn test_different_ips_have_separate_limits() {
        let service = service_with(1, &[]);
        service.check_rate_limit(Some("10.0.0.1")).await;
        assert!(matches!(
            service.check_rate_limit(Some("10.0.0.1")).await,
            RateLimitResult::Limited { .. }
        ));
        assert_eq!(
            service.check_rate_limit(Some("10.0.0.2")).await,
            RateLimitResult::Allowed
        );
    }

    #[tokio::test]
    async fn test_disabled_limiter_allows_everything() {
        let service = RateLimitService::new(RateLimitConfig {
            enabled: false,
            per_ip_limit: 0,
            ..RateLimitConfig::default()
        });
        assert_eq!(service.check_rate_limit(None).await, RateLimitResult::Allowed);
    }
}
