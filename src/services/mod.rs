// src/services/mod.rs
//
// Shared services module: outbound integrations and cross-cutting limits
// used by the domain modules

pub mod email;
pub mod google;
pub mod rate_limit;

// Re-export commonly used types for convenience
pub use email::{LogMailer, Mailer, SesMailer};
pub use google::{GoogleIdTokenVerifier, IdTokenVerifier};
pub use rate_limit::{RateLimitConfig, RateLimitService};
