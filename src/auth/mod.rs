//! # Auth Module
//!
//! This module handles all authentication-related functionality including:
//! - Email one-time codes with cooldown, rate and attempt limits
//! - Google ID token sign-in
//! - Cookie sessions (JWT) with sliding refresh
//! - Double-submit CSRF protection
//! - AuthedUser extractor for protected routes

pub mod csrf;
pub mod extractors;
pub mod gateway;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod otp;
pub mod routes;
pub mod session;
pub mod store;
pub mod validators;


pub use extractors::AuthedUser;
pub use routes::auth_routes;
