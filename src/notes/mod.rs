//! # Notes Module
//!
//! Per-user notes behind the cookie session and CSRF guard.

pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod validators;

#[cfg(test)]
mod tests;

pub use routes::notes_routes;
