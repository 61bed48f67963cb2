//! # upgate_core
//!
//! Core domain logic for Upgate: credential hashing, token issuance,
//! the OAuth authorization-code flow, persistence seams and the circuit
//! breaker guarding the downstream upload service.

pub mod auth;
pub mod breaker;
pub mod migrate;
pub mod models;
pub mod store;
pub mod uploads;
pub mod uuid;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
