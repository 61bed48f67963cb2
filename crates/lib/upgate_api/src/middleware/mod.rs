//! Request middleware: access-token authentication and rate limiting.

pub mod auth;
pub mod rate_limit;
