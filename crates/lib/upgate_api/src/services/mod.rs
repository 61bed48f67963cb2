//! Request-scoped helpers shared by handlers and middleware.

pub mod cookies;
pub mod rate_limit;
