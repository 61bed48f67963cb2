//! Persistence seams consumed by the auth service.
//!
//! [`UserStore`] holds user records keyed by email, [`StateStore`] holds
//! short-lived OAuth state nonces and [`RateCounter`] backs the per-IP
//! request limiter. Each has an in-memory implementation for tests and
//! single-node runs, plus a networked one (Postgres or Redis).

pub mod memory;
pub mod postgres;
pub mod redis;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::auth::User;

pub use memory::{MemoryRateCounter, MemoryStateStore, MemoryUserStore};
pub use postgres::PgUserStore;
pub use redis::{RedisRateCounter, RedisStateStore};

/// Storage failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A record with the same key already exists.
    #[error("record already exists")]
    Conflict,

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("redis error: {0}")]
    Redis(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

impl From<deadpool_redis::PoolError> for StoreError {
    fn from(e: deadpool_redis::PoolError) -> Self {
        StoreError::Redis(e.to_string())
    }
}

impl From<deadpool_redis::redis::RedisError> for StoreError {
    fn from(e: deadpool_redis::redis::RedisError) -> Self {
        StoreError::Redis(e.to_string())
    }
}

/// User directory keyed by email.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Look up a user by exact email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Insert a user. Fails with [`StoreError::Conflict`] if the email exists.
    async fn create(&self, user: &User) -> Result<(), StoreError>;

    /// Readiness probe.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// TTL-capable key store for single-use nonces.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Record `key` for `ttl`.
    async fn save(&self, key: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Atomically remove `key`. Returns `true` only if it existed and had not expired.
    async fn take(&self, key: &str) -> Result<bool, StoreError>;
}

/// Fixed-window hit counter.
#[async_trait]
pub trait RateCounter: Send + Sync {
    /// Count a hit on `key`. The first hit opens a window of length `window`;
    /// returns the number of hits in the current window, this one included.
    async fn incr(&self, key: &str, window: Duration) -> Result<u64, StoreError>;
}
