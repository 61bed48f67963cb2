//! Redis-backed nonce store.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::redis::{Pipeline, cmd, pipe};
use deadpool_redis::{Config as RedisConfig, Pool, Runtime};
use tracing::info;

use super::{RateCounter, StateStore, StoreError};

/// [`StateStore`] using `SET NX EX` to save and `GETDEL` to consume.
#[derive(Clone)]
pub struct RedisStateStore {
    pool: Pool,
}

impl RedisStateStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Build a pool from `url` and check it answers `PING`.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = RedisConfig::from_url(url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| StoreError::Redis(format!("pool: {e}")))?;
        let store = Self::new(pool);
        store.ping().await?;
        info!("connected to Redis");
        Ok(store)
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await?;
        let _: String = cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl StateStore for RedisStateStore {
    async fn save(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await?;
        let stored: Option<String> = cmd("SET")
            .arg(key)
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await?;
        if stored.is_none() {
            return Err(StoreError::Conflict);
        }
        Ok(())
    }

    async fn take(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.pool.get().await?;
        let value: Option<String> = cmd("GETDEL").arg(key).query_async(&mut conn).await?;
        Ok(value.is_some())
    }
}

/// [`RateCounter`] using `INCR` and `EXPIRE NX` in one `MULTI`/`EXEC`.
///
/// Every hit re-arms the TTL only if the key has none, so a key can never be
/// left without an expiry. `EXPIRE NX` needs Redis 7.
#[derive(Clone)]
pub struct RedisRateCounter {
    pool: Pool,
}

impl RedisRateCounter {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

fn incr_with_expiry(key: &str, window: Duration) -> Pipeline {
    let mut p = pipe();
    p.atomic()
        .cmd("INCR")
        .arg(key)
        .cmd("EXPIRE")
        .arg(key)
        .arg(window.as_secs().max(1))
        .arg("NX")
        .ignore();
    p
}

#[async_trait]
impl RateCounter for RedisRateCounter {
    async fn incr(&self, key: &str, window: Duration) -> Result<u64, StoreError> {
        let mut conn = self.pool.get().await?;
        let (count,): (u64,) = incr_with_expiry(key, window)
            .query_async(&mut conn)
            .await?;
        Ok(count)
    }
}
