//! Per-key fixed-window request limiter over a shared [`RateCounter`].

use std::sync::Arc;
use std::time::Duration;

use upgate_core::store::{RateCounter, StoreError};

/// Outcome of one limiter check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitResult {
    Allowed { remaining: u64 },
    Limited { retry_after: u64 },
}

/// Fixed-window limiter: at most `limit` hits per `window` per key.
#[derive(Clone)]
pub struct RateLimiter {
    counter: Arc<dyn RateCounter>,
    limit: u64,
    window: Duration,
}

impl RateLimiter {
    pub fn new(counter: Arc<dyn RateCounter>, limit: u64, window: Duration) -> Self {
        Self {
            counter,
            limit,
            window,
        }
    }

    /// `limit` requests per minute.
    pub fn per_minute(counter: Arc<dyn RateCounter>, limit: u64) -> Self {
        Self::new(counter, limit, Duration::from_secs(60))
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Count a hit for client `ip`.
    pub async fn check_ip(&self, ip: &str) -> Result<RateLimitResult, StoreError> {
        self.check(&format!("rate:ip:{ip}")).await
    }

    pub async fn check(&self, key: &str) -> Result<RateLimitResult, StoreError> {
        let count = self.counter.incr(key, self.window).await?;
        if count > self.limit {
            return Ok(RateLimitResult::Limited {
                retry_after: self.window.as_secs(),
            });
        }
        Ok(RateLimitResult::Allowed {
            remaining: self.limit - count,
        })
    }
}
