//! Three-state circuit breaker for downstream calls.
//!
//! Closed: calls pass through; `failure_threshold` consecutive failures trip
//! the breaker. Open: calls fail fast until `cooldown` elapses. Half-open: up
//! to `half_open_max_requests` trial calls run concurrently; that many
//! consecutive successes close the breaker, any failure reopens it.
//!
//! Every state change bumps a generation counter. A call records its outcome
//! only if the generation it started under is still current, so stragglers
//! from a previous state cannot flip the new one.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half-open",
        }
    }
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Breaker tuning. Defaults: 5 failures, 10 s cooldown, 5 half-open trials,
/// 30 s closed-state window, 2 s per-call timeout.
#[derive(Debug, Clone)]
pub struct BreakerSettings {
    pub name: String,
    pub failure_threshold: u32,
    pub cooldown: Duration,
    pub half_open_max_requests: u32,
    /// Closed-state counters reset this often. Zero disables the reset.
    pub interval: Duration,
    pub call_timeout: Duration,
}

impl BreakerSettings {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            failure_threshold: 5,
            cooldown: Duration::from_secs(10),
            half_open_max_requests: 5,
            interval: Duration::from_secs(30),
            call_timeout: Duration::from_secs(2),
        }
    }

    pub fn with_failure_threshold(mut self, n: u32) -> Self {
        self.failure_threshold = n.max(1);
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_half_open_max_requests(mut self, n: u32) -> Self {
        self.half_open_max_requests = n.max(1);
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }
}

/// Why a guarded call did not produce a value.
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// Rejected without running: the breaker is open.
    #[error("circuit breaker `{0}` is open")]
    Open(String),

    /// Rejected without running: all half-open trial slots are taken.
    #[error("circuit breaker `{0}` is half-open and at its trial limit")]
    TooManyRequests(String),

    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    /// The call ran and failed.
    #[error("{0}")]
    Inner(E),
}

impl<E> BreakerError<E> {
    /// Whether the breaker refused the call without running it.
    pub fn is_rejected(&self) -> bool {
        matches!(self, BreakerError::Open(_) | BreakerError::TooManyRequests(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Success,
    Failure,
    Cancelled,
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    generation: u64,
    consecutive_failures: u32,
    consecutive_successes: u32,
    half_open_in_flight: u32,
    opened_at: Instant,
    window_start: Instant,
}

/// A circuit breaker guarding one kind of downstream call.
#[derive(Debug)]
pub struct CircuitBreaker {
    settings: BreakerSettings,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(settings: BreakerSettings) -> Self {
        let now = Instant::now();
        Self {
            settings,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                generation: 0,
                consecutive_failures: 0,
                consecutive_successes: 0,
                half_open_in_flight: 0,
                opened_at: now,
                window_start: now,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn settings(&self) -> &BreakerSettings {
        &self.settings
    }

    /// Current state, with any due cooldown or window reset applied.
    pub fn state(&self) -> BreakerState {
        let mut inner = self.lock();
        self.refresh(&mut inner, Instant::now());
        inner.state
    }

    /// Run `f` through the breaker. Every error counts as a failure.
    pub async fn call<T, E, F, Fut>(&self, f: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.call_filtered(f, |_| true).await
    }

    /// Run `f` through the breaker. Errors for which `is_failure` returns
    /// `false` are passed through but recorded as successes.
    pub async fn call_filtered<T, E, F, Fut, P>(
        &self,
        f: F,
        is_failure: P,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: FnOnce(&E) -> bool,
    {
        let generation = self.before_call::<E>()?;
        let mut guard = CallGuard {
            breaker: self,
            generation,
            finished: false,
        };

        match tokio::time::timeout(self.settings.call_timeout, f()).await {
            Err(_) => {
                guard.finish(Outcome::Failure);
                Err(BreakerError::Timeout(self.settings.call_timeout))
            }
            Ok(Ok(value)) => {
                guard.finish(Outcome::Success);
                Ok(value)
            }
            Ok(Err(e)) => {
                let outcome = if is_failure(&e) {
                    Outcome::Failure
                } else {
                    Outcome::Success
                };
                guard.finish(outcome);
                Err(BreakerError::Inner(e))
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn before_call<E>(&self) -> Result<u64, BreakerError<E>> {
        let mut inner = self.lock();
        self.refresh(&mut inner, Instant::now());
        match inner.state {
            BreakerState::Closed => {}
            BreakerState::Open => {
                debug!(breaker = %self.settings.name, "call rejected: open");
                return Err(BreakerError::Open(self.settings.name.clone()));
            }
            BreakerState::HalfOpen => {
                if inner.half_open_in_flight >= self.settings.half_open_max_requests {
                    debug!(breaker = %self.settings.name, "call rejected: trial limit");
                    return Err(BreakerError::TooManyRequests(self.settings.name.clone()));
                }
                inner.half_open_in_flight += 1;
            }
        }
        Ok(inner.generation)
    }

    fn after_call(&self, generation: u64, outcome: Outcome) {
        let mut inner = self.lock();
        let now = Instant::now();
        self.refresh(&mut inner, now);
        if inner.generation != generation {
            return;
        }
        if inner.state == BreakerState::HalfOpen {
            inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
        }

        match (inner.state, outcome) {
            (_, Outcome::Cancelled) | (BreakerState::Open, _) => {}
            (BreakerState::Closed, Outcome::Success) => {
                inner.consecutive_failures = 0;
            }
            (BreakerState::Closed, Outcome::Failure) => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.settings.failure_threshold {
                    self.transition(&mut inner, BreakerState::Open, now);
                }
            }
            (BreakerState::HalfOpen, Outcome::Success) => {
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.settings.half_open_max_requests {
                    self.transition(&mut inner, BreakerState::Closed, now);
                }
            }
            (BreakerState::HalfOpen, Outcome::Failure) => {
                self.transition(&mut inner, BreakerState::Open, now);
            }
        }
    }

    /// Apply time-driven changes: cooldown expiry and closed-window reset.
    fn refresh(&self, inner: &mut Inner, now: Instant) {
        match inner.state {
            BreakerState::Open => {
                if now.duration_since(inner.opened_at) >= self.settings.cooldown {
                    self.transition(inner, BreakerState::HalfOpen, now);
                }
            }
            BreakerState::Closed => {
                if !self.settings.interval.is_zero()
                    && now.duration_since(inner.window_start) >= self.settings.interval
                {
                    inner.generation += 1;
                    inner.consecutive_failures = 0;
                    inner.consecutive_successes = 0;
                    inner.window_start = now;
                }
            }
            BreakerState::HalfOpen => {}
        }
    }

    fn transition(&self, inner: &mut Inner, to: BreakerState, now: Instant) {
        let from = inner.state;
        if from == to {
            return;
        }
        inner.state = to;
        inner.generation += 1;
        inner.consecutive_failures = 0;
        inner.consecutive_successes = 0;
        inner.half_open_in_flight = 0;
        inner.window_start = now;
        if to == BreakerState::Open {
            inner.opened_at = now;
        }
        warn!(
            breaker = %self.settings.name,
            from = from.as_str(),
            to = to.as_str(),
            "circuit breaker state changed"
        );
    }
}

/// Records the outcome of one admitted call. Dropping it unfinished (the
/// caller's future was cancelled) releases any half-open slot.
struct CallGuard<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    finished: bool,
}

impl CallGuard<'_> {
    fn finish(&mut self, outcome: Outcome) {
        self.finished = true;
        self.breaker.after_call(self.generation, outcome);
    }
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.breaker.after_call(self.generation, Outcome::Cancelled);
        }
    }
}
