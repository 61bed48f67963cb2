//! In-memory stores backed by `DashMap`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::{RateCounter, StateStore, StoreError, UserStore};
use crate::models::auth::User;

const CLEANUP_PERIOD: Duration = Duration::from_secs(60);

/// Run `task` every `period` until `shutdown` is cancelled.
fn spawn_periodic<F>(period: Duration, shutdown: CancellationToken, task: F) -> JoinHandle<()>
where
    F: Fn() + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => task(),
            }
        }
    })
}

/// User directory held in process memory.
#[derive(Default)]
pub struct MemoryUserStore {
    users: DashMap<String, User>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(email).map(|u| u.value().clone()))
    }

    async fn create(&self, user: &User) -> Result<(), StoreError> {
        match self.users.entry(user.email.clone()) {
            Entry::Occupied(_) => Err(StoreError::Conflict),
            Entry::Vacant(slot) => {
                slot.insert(user.clone());
                Ok(())
            }
        }
    }
}

/// Nonce store held in process memory. Entries carry their expiry instant.
#[derive(Default)]
pub struct MemoryStateStore {
    entries: DashMap<String, Instant>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evict expired entries.
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.entries.retain(|_, expires| *expires > now);
    }

    /// Spawn a task evicting expired entries every minute until `shutdown`.
    pub fn spawn_cleanup_task(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let store = Arc::clone(self);
        spawn_periodic(CLEANUP_PERIOD, shutdown, move || store.cleanup())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn save(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), Instant::now() + ttl);
        Ok(())
    }

    async fn take(&self, key: &str) -> Result<bool, StoreError> {
        let Some((_, expires)) = self.entries.remove(key) else {
            return Ok(false);
        };
        Ok(expires > Instant::now())
    }
}

/// Hit counter held in process memory: `(count, window end)` per key.
#[derive(Default)]
pub struct MemoryRateCounter {
    windows: DashMap<String, (u64, Instant)>,
}

impl MemoryRateCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop windows that have ended.
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.windows.retain(|_, (_, ends)| *ends > now);
    }

    pub fn spawn_cleanup_task(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let counter = Arc::clone(self);
        spawn_periodic(CLEANUP_PERIOD, shutdown, move || counter.cleanup())
    }
}

#[async_trait]
impl RateCounter for MemoryRateCounter {
    async fn incr(&self, key: &str, window: Duration) -> Result<u64, StoreError> {
        let now = Instant::now();
        let mut slot = self
            .windows
            .entry(key.to_string())
            .or_insert((0, now + window));
        if slot.1 <= now {
            *slot = (0, now + window);
        }
        slot.0 += 1;
        Ok(slot.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(email: &str) -> User {
        User::local("Test", email, "hash".into(), "salt".into())
    }

    #[tokio::test]
    async fn create_then_find() {
        let store = MemoryUserStore::new();
        store.create(&user("a@b.com")).await.unwrap();
        let found = store.find_by_email("a@b.com").await.unwrap().unwrap();
        assert_eq!(found.email, "a@b.com");
        assert!(store.find_by_email("A@b.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let store = MemoryUserStore::new();
        store.create(&user("a@b.com")).await.unwrap();
        let err = store.create(&user("a@b.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn state_is_single_use() {
        let store = MemoryStateStore::new();
        store.save("k", Duration::from_secs(60)).await.unwrap();
        assert!(store.take("k").await.unwrap());
        assert!(!store.take("k").await.unwrap());
        assert!(!store.take("never-saved").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn state_expires_after_ttl() {
        let store = MemoryStateStore::new();
        store.save("k", Duration::from_secs(60)).await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(!store.take("k").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn cleanup_evicts_expired_only() {
        let store = MemoryStateStore::new();
        store.save("old", Duration::from_secs(10)).await.unwrap();
        store.save("new", Duration::from_secs(120)).await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;
        store.cleanup();
        assert_eq!(store.len(), 1);
        assert!(store.take("new").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn counter_resets_after_window() {
        let counter = MemoryRateCounter::new();
        let window = Duration::from_secs(60);
        assert_eq!(counter.incr("rate:ip:1.2.3.4", window).await.unwrap(), 1);
        assert_eq!(counter.incr("rate:ip:1.2.3.4", window).await.unwrap(), 2);
        assert_eq!(counter.incr("rate:ip:5.6.7.8", window).await.unwrap(), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(counter.incr("rate:ip:1.2.3.4", window).await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cleanup_task_runs_until_cancelled() {
        let store = Arc::new(MemoryStateStore::new());
        store.save("k", Duration::from_secs(5)).await.unwrap();
        let shutdown = CancellationToken::new();
        let handle = store.spawn_cleanup_task(shutdown.clone());

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(store.is_empty());

        shutdown.cancel();
        handle.await.unwrap();
    }
}
