//! Process-local store used when no Redis URL is configured, and by tests.
//!
//! Expired entries are ignored on read and physically removed by writers or by the
//! optional janitor task. Locks are taken inside synchronous helpers so no guard ever
//! lives across an `.await`.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::debug;

use super::{Clock, KeyValueStore, StoreError, SystemClock};
use crate::limiter::{RateLimitDecision, RateLimitPolicy, RateLimitStore};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

#[derive(Debug)]
struct Window {
    count: u64,
    window_expires_at: Instant,
    blocked_until: Option<Instant>,
}

impl Window {
    fn fresh(now: Instant, window: Duration) -> Self {
        Self {
            count: 0,
            window_expires_at: now + window,
            blocked_until: None,
        }
    }

    fn stale(&self, now: Instant) -> bool {
        self.window_expires_at <= now && self.blocked_until.map_or(true, |until| until <= now)
    }
}

#[derive(Debug)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
    windows: Mutex<HashMap<String, Window>>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            windows: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn read(&self, key: &str) -> Option<String> {
        let now = self.clock.now();
        self.entries
            .read()
            .get(key)
            .filter(|entry| entry.live(now))
            .map(|entry| entry.value.clone())
    }

    fn write(&self, key: &str, value: &str, ttl: Duration) {
        let expires_at = self.clock.now() + ttl;
        self.entries.write().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
    }

    fn remove(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.entries
            .write()
            .remove(key)
            .is_some_and(|entry| entry.live(now))
    }

    fn swap(&self, key: &str, expected: &str, new: &str, ttl: Duration) -> bool {
        let now = self.clock.now();
        let mut entries = self.entries.write();
        match entries.get_mut(key) {
            Some(entry) if entry.live(now) && entry.value == expected => {
                entry.value = new.to_string();
                entry.expires_at = now + ttl;
                true
            }
            _ => false,
        }
    }

    fn remove_if(&self, key: &str, expected: &str) -> bool {
        let now = self.clock.now();
        let mut entries = self.entries.write();
        let matches = entries
            .get(key)
            .is_some_and(|entry| entry.live(now) && entry.value == expected);
        if matches {
            entries.remove(key);
        }
        matches
    }

    fn record_hit(&self, client: &str, policy: &RateLimitPolicy) -> RateLimitDecision {
        let now = self.clock.now();
        let mut windows = self.windows.lock();
        let state = windows
            .entry(client.to_string())
            .or_insert_with(|| Window::fresh(now, policy.window));

        if let Some(until) = state.blocked_until {
            if until > now {
                return RateLimitDecision::Blocked {
                    retry_after: until - now,
                };
            }
            *state = Window::fresh(now, policy.window);
        }

        if state.window_expires_at <= now {
            *state = Window::fresh(now, policy.window);
        }

        state.count += 1;
        if state.count > policy.max_attempts {
            state.count = 0;
            state.blocked_until = Some(now + policy.block);
            return RateLimitDecision::Tripped {
                retry_after: policy.block,
            };
        }

        RateLimitDecision::Allowed {
            remaining: policy.max_attempts - state.count,
        }
    }

    /// Drop expired entries and idle rate-limit windows. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();

        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.live(now));
        let purged = before - entries.len();
        drop(entries);

        let mut windows = self.windows.lock();
        let before = windows.len();
        windows.retain(|_, window| !window.stale(now));
        purged + (before - windows.len())
    }

    /// Periodically purge expired state until the store is dropped.
    pub fn spawn_janitor(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let store = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                let purged = store.purge_expired();
                if purged > 0 {
                    debug!(purged, "purged expired entries");
                }
            }
        })
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.write(key, value, ttl);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.read(key))
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.remove(key))
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        new: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        Ok(self.swap(key, expected, new, ttl))
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        Ok(self.remove_if(key, expected))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl RateLimitStore for MemoryStore {
    async fn hit(
        &self,
        client: &str,
        policy: &RateLimitPolicy,
    ) -> Result<RateLimitDecision, StoreError> {
        Ok(self.record_hit(client, policy))
    }
}
