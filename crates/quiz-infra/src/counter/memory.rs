//! In-memory counter store - single-process deployments and tests.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use quiz_core::ports::{CounterSnapshot, CounterStore, StoreError};

struct CounterEntry {
    count: u64,
    expires_at: Instant,
}

impl CounterEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Counter store backed by a `HashMap` behind an async `RwLock`.
///
/// Increments take the write lock, which makes create-or-increment atomic per
/// process. Expired entries read as absent; [`InMemoryCounterStore::spawn_sweeper`]
/// reclaims their memory. Counts are not shared between processes.
pub struct InMemoryCounterStore {
    entries: RwLock<HashMap<String, CounterEntry>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Drop expired entries, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    /// Periodically purge expired entries until the store is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let store: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                let purged = store.purge_expired().await;
                if purged > 0 {
                    tracing::debug!(purged, "Purged expired rate limit counters");
                }
            }
        })
    }
}

impl Default for InMemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn increment_and_get(
        &self,
        key: &str,
        window: Duration,
    ) -> Result<CounterSnapshot, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;

        let entry = entries
            .entry(key.to_string())
            .and_modify(|entry| {
                if !entry.is_live(now) {
                    entry.count = 0;
                    entry.expires_at = now + window;
                }
            })
            .or_insert(CounterEntry {
                count: 0,
                expires_at: now + window,
            });
        entry.count += 1;

        Ok(CounterSnapshot {
            count: entry.count,
            ttl: entry.expires_at - now,
        })
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.expires_at - now))
    }

    async fn peek(&self, key: &str) -> Result<u64, StoreError> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map_or(0, |entry| entry.count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn test_first_increment_creates_entry_with_full_ttl() {
        let store = InMemoryCounterStore::new();
        let snapshot = store.increment_and_get("rate_limit:1", WINDOW).await.unwrap();
        assert_eq!(snapshot.count, 1);
        assert_eq!(snapshot.ttl, WINDOW);
    }

    #[tokio::test(start_paused = true)]
    async fn test_increment_keeps_ttl() {
        let store = InMemoryCounterStore::new();
        store.increment_and_get("k", WINDOW).await.unwrap();
        tokio::time::advance(Duration::from_secs(20)).await;

        let snapshot = store.increment_and_get("k", WINDOW).await.unwrap();
        assert_eq!(snapshot.count, 2);
        assert_eq!(snapshot.ttl, Duration::from_secs(40));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_at_deadline() {
        let store = InMemoryCounterStore::new();
        store.increment_and_get("k", WINDOW).await.unwrap();
        store.increment_and_get("k", WINDOW).await.unwrap();

        tokio::time::advance(WINDOW).await;
        assert_eq!(store.peek("k").await.unwrap(), 0);
        assert_eq!(store.ttl("k").await.unwrap(), None);

        let snapshot = store.increment_and_get("k", WINDOW).await.unwrap();
        assert_eq!(snapshot.count, 1);
        assert_eq!(snapshot.ttl, WINDOW);
    }

    #[tokio::test]
    async fn test_missing_key() {
        let store = InMemoryCounterStore::new();
        assert_eq!(store.peek("absent").await.unwrap(), 0);
        assert_eq!(store.ttl("absent").await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_are_not_lost() {
        let store = Arc::new(InMemoryCounterStore::new());

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store.increment_and_get("hot", WINDOW).await.unwrap().count
                })
            })
            .collect();

        let mut counts = Vec::new();
        for handle in handles {
            counts.push(handle.await.unwrap());
        }
        counts.sort_unstable();

        assert_eq!(counts, (1..=50).collect::<Vec<u64>>());
        assert_eq!(store.peek("hot").await.unwrap(), 50);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let store = InMemoryCounterStore::new();
        store.increment_and_get("short", Duration::from_secs(5)).await.unwrap();
        store.increment_and_get("long", WINDOW).await.unwrap();

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(store.purge_expired().await, 1);
        assert_eq!(store.peek("long").await.unwrap(), 1);
    }
}
