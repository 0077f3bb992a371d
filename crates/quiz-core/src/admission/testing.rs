//! Counter store doubles for admission tests.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::ports::{CounterSnapshot, CounterStore, StoreError};

/// Mutex-guarded map driven by the tokio clock, so paused-time tests can
/// advance past a window.
#[derive(Default)]
pub struct ClockStore {
    entries: Mutex<HashMap<String, (u64, Instant)>>,
}

#[async_trait]
impl CounterStore for ClockStore {
    async fn increment_and_get(
        &self,
        key: &str,
        window: Duration,
    ) -> Result<CounterSnapshot, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let entry = entries.entry(key.to_string()).or_insert((0, now + window));
        if now >= entry.1 {
            *entry = (0, now + window);
        }
        entry.0 += 1;
        Ok(CounterSnapshot {
            count: entry.0,
            ttl: entry.1 - now,
        })
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        Ok(entries
            .get(key)
            .filter(|(_, expires_at)| now < *expires_at)
            .map(|(_, expires_at)| *expires_at - now))
    }

    async fn peek(&self, key: &str) -> Result<u64, StoreError> {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        Ok(entries
            .get(key)
            .filter(|(_, expires_at)| now < *expires_at)
            .map_or(0, |(count, _)| *count))
    }
}

/// Every call fails as if the network to the store were down.
pub struct DownStore;

#[async_trait]
impl CounterStore for DownStore {
    async fn increment_and_get(&self, _: &str, _: Duration) -> Result<CounterSnapshot, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn ttl(&self, _: &str) -> Result<Option<Duration>, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn peek(&self, _: &str) -> Result<u64, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}

/// Every call hangs forever.
pub struct StalledStore;

#[async_trait]
impl CounterStore for StalledStore {
    async fn increment_and_get(&self, _: &str, _: Duration) -> Result<CounterSnapshot, StoreError> {
        std::future::pending().await
    }

    async fn ttl(&self, _: &str) -> Result<Option<Duration>, StoreError> {
        std::future::pending().await
    }

    async fn peek(&self, _: &str) -> Result<u64, StoreError> {
        std::future::pending().await
    }
}
