//! Counter store port - keyed counters that expire.

use async_trait::async_trait;
use std::time::Duration;

/// Shared store of `key -> (count, expiry)` entries.
///
/// `increment_and_get` must be atomic per key: two concurrent first requests
/// for a cold key both increment the same entry, never overwrite each other.
/// Networked implementations get that guarantee from the server, not from a
/// client-side read followed by a write.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment the counter for `key`, creating it with a TTL of `window` if
    /// it does not exist. An existing entry keeps its TTL.
    async fn increment_and_get(
        &self,
        key: &str,
        window: Duration,
    ) -> Result<CounterSnapshot, StoreError>;

    /// Time until `key` expires, `None` when there is no live entry.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError>;

    /// Current count for `key`, `0` when there is no live entry.
    async fn peek(&self, key: &str) -> Result<u64, StoreError>;
}

/// Counter state observed right after an increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub count: u64,
    pub ttl: Duration,
}

/// Counter store errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Unexpected store reply: {0}")]
    Protocol(String),
}
