//! Redis counter store - shared across every instance of the service.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError, Script};

use quiz_core::ports::{CounterSnapshot, CounterStore, StoreError};

/// Increment and arm the expiry in one server-side step.
///
/// `PEXPIRE` runs on the first increment, and also repairs a key that somehow
/// lost its TTL so a counter can never live forever.
/// Returns `{count, pttl_ms}`.
const INCREMENT_SCRIPT: &str = r#"
local current = redis.call('INCR', KEYS[1])
local ttl = redis.call('PTTL', KEYS[1])
if current == 1 or ttl < 0 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
    ttl = tonumber(ARGV[1])
end
return {current, ttl}
"#;

/// Redis connection configuration.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis URL (e.g., redis://localhost:6379)
    pub url: String,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Whether to fall back to the in-memory store if Redis is unreachable at startup
    pub fallback_to_memory: bool,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            connect_timeout: Duration::from_secs(5),
            fallback_to_memory: false,
        }
    }
}

/// Counter store on a Redis server.
///
/// Atomicity comes from the server executing [`INCREMENT_SCRIPT`] as a unit,
/// not from any client-side locking, so any number of service instances can
/// share one budget per caller.
pub struct RedisCounterStore {
    conn: ConnectionManager,
    script: Script,
}

impl RedisCounterStore {
    pub async fn new(config: &RedisConfig) -> Result<Self, StoreError> {
        let client = Client::open(config.url.as_str()).map_err(store_error)?;

        // Use timeout to prevent hanging if Redis is unreachable
        let conn = tokio::time::timeout(config.connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| StoreError::Unavailable("Connection timed out".to_string()))?
            .map_err(store_error)?;

        tracing::info!(url = %config.url, "Connected to Redis counter store");

        Ok(Self {
            conn,
            script: Script::new(INCREMENT_SCRIPT),
        })
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn increment_and_get(
        &self,
        key: &str,
        window: Duration,
    ) -> Result<CounterSnapshot, StoreError> {
        let mut conn = self.conn.clone();
        let window_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);

        let reply: Vec<i64> = self
            .script
            .key(key)
            .arg(window_ms)
            .invoke_async(&mut conn)
            .await
            .map_err(store_error)?;

        match reply.as_slice() {
            [count, ttl_ms] if *count > 0 => Ok(CounterSnapshot {
                count: *count as u64,
                ttl: Duration::from_millis((*ttl_ms).max(0) as u64),
            }),
            other => Err(StoreError::Protocol(format!(
                "increment script returned {other:?}"
            ))),
        }
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let mut conn = self.conn.clone();
        let ttl_ms: i64 = conn.pttl(key).await.map_err(store_error)?;

        // -2: no such key, -1: key without expiry
        Ok((ttl_ms > 0).then(|| Duration::from_millis(ttl_ms as u64)))
    }

    async fn peek(&self, key: &str) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        let count: Option<u64> = conn.get(key).await.map_err(store_error)?;
        Ok(count.unwrap_or(0))
    }
}

fn store_error(e: RedisError) -> StoreError {
    if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout()
    {
        StoreError::Unavailable(e.to_string())
    } else {
        StoreError::Protocol(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn get_test_store() -> Option<RedisCounterStore> {
        let config = RedisConfig {
            url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6389".to_string()),
            connect_timeout: Duration::from_secs(1),
            fallback_to_memory: false,
        };

        RedisCounterStore::new(&config).await.ok()
    }

    fn unique_key(name: &str) -> String {
        let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        format!("test_rate_limit:{name}:{nanos}")
    }

    #[tokio::test]
    async fn test_redis_increment_and_expiry() {
        let store = match get_test_store().await {
            Some(s) => s,
            None => {
                tracing::warn!("Redis not available, skipping test");
                return;
            }
        };
        let key = unique_key("expiry");
        let window = Duration::from_secs(1);

        let first = store.increment_and_get(&key, window).await.unwrap();
        assert_eq!(first.count, 1);
        assert!(first.ttl <= window);

        let second = store.increment_and_get(&key, window).await.unwrap();
        assert_eq!(second.count, 2);
        assert!(second.ttl <= first.ttl);
        assert_eq!(store.peek(&key).await.unwrap(), 2);
        assert!(store.ttl(&key).await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(store.peek(&key).await.unwrap(), 0);
        assert_eq!(store.ttl(&key).await.unwrap(), None);
        assert_eq!(store.increment_and_get(&key, window).await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_redis_concurrent_cold_key() {
        let store = match get_test_store().await {
            Some(s) => std::sync::Arc::new(s),
            None => return,
        };
        let key = unique_key("concurrent");

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let store = store.clone();
                let key = key.clone();
                tokio::spawn(async move {
                    store
                        .increment_and_get(&key, Duration::from_secs(5))
                        .await
                        .unwrap()
                        .count
                })
            })
            .collect();

        let mut counts = Vec::new();
        for handle in handles {
            counts.push(handle.await.unwrap());
        }
        counts.sort_unstable();
        assert_eq!(counts, (1..=50).collect::<Vec<u64>>());
    }
}
