//! Admit/deny decisions backed by a [`CounterStore`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::AdmissionError;
use crate::ports::{CounterStore, StoreError};

use super::{CallerId, FailPolicy, RateLimitKey, RateLimitPolicy};

/// Outcome of one admission check. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionDecision {
    pub allowed: bool,
    /// Admissions left in the current window after this one.
    pub remaining: u32,
    /// Live TTL of the caller's window when denied, `0` when allowed.
    pub retry_after_secs: u64,
    /// Admitted without consulting the store (fail-open while it was down).
    pub degraded: bool,
}

impl AdmissionDecision {
    fn allowed(remaining: u32) -> Self {
        Self {
            allowed: true,
            remaining,
            retry_after_secs: 0,
            degraded: false,
        }
    }

    fn denied(retry_after_secs: u64) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            retry_after_secs,
            degraded: false,
        }
    }

    fn degraded(policy: &RateLimitPolicy) -> Self {
        Self {
            allowed: true,
            remaining: policy.max_requests(),
            retry_after_secs: 0,
            degraded: true,
        }
    }
}

/// Read-only view of a caller's window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaStatus {
    pub limit: u32,
    pub used: u64,
    pub remaining: u32,
    /// Seconds until the window resets, `0` when no window is open.
    pub reset_after_secs: u64,
    /// Store unreachable under fail-open: the full budget is reported.
    pub degraded: bool,
}

impl QuotaStatus {
    fn degraded(policy: &RateLimitPolicy) -> Self {
        Self {
            limit: policy.max_requests(),
            used: 0,
            remaining: policy.max_requests(),
            reset_after_secs: 0,
            degraded: true,
        }
    }
}

/// Fixed-window admission over a shared counter store.
///
/// The counter is incremented first and the threshold is checked against the
/// post-increment value, so exactly `max_requests` calls per window are
/// admitted. Every store round-trip is bounded by `store_timeout`; a call that
/// exceeds it is treated like an unreachable store.
#[derive(Clone)]
pub struct AdmissionDecider {
    store: Arc<dyn CounterStore>,
    fail_policy: FailPolicy,
    store_timeout: Duration,
}

impl AdmissionDecider {
    pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(500);

    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self {
            store,
            fail_policy: FailPolicy::default(),
            store_timeout: Self::DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_fail_policy(mut self, fail_policy: FailPolicy) -> Self {
        self.fail_policy = fail_policy;
        self
    }

    pub fn with_store_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    /// Count one request for `caller` under the default key namespace.
    pub async fn decide(
        &self,
        caller: CallerId,
        policy: &RateLimitPolicy,
    ) -> Result<AdmissionDecision, AdmissionError> {
        self.decide_key(&RateLimitKey::new(caller), policy).await
    }

    pub async fn decide_key(
        &self,
        key: &RateLimitKey,
        policy: &RateLimitPolicy,
    ) -> Result<AdmissionDecision, AdmissionError> {
        let incremented = self
            .bounded(self.store.increment_and_get(key.as_str(), policy.window()))
            .await;

        let snapshot = match incremented {
            Ok(snapshot) => snapshot,
            Err(e) => return self.on_store_failure(key, policy, e),
        };

        let limit = u64::from(policy.max_requests());
        if snapshot.count > limit {
            let retry_after_secs = whole_seconds(snapshot.ttl);
            tracing::info!(
                key = %key,
                count = snapshot.count,
                retry_after = retry_after_secs,
                "Rate limit exceeded"
            );
            return Ok(AdmissionDecision::denied(retry_after_secs));
        }

        let remaining = u32::try_from(limit - snapshot.count).unwrap_or(u32::MAX);
        tracing::debug!(key = %key, count = snapshot.count, remaining, "Request admitted");
        Ok(AdmissionDecision::allowed(remaining))
    }

    /// Inspect a window without counting a request. A store failure follows
    /// the fail policy, same as [`decide_key`](Self::decide_key).
    pub async fn status(
        &self,
        key: &RateLimitKey,
        policy: &RateLimitPolicy,
    ) -> Result<QuotaStatus, AdmissionError> {
        let read = async {
            let used = self.bounded(self.store.peek(key.as_str())).await?;
            let ttl = self.bounded(self.store.ttl(key.as_str())).await?;
            Ok::<_, StoreError>((used, ttl))
        };

        let (used, ttl) = match read.await {
            Ok(read) => read,
            Err(e) => {
                return match self.fail_policy {
                    FailPolicy::Open => {
                        tracing::warn!(key = %key, error = %e, "Counter store unavailable, reporting full quota (fail-open)");
                        Ok(QuotaStatus::degraded(policy))
                    }
                    FailPolicy::Closed => {
                        tracing::error!(key = %key, error = %e, "Counter store unavailable, quota unknown");
                        Err(AdmissionError::StoreUnavailable(e.to_string()))
                    }
                };
            }
        };

        let limit = policy.max_requests();
        Ok(QuotaStatus {
            limit,
            used,
            remaining: u32::try_from(u64::from(limit).saturating_sub(used)).unwrap_or(0),
            reset_after_secs: ttl.map_or(0, whole_seconds),
            degraded: false,
        })
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Unavailable(format!(
                "no reply within {}ms",
                self.store_timeout.as_millis()
            ))),
        }
    }

    fn on_store_failure(
        &self,
        key: &RateLimitKey,
        policy: &RateLimitPolicy,
        error: StoreError,
    ) -> Result<AdmissionDecision, AdmissionError> {
        match self.fail_policy {
            FailPolicy::Open => {
                tracing::warn!(key = %key, error = %error, "Counter store unavailable, admitting (fail-open)");
                Ok(AdmissionDecision::degraded(policy))
            }
            FailPolicy::Closed => {
                tracing::error!(key = %key, error = %error, "Counter store unavailable, refusing (fail-closed)");
                Err(AdmissionError::StoreUnavailable(error.to_string()))
            }
        }
    }
}

/// Round a TTL up to whole seconds, never below one: a caller told to wait
/// `n` seconds must find the window gone when they return.
fn whole_seconds(ttl: Duration) -> u64 {
    let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    secs.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::testing::{ClockStore, DownStore, StalledStore};

    fn decider() -> AdmissionDecider {
        AdmissionDecider::new(Arc::new(ClockStore::default()))
    }

    fn policy(max_requests: u32, window_secs: u64) -> RateLimitPolicy {
        RateLimitPolicy::new(max_requests, window_secs).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_admits_exactly_max_requests() {
        let decider = decider();
        let policy = policy(5, 60);
        let caller = CallerId(42);

        let mut remaining = Vec::new();
        for _ in 0..5 {
            let decision = decider.decide(caller, &policy).await.unwrap();
            assert!(decision.allowed);
            remaining.push(decision.remaining);
        }
        assert_eq!(remaining, vec![4, 3, 2, 1, 0]);

        tokio::time::advance(Duration::from_secs(1)).await;
        let sixth = decider.decide(caller, &policy).await.unwrap();
        assert!(!sixth.allowed);
        assert_eq!(sixth.remaining, 0);
        assert_eq!(sixth.retry_after_secs, 59);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_resets_after_retry_after() {
        let decider = decider();
        let policy = policy(5, 60);
        let caller = CallerId(42);

        for _ in 0..5 {
            decider.decide(caller, &policy).await.unwrap();
        }
        tokio::time::advance(Duration::from_secs(1)).await;
        let denied = decider.decide(caller, &policy).await.unwrap();
        assert!(!denied.allowed);

        tokio::time::advance(Duration::from_secs(denied.retry_after_secs)).await;
        let seventh = decider.decide(caller, &policy).await.unwrap();
        assert!(seventh.allowed);
        assert_eq!(seventh.remaining, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_tracks_live_ttl() {
        let decider = decider();
        let policy = policy(1, 30);
        let caller = CallerId(1);

        decider.decide(caller, &policy).await.unwrap();

        let mut previous = u64::MAX;
        for _ in 0..4 {
            let denied = decider.decide(caller, &policy).await.unwrap();
            assert!(!denied.allowed);
            assert!(denied.retry_after_secs <= previous);
            previous = denied.retry_after_secs;
            tokio::time::advance(Duration::from_millis(7_500)).await;
        }
        assert!(previous < 30);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_cold_start_admits_exactly_max() {
        let decider = Arc::new(decider());
        let policy = policy(5, 60);

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let decider = decider.clone();
                tokio::spawn(async move { decider.decide(CallerId(7), &policy).await })
            })
            .collect();

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().allowed {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 5);
    }

    #[tokio::test]
    async fn test_callers_are_isolated() {
        let decider = decider();
        let policy = policy(3, 60);

        for _ in 0..4 {
            decider.decide(CallerId(1), &policy).await.unwrap();
        }
        let other = decider.decide(CallerId(2), &policy).await.unwrap();
        assert!(other.allowed);
        assert_eq!(other.remaining, 2);
    }

    #[tokio::test]
    async fn test_fail_closed_refuses() {
        let decider = AdmissionDecider::new(Arc::new(DownStore));
        let result = decider.decide(CallerId(1), &policy(5, 60)).await;
        assert!(matches!(result, Err(AdmissionError::StoreUnavailable(_))));
    }

    #[tokio::test]
    async fn test_fail_open_admits_degraded() {
        let decider = AdmissionDecider::new(Arc::new(DownStore)).with_fail_policy(FailPolicy::Open);
        let decision = decider.decide(CallerId(1), &policy(5, 60)).await.unwrap();
        assert!(decision.allowed);
        assert!(decision.degraded);
        assert_eq!(decision.remaining, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_store_times_out() {
        let decider = AdmissionDecider::new(Arc::new(StalledStore))
            .with_store_timeout(Duration::from_millis(50));
        let result = decider.decide(CallerId(1), &policy(5, 60)).await;
        assert!(matches!(result, Err(AdmissionError::StoreUnavailable(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_does_not_count() {
        let decider = decider();
        let policy = policy(5, 60);
        let key = RateLimitKey::new(CallerId(3));

        let empty = decider.status(&key, &policy).await.unwrap();
        assert_eq!(empty.used, 0);
        assert_eq!(empty.remaining, 5);
        assert_eq!(empty.reset_after_secs, 0);

        decider.decide_key(&key, &policy).await.unwrap();
        decider.decide_key(&key, &policy).await.unwrap();
        tokio::time::advance(Duration::from_secs(10)).await;

        let status = decider.status(&key, &policy).await.unwrap();
        let again = decider.status(&key, &policy).await.unwrap();
        assert_eq!(status, again);
        assert_eq!(status.used, 2);
        assert_eq!(status.remaining, 3);
        assert_eq!(status.reset_after_secs, 50);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_follows_fail_policy() {
        let key = RateLimitKey::new(CallerId(4));
        let policy = policy(5, 60);

        let closed = AdmissionDecider::new(Arc::new(DownStore));
        assert!(matches!(
            closed.status(&key, &policy).await,
            Err(AdmissionError::StoreUnavailable(_))
        ));

        for store in [
            Arc::new(DownStore) as Arc<dyn CounterStore>,
            Arc::new(StalledStore) as Arc<dyn CounterStore>,
        ] {
            let open = AdmissionDecider::new(store)
                .with_fail_policy(FailPolicy::Open)
                .with_store_timeout(Duration::from_millis(50));
            let status = open.status(&key, &policy).await.unwrap();

            assert!(status.degraded);
            assert_eq!(status.remaining, 5);
            assert_eq!(status.used, 0);
        }
    }

    #[test]
    fn test_whole_seconds_rounds_up() {
        assert_eq!(whole_seconds(Duration::from_millis(59_001)), 60);
        assert_eq!(whole_seconds(Duration::from_secs(59)), 59);
        assert_eq!(whole_seconds(Duration::ZERO), 1);
    }
}
