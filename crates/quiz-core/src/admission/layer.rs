//! Admission control as a tower middleware.
//!
//! Any service whose request type implements [`CallerCredentials`] and whose
//! error type converts from [`AdmissionError`] can be wrapped:
//!
//! ```ignore
//! let guarded = ServiceBuilder::new()
//!     .layer(admission_layer.clone())
//!     .service_fn(|admitted: Admitted<MyArgs>| async move { do_work(admitted).await });
//! let output = guarded.oneshot(args).await?;
//! ```
//!
//! The inner service only runs once identity is resolved and the decider has
//! admitted the call. Its output and errors pass through untouched.

use std::future::Future;
use std::ops::Deref;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tower::{Layer, Service};

use crate::error::AdmissionError;

use super::{
    AdmissionDecider, AdmissionDecision, CallerCredentials, CallerId, IdentityResolver,
    QuotaStatus, RateLimitKey, RateLimitPolicy,
};

/// Arguments of an admitted call together with who was admitted and how.
#[derive(Debug, Clone)]
pub struct Admitted<A> {
    pub caller: CallerId,
    pub decision: AdmissionDecision,
    pub args: A,
}

impl<A> Deref for Admitted<A> {
    type Target = A;

    fn deref(&self) -> &A {
        &self.args
    }
}

struct Guard {
    resolver: IdentityResolver,
    decider: AdmissionDecider,
    policy: RateLimitPolicy,
    scope: Option<String>,
}

impl Guard {
    fn key(&self, caller: CallerId) -> RateLimitKey {
        match &self.scope {
            Some(scope) => RateLimitKey::scoped(scope, caller),
            None => RateLimitKey::new(caller),
        }
    }
}

/// One limiter instance: a policy, a key namespace and the collaborators that
/// enforce it. Cheap to clone.
#[derive(Clone)]
pub struct AdmissionLayer {
    guard: Arc<Guard>,
}

impl AdmissionLayer {
    pub fn new(
        resolver: IdentityResolver,
        decider: AdmissionDecider,
        policy: RateLimitPolicy,
    ) -> Self {
        Self {
            guard: Arc::new(Guard {
                resolver,
                decider,
                policy,
                scope: None,
            }),
        }
    }

    /// Give this limiter its own key namespace (`rate_limit:<scope>:<id>`),
    /// so its budget is independent from other limiters.
    pub fn scoped(self, scope: impl Into<String>) -> Self {
        let guard = &self.guard;
        Self {
            guard: Arc::new(Guard {
                resolver: guard.resolver.clone(),
                decider: guard.decider.clone(),
                policy: guard.policy,
                scope: Some(scope.into()),
            }),
        }
    }

    /// Resolve the caller and count the call. Denials come back as
    /// `RateLimitExceeded`.
    pub async fn admit<A: CallerCredentials>(
        &self,
        args: &A,
    ) -> Result<(CallerId, AdmissionDecision), AdmissionError> {
        let caller = self.guard.resolver.resolve(&args.credentials())?;
        let decision = self.check(caller).await?;
        Ok((caller, decision))
    }

    /// Current window of a caller, without counting a request.
    pub async fn status(&self, caller: CallerId) -> Result<QuotaStatus, AdmissionError> {
        self.guard
            .decider
            .status(&self.guard.key(caller), &self.guard.policy)
            .await
    }

    async fn check(&self, caller: CallerId) -> Result<AdmissionDecision, AdmissionError> {
        let decision = self
            .guard
            .decider
            .decide_key(&self.guard.key(caller), &self.guard.policy)
            .await?;

        if !decision.allowed {
            return Err(AdmissionError::RateLimitExceeded {
                retry_after_secs: decision.retry_after_secs,
            });
        }
        Ok(decision)
    }
}

impl<S> Layer<S> for AdmissionLayer {
    type Service = AdmissionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AdmissionService {
            inner,
            layer: self.clone(),
        }
    }
}

/// Service produced by [`AdmissionLayer`].
#[derive(Clone)]
pub struct AdmissionService<S> {
    inner: S,
    layer: AdmissionLayer,
}

impl<S, A> Service<A> for AdmissionService<S>
where
    S: Service<Admitted<A>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: From<AdmissionError>,
    A: CallerCredentials + Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, args: A) -> Self::Future {
        // Resolve identity before boxing so the future does not borrow `args`.
        let caller = self.layer.guard.resolver.resolve(&args.credentials());

        let layer = self.layer.clone();
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let caller = match caller {
                Ok(caller) => caller,
                Err(e) => return Err(S::Error::from(e)),
            };
            let decision = match layer.check(caller).await {
                Ok(decision) => decision,
                Err(e) => return Err(S::Error::from(e)),
            };
            inner.call(Admitted { caller, decision, args }).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::Credentials;
    use crate::admission::testing::ClockStore;
    use crate::domain::Role;
    use crate::ports::{AuthError, TokenClaims, TokenService};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::{ServiceBuilder, ServiceExt};

    struct NoTokens;

    impl TokenService for NoTokens {
        fn generate_token(&self, _: i64, _: &str, _: Role) -> Result<String, AuthError> {
            Err(AuthError::InvalidCredentials)
        }

        fn validate_token(&self, _: &str) -> Result<TokenClaims, AuthError> {
            Err(AuthError::InvalidToken("signature mismatch".to_string()))
        }

        fn expiration_seconds(&self) -> i64 {
            0
        }
    }

    struct Args {
        caller_id: Option<i64>,
        authorization: Option<String>,
        payload: u32,
    }

    impl CallerCredentials for Args {
        fn credentials(&self) -> Credentials<'_> {
            Credentials {
                caller_id: self.caller_id,
                authorization: self.authorization.as_deref(),
            }
        }
    }

    #[derive(Debug, PartialEq)]
    enum OpError {
        Rejected(AdmissionError),
        Failed(&'static str),
    }

    impl From<AdmissionError> for OpError {
        fn from(e: AdmissionError) -> Self {
            OpError::Rejected(e)
        }
    }

    fn layer(max_requests: u32) -> AdmissionLayer {
        AdmissionLayer::new(
            IdentityResolver::new(Arc::new(NoTokens)),
            AdmissionDecider::new(Arc::new(ClockStore::default())),
            RateLimitPolicy::new(max_requests, 60).unwrap(),
        )
    }

    fn args(caller_id: Option<i64>) -> Args {
        Args {
            caller_id,
            authorization: None,
            payload: 21,
        }
    }

    #[tokio::test]
    async fn test_admitted_call_reaches_inner_unchanged() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let svc = ServiceBuilder::new()
            .layer(layer(2))
            .service_fn(move |admitted: Admitted<Args>| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, OpError>((admitted.caller, admitted.payload * 2))
                }
            });

        let (caller, output) = svc.oneshot(args(Some(9))).await.unwrap();
        assert_eq!(caller, CallerId(9));
        assert_eq!(output, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_inner_error_propagates() {
        let svc = ServiceBuilder::new()
            .layer(layer(2))
            .service_fn(|_: Admitted<Args>| async { Err::<(), _>(OpError::Failed("boom")) });

        assert_eq!(
            svc.oneshot(args(Some(1))).await,
            Err(OpError::Failed("boom"))
        );
    }

    #[tokio::test]
    async fn test_missing_identity_never_runs_inner() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let svc = ServiceBuilder::new()
            .layer(layer(5))
            .service_fn(move |_: Admitted<Args>| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, OpError>(())
                }
            });

        let unsigned = Args {
            caller_id: None,
            authorization: Some("Bearer header.payload.sig".to_string()),
            payload: 0,
        };
        let result = svc.clone().oneshot(unsigned).await;
        assert!(matches!(
            result,
            Err(OpError::Rejected(AdmissionError::IdentityNotFound(_)))
        ));

        let result = svc.oneshot(args(None)).await;
        assert!(matches!(
            result,
            Err(OpError::Rejected(AdmissionError::IdentityNotFound(_)))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_denied_call_never_runs_inner() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let svc = ServiceBuilder::new()
            .layer(layer(2))
            .service_fn(move |_: Admitted<Args>| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, OpError>(())
                }
            });

        for _ in 0..2 {
            svc.clone().oneshot(args(Some(5))).await.unwrap();
        }
        let third = svc.oneshot(args(Some(5))).await;
        assert!(matches!(
            third,
            Err(OpError::Rejected(AdmissionError::RateLimitExceeded { retry_after_secs })) if retry_after_secs > 0
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_scoped_limiters_have_separate_budgets() {
        let store: Arc<ClockStore> = Arc::new(ClockStore::default());
        let resolver = IdentityResolver::new(Arc::new(NoTokens));
        let decider = AdmissionDecider::new(store);
        let policy = RateLimitPolicy::new(1, 60).unwrap();

        let generate = AdmissionLayer::new(resolver.clone(), decider.clone(), policy).scoped("generate");
        let export = AdmissionLayer::new(resolver, decider, policy).scoped("export");

        assert!(generate.admit(&args(Some(1))).await.is_ok());
        assert!(export.admit(&args(Some(1))).await.is_ok());
        assert!(generate.admit(&args(Some(1))).await.is_err());
    }

    #[tokio::test]
    async fn test_status_reflects_admissions() {
        let layer = layer(3);
        layer.admit(&args(Some(8))).await.unwrap();

        let status = layer.status(CallerId(8)).await.unwrap();
        assert_eq!(status.used, 1);
        assert_eq!(status.remaining, 2);
        assert_eq!(status.limit, 3);
    }
}
