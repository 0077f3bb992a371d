//! Request admission: who is calling, and may they call right now.
//!
//! The pipeline is `credentials -> IdentityResolver -> CallerId ->
//! AdmissionDecider (CounterStore) -> AdmissionDecision`, packaged as a tower
//! [`AdmissionLayer`] that wraps any operation.

mod decider;
mod identity;
mod layer;
mod policy;

#[cfg(test)]
pub(crate) mod testing;

use std::fmt;

pub use decider::{AdmissionDecider, AdmissionDecision, QuotaStatus};
pub use identity::{CallerCredentials, Credentials, IdentityResolver, bearer_token};
pub use layer::{AdmissionLayer, AdmissionService, Admitted};
pub use policy::{FailPolicy, PolicyOverride, RateLimitPolicy};

/// Namespace prefix of every counter key.
pub const KEY_PREFIX: &str = "rate_limit";

/// The principal a request is attributed to for quota purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallerId(pub i64);

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Counter store key for one caller of one limiter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey(String);

impl RateLimitKey {
    /// `rate_limit:<caller>`
    pub fn new(caller: CallerId) -> Self {
        Self(format!("{KEY_PREFIX}:{caller}"))
    }

    /// `rate_limit:<scope>:<caller>`
    pub fn scoped(scope: &str, caller: CallerId) -> Self {
        Self(format!("{KEY_PREFIX}:{scope}:{caller}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
