//! Rate limit policies.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AdmissionError;

/// Fixed-window quota: at most `max_requests` admissions per `window`.
///
/// Only constructible through [`RateLimitPolicy::new`], so a policy in hand is
/// always valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    max_requests: u32,
    window: Duration,
}

impl RateLimitPolicy {
    pub const DEFAULT_MAX_REQUESTS: u32 = 5;
    pub const DEFAULT_WINDOW_SECS: u64 = 60;

    pub fn new(max_requests: u32, window_secs: u64) -> Result<Self, AdmissionError> {
        if max_requests == 0 {
            return Err(AdmissionError::InvalidPolicy(
                "max_requests must be greater than zero".to_string(),
            ));
        }
        if window_secs == 0 {
            return Err(AdmissionError::InvalidPolicy(
                "window_secs must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            max_requests,
            window: Duration::from_secs(window_secs),
        })
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Apply a per-operation override. Unset fields keep this policy's values.
    pub fn with_override(&self, overrides: &PolicyOverride) -> Result<Self, AdmissionError> {
        Self::new(
            overrides.max_requests.unwrap_or(self.max_requests),
            overrides.window_secs.unwrap_or(self.window.as_secs()),
        )
    }
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max_requests: Self::DEFAULT_MAX_REQUESTS,
            window: Duration::from_secs(Self::DEFAULT_WINDOW_SECS),
        }
    }
}

impl fmt::Display for RateLimitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} per {}s", self.max_requests, self.window.as_secs())
    }
}

/// Per-operation adjustments to the global policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PolicyOverride {
    pub max_requests: Option<u32>,
    pub window_secs: Option<u64>,
}

/// What to do when the counter store cannot answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailPolicy {
    /// Admit the request and flag the decision as degraded.
    Open,
    /// Refuse the request with `StoreUnavailable`.
    #[default]
    Closed,
}

impl FromStr for FailPolicy {
    type Err = AdmissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(FailPolicy::Open),
            "closed" => Ok(FailPolicy::Closed),
            other => Err(AdmissionError::InvalidPolicy(format!(
                "fail policy must be `open` or `closed`, got `{other}`"
            ))),
        }
    }
}
