//! Domain-level error types.

use thiserror::Error;

use crate::ports::GeneratorError;

/// Domain errors - business logic failures.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: &'static str, id: i64 },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Duplicate entity: {0}")]
    Duplicate(String),

    #[error("Access to {0} denied")]
    Forbidden(&'static str),

    #[error(transparent)]
    Admission(#[from] AdmissionError),

    #[error("Question generation failed: {0}")]
    Generation(#[from] GeneratorError),

    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Reasons a call is refused before it reaches business logic.
///
/// None of these variants carry transport vocabulary; the serving layer decides
/// how each one is presented to the caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AdmissionError {
    /// No usable credential, or a credential that failed verification.
    #[error("Caller identity not found: {0}")]
    IdentityNotFound(String),

    #[error("Rate limit exceeded. Try again in {retry_after_secs} seconds.")]
    RateLimitExceeded { retry_after_secs: u64 },

    /// The counter store could not be reached within the configured bound.
    #[error("Rate limit store unavailable: {0}")]
    StoreUnavailable(String),

    /// Misconfiguration. Only produced while building policies at startup.
    #[error("Invalid rate limit policy: {0}")]
    InvalidPolicy(String),
}

/// Repository-level errors.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Storage backend failed: {0}")]
    Backend(String),

    #[error("Entity not found")]
    NotFound,

    #[error("Constraint violation: {0}")]
    Constraint(String),
}
