//! Caller identity resolution.

use std::sync::Arc;

use crate::error::AdmissionError;
use crate::ports::{AuthError, TokenService};

use super::CallerId;

/// Credentials found among an operation's arguments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Credentials<'a> {
    /// An explicit user id already known to the caller of the operation.
    pub caller_id: Option<i64>,
    /// Raw `Authorization` header value, e.g. `Bearer eyJ...`.
    pub authorization: Option<&'a str>,
}

/// Implemented by argument types of operations that can be admission-controlled.
pub trait CallerCredentials {
    fn credentials(&self) -> Credentials<'_>;
}

/// Turns credentials into a [`CallerId`].
///
/// An explicit id wins. Otherwise the bearer token is verified by the
/// [`TokenService`] and the id is read from its claims; nothing is ever read
/// from an unverified token.
#[derive(Clone)]
pub struct IdentityResolver {
    tokens: Arc<dyn TokenService>,
}

impl IdentityResolver {
    pub fn new(tokens: Arc<dyn TokenService>) -> Self {
        Self { tokens }
    }

    pub fn resolve(&self, credentials: &Credentials<'_>) -> Result<CallerId, AdmissionError> {
        if let Some(id) = credentials.caller_id {
            return Ok(CallerId(id));
        }

        let header = credentials
            .authorization
            .ok_or_else(|| AdmissionError::IdentityNotFound(AuthError::MissingAuth.to_string()))?;

        let token = bearer_token(header).ok_or_else(|| {
            AdmissionError::IdentityNotFound("expected a Bearer token".to_string())
        })?;

        let claims = self.tokens.validate_token(token).map_err(|e| {
            tracing::debug!(error = %e, "Rejected bearer credential");
            AdmissionError::IdentityNotFound(e.to_string())
        })?;

        Ok(CallerId(claims.user_id))
    }
}

/// Extract the token from a `Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
