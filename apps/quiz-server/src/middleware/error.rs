//! Error handling - RFC 7807 problem responses.
//!
//! This is the only place where domain and admission errors turn into HTTP
//! status codes and headers.

use std::fmt;

use actix_web::{HttpResponse, ResponseError, http::StatusCode};

use quiz_core::error::{AdmissionError, DomainError, RepoError};
use quiz_core::ports::AuthError;
use quiz_shared::ErrorResponse;

/// Header carrying the caller's remaining requests in the current window.
pub const RATE_LIMIT_REMAINING: &str = "X-RateLimit-Remaining";

/// Set when the counter store was unreachable and the limiter failed open.
pub const RATE_LIMIT_DEGRADED: &str = "X-RateLimit-Degraded";

/// Application-level error type that converts to RFC 7807 responses.
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    Forbidden,
    Conflict(String),
    TooManyRequests { retry_after: u64 },
    ServiceUnavailable(String),
    BadGateway(String),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::Forbidden => write!(f, "Forbidden"),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::TooManyRequests { retry_after } => write!(
                f,
                "Rate limit exceeded. Try again in {} seconds.",
                retry_after
            ),
            AppError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            AppError::BadGateway(msg) => write!(f, "Bad gateway: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut response = HttpResponse::build(self.status_code());

        let error = match self {
            AppError::NotFound(detail) => ErrorResponse::not_found(detail),
            AppError::BadRequest(detail) => ErrorResponse::bad_request(detail),
            AppError::Unauthorized(detail) => ErrorResponse::unauthorized().with_detail(detail),
            AppError::Forbidden => ErrorResponse::forbidden(),
            AppError::Conflict(detail) => ErrorResponse::conflict(detail),
            AppError::TooManyRequests { retry_after } => {
                response
                    .insert_header(("Retry-After", retry_after.to_string()))
                    .insert_header((RATE_LIMIT_REMAINING, "0"));
                ErrorResponse::too_many_requests(*retry_after, self.to_string())
            }
            AppError::ServiceUnavailable(_) => ErrorResponse::service_unavailable(
                "Rate limiting is temporarily unavailable. Please retry shortly.",
            ),
            AppError::BadGateway(_) => {
                ErrorResponse::bad_gateway("The question generator could not be used.")
            }
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                ErrorResponse::internal_error()
            }
        };

        response.json(error)
    }
}

impl From<AdmissionError> for AppError {
    fn from(err: AdmissionError) -> Self {
        match err {
            AdmissionError::IdentityNotFound(msg) => AppError::Unauthorized(msg),
            AdmissionError::RateLimitExceeded { retry_after_secs } => {
                tracing::info!(retry_after_secs, "Request rejected by rate limit");
                AppError::TooManyRequests {
                    retry_after: retry_after_secs,
                }
            }
            AdmissionError::StoreUnavailable(msg) => AppError::ServiceUnavailable(msg),
            AdmissionError::InvalidPolicy(msg) => AppError::Internal(msg),
        }
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound { entity_type, id } => {
                AppError::NotFound(format!("{} with id {} not found", entity_type, id))
            }
            DomainError::Validation(msg) => AppError::BadRequest(msg),
            DomainError::Duplicate(msg) => AppError::Conflict(msg),
            DomainError::Forbidden(_) => AppError::Forbidden,
            DomainError::Admission(e) => e.into(),
            DomainError::Generation(e) => {
                tracing::warn!(error = %e, "Question generation failed");
                AppError::BadGateway(e.to_string())
            }
            DomainError::Repo(e) => e.into(),
        }
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => AppError::NotFound("Resource not found".to_string()),
            RepoError::Constraint(msg) => AppError::Conflict(msg),
            RepoError::Backend(msg) => {
                tracing::error!("Repository error: {}", msg);
                AppError::Internal("Storage error".to_string())
            }
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InsufficientPermissions => AppError::Forbidden,
            AuthError::HashingError(msg) | AuthError::Misconfigured(msg) => AppError::Internal(msg),
            other => AppError::Unauthorized(other.to_string()),
        }
    }
}

/// Result type alias for handlers.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[actix_rt::test]
    async fn test_rate_limit_response_shape() {
        let err = AppError::from(AdmissionError::RateLimitExceeded {
            retry_after_secs: 59,
        });
        let response = err.error_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("Retry-After").unwrap(), "59");
        assert_eq!(response.headers().get(RATE_LIMIT_REMAINING).unwrap(), "0");

        let body = to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], 429);
        assert_eq!(json["retry_after"], 59);
        assert_eq!(json["detail"], "Rate limit exceeded. Try again in 59 seconds.");
    }

    #[test]
    fn test_admission_status_mapping() {
        let status = |e: AdmissionError| AppError::from(e).status_code();

        assert_eq!(
            status(AdmissionError::IdentityNotFound("missing".into())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status(AdmissionError::StoreUnavailable("timeout".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status(AdmissionError::InvalidPolicy("zero".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_wrapped_admission_errors_keep_their_status() {
        let err = AppError::from(DomainError::from(AdmissionError::RateLimitExceeded {
            retry_after_secs: 3,
        }));
        assert!(matches!(err, AppError::TooManyRequests { retry_after: 3 }));

        let err = AppError::from(DomainError::Forbidden("quiz"));
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[actix_rt::test]
    async fn test_store_outage_hides_internals() {
        let response =
            AppError::from(AdmissionError::StoreUnavailable("10.0.0.3:6379 refused".into()))
                .error_response();

        let body = to_bytes(response.into_body()).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(!text.contains("10.0.0.3"));
    }
}
