//! JWT token service implementation (HS256).

use chrono::{TimeDelta, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use quiz_core::domain::Role;
use quiz_core::ports::{AuthError, TokenClaims, TokenService};

const DEV_SECRET: &str = "change-me-in-production";

/// JWT token service configuration.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub expiration_hours: i64,
    pub issuer: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: DEV_SECRET.to_string(),
            expiration_hours: 24,
            issuer: "quiz-platform".to_string(),
        }
    }
}

/// Wire format of the token payload.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    #[serde(rename = "userId")]
    user_id: i64,
    email: String,
    role: String,
    exp: i64,
    iat: i64,
    iss: String,
}

/// JWT-based token service.
pub struct JwtTokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    lifetime: TimeDelta,
}

impl JwtTokenService {
    /// Fails when `expiration_hours` is not positive or pushes `exp` past the
    /// representable date range.
    pub fn new(config: JwtConfig) -> Result<Self, AuthError> {
        let lifetime = Some(config.expiration_hours)
            .filter(|hours| *hours > 0)
            .and_then(TimeDelta::try_hours)
            .filter(|lifetime| Utc::now().checked_add_signed(*lifetime).is_some())
            .ok_or_else(|| {
                AuthError::Misconfigured(format!(
                    "token lifetime of {} hours is out of range",
                    config.expiration_hours
                ))
            })?;

        if config.secret == DEV_SECRET {
            tracing::warn!("Using default JWT secret. Set JWT_SECRET for production use.");
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            issuer: config.issuer,
            lifetime,
        })
    }
}

impl TokenService for JwtTokenService {
    fn generate_token(&self, user_id: i64, email: &str, role: Role) -> Result<String, AuthError> {
        let now = Utc::now();
        let exp = now.checked_add_signed(self.lifetime).ok_or_else(|| {
            AuthError::Misconfigured("token expiry overflows the date range".to_string())
        })?;

        let claims = Claims {
            sub: user_id.to_string(),
            user_id,
            email: email.to_string(),
            role: role.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }

    fn validate_token(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.issuer]);

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken(e.to_string()),
            })?
            .claims;

        let subject: i64 = claims
            .sub
            .parse()
            .map_err(|_| AuthError::InvalidToken("subject is not a user id".to_string()))?;
        if subject != claims.user_id {
            return Err(AuthError::InvalidToken(
                "subject and userId claims disagree".to_string(),
            ));
        }

        let role: Role = claims.role.parse().map_err(AuthError::InvalidToken)?;

        Ok(TokenClaims {
            user_id: subject,
            email: claims.email,
            role,
            exp: claims.exp,
        })
    }

    fn expiration_seconds(&self) -> i64 {
        self.lifetime.num_seconds()
    }
}
