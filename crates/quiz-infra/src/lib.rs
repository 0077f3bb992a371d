//! # Quiz Infrastructure
//!
//! Concrete implementations of the ports defined in `quiz-core`:
//! counter stores, token and password services, question generators and
//! repositories.
//!
//! ## Feature Flags
//!
//! - `full` (default) - All features enabled
//! - `minimal` - No external dependencies, in-memory only
//! - `auth` - JWT + Argon2 authentication
//! - `redis` - Redis-backed counter store
//! - `gemini` - Gemini question generator over HTTP

pub mod counter;
pub mod generator;
pub mod repository;

#[cfg(feature = "auth")]
pub mod auth;

// Re-exports - In-Memory
pub use counter::InMemoryCounterStore;
pub use generator::TemplateQuestionGenerator;
pub use repository::{InMemoryQuizRepository, InMemoryUserRepository};

#[cfg(feature = "auth")]
pub use auth::{Argon2PasswordService, JwtConfig, JwtTokenService, PasswordConfig};

// Re-exports - Redis
#[cfg(feature = "redis")]
pub use counter::{RedisConfig, RedisCounterStore};

#[cfg(feature = "gemini")]
pub use generator::{GeminiConfig, GeminiQuestionGenerator};
