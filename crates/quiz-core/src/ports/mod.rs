//! Ports - trait definitions for external dependencies.
//! These are the "interfaces" that infrastructure must implement.

mod auth;
mod counter_store;
mod question_generator;
mod repository;

pub use auth::{AuthError, PasswordService, TokenClaims, TokenService};
pub use counter_store::{CounterSnapshot, CounterStore, StoreError};
pub use question_generator::{GeneratorError, QuestionGenerator};
pub use repository::{BaseRepository, QuizRepository, UserRepository};
