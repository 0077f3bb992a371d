//! Domain entities - the core business objects.

mod quiz;
mod user;

pub use quiz::{Answer, Difficulty, MAX_GENERATED_QUESTIONS, Question, Quiz, QuizSpec};
pub use user::{Role, User};
