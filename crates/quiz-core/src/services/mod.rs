//! Application services composed from ports.

mod quiz;

pub use quiz::{GenerateQuiz, GeneratedQuiz, QuizService, Submission};
