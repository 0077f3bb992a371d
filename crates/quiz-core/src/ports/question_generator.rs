//! Question generation port - the external content provider.

use async_trait::async_trait;

use crate::domain::{Question, QuizSpec};

/// Produces multiple-choice questions for a quiz spec.
///
/// Calls are expensive (a remote model invocation), which is why quiz
/// generation sits behind the admission layer.
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    /// Generate up to `spec.num_questions` questions. Returned ids are
    /// provisional; the quiz repository assigns the final ones.
    async fn generate(&self, spec: &QuizSpec) -> Result<Vec<Question>, GeneratorError>;
}

#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("Provider request failed: {0}")]
    Request(String),

    #[error("Provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Could not parse provider output: {0}")]
    Parse(String),

    #[error("Provider returned no questions")]
    Empty,
}
