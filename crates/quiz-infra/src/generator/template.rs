//! Offline question generator for local runs and tests.

use async_trait::async_trait;

use quiz_core::domain::{Question, QuizSpec};
use quiz_core::ports::{GeneratorError, QuestionGenerator};

/// Builds placeholder questions from the quiz request alone. Used when no AI provider
/// is configured, so the generation flow (and its rate limit) still works.
#[derive(Debug, Default, Clone)]
pub struct TemplateQuestionGenerator;

#[async_trait]
impl QuestionGenerator for TemplateQuestionGenerator {
    async fn generate(&self, spec: &QuizSpec) -> Result<Vec<Question>, GeneratorError> {
        let questions = (1..=spec.num_questions)
            .map(|n| Question {
                id: 0,
                title: format!(
                    "[{}] {} question {n} for a {} with {} years of experience",
                    spec.difficulty, spec.category, spec.role_type, spec.years_of_experience
                ),
                options: [
                    format!("{} option A", spec.category),
                    format!("{} option B", spec.category),
                    format!("{} option C", spec.category),
                    format!("{} option D", spec.category),
                ],
                right_answer: ((n - 1) % 4 + 1) as u8,
                difficulty: spec.difficulty,
                category: spec.category.clone(),
            })
            .collect();

        Ok(questions)
    }
}
