//! Quiz use cases.

use std::sync::Arc;

use tower::{ServiceBuilder, ServiceExt};

use crate::admission::{
    AdmissionLayer, Admitted, CallerCredentials, CallerId, Credentials, QuotaStatus,
};
use crate::domain::{Answer, Quiz, QuizSpec};
use crate::error::DomainError;
use crate::ports::{GeneratorError, QuestionGenerator, QuizRepository};

/// Arguments of AI-backed quiz generation.
#[derive(Debug, Clone)]
pub struct GenerateQuiz {
    pub authorization: Option<String>,
    pub caller_id: Option<i64>,
    pub spec: QuizSpec,
}

impl CallerCredentials for GenerateQuiz {
    fn credentials(&self) -> Credentials<'_> {
        Credentials {
            caller_id: self.caller_id,
            authorization: self.authorization.as_deref(),
        }
    }
}

/// Result of scoring a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submission {
    pub score: u32,
    /// Questions in the quiz, answered or not.
    pub total: usize,
}

/// A freshly generated and stored quiz, plus the caller's remaining budget.
#[derive(Debug, Clone)]
pub struct GeneratedQuiz {
    pub quiz: Quiz,
    pub remaining: u32,
    pub degraded: bool,
}

#[derive(Clone)]
pub struct QuizService {
    quizzes: Arc<dyn QuizRepository>,
    generator: Arc<dyn QuestionGenerator>,
    generation_limit: AdmissionLayer,
}

impl QuizService {
    pub fn new(
        quizzes: Arc<dyn QuizRepository>,
        generator: Arc<dyn QuestionGenerator>,
        generation_limit: AdmissionLayer,
    ) -> Self {
        Self {
            quizzes,
            generator,
            generation_limit,
        }
    }

    /// Generate questions with the external provider and store them as a new
    /// quiz owned by the caller. Runs behind the generation rate limit.
    pub async fn generate_with_ai(&self, request: GenerateQuiz) -> Result<GeneratedQuiz, DomainError> {
        let quizzes = self.quizzes.clone();
        let generator = self.generator.clone();

        ServiceBuilder::new()
            .layer(self.generation_limit.clone())
            .service_fn(move |admitted: Admitted<GenerateQuiz>| {
                let quizzes = quizzes.clone();
                let generator = generator.clone();
                async move { generate(generator, quizzes, admitted).await }
            })
            .oneshot(request)
            .await
    }

    /// Generation quota of a caller, without spending any of it.
    pub async fn generation_quota(&self, user_id: i64) -> Result<QuotaStatus, DomainError> {
        Ok(self.generation_limit.status(CallerId(user_id)).await?)
    }

    /// All quizzes of a user, newest first.
    pub async fn quizzes_for_user(&self, user_id: i64) -> Result<Vec<Quiz>, DomainError> {
        Ok(self.quizzes.find_by_user_id(user_id).await?)
    }

    pub async fn quiz_for_user(&self, quiz_id: i64, user_id: i64) -> Result<Quiz, DomainError> {
        let quiz = self
            .quizzes
            .find_by_id(quiz_id)
            .await?
            .ok_or(DomainError::NotFound {
                entity_type: "Quiz",
                id: quiz_id,
            })?;

        if !quiz.is_owned_by(user_id) {
            tracing::warn!(quiz_id, user_id, "Quiz accessed by non-owner");
            return Err(DomainError::Forbidden("quiz"));
        }
        Ok(quiz)
    }

    /// Score a submission against the quiz's answer key.
    pub async fn submit(
        &self,
        quiz_id: i64,
        user_id: i64,
        answers: &[Answer],
    ) -> Result<Submission, DomainError> {
        let quiz = self.quiz_for_user(quiz_id, user_id).await?;
        let score = quiz.score(answers)?;
        tracing::debug!(quiz_id, user_id, score, "Scored submission");
        Ok(Submission {
            score,
            total: quiz.questions.len(),
        })
    }
}

async fn generate(
    generator: Arc<dyn QuestionGenerator>,
    quizzes: Arc<dyn QuizRepository>,
    admitted: Admitted<GenerateQuiz>,
) -> Result<GeneratedQuiz, DomainError> {
    let Admitted {
        caller,
        decision,
        args,
    } = admitted;
    args.spec.validate()?;

    let mut questions = generator.generate(&args.spec).await?;
    questions.truncate(args.spec.num_questions as usize);
    if questions.is_empty() {
        return Err(GeneratorError::Empty.into());
    }

    let quiz = quizzes
        .save(Quiz::new(args.spec.title.clone(), caller.0, questions))
        .await?;

    tracing::info!(
        quiz_id = quiz.id,
        user_id = caller.0,
        questions = quiz.questions.len(),
        remaining = decision.remaining,
        "Generated quiz"
    );

    Ok(GeneratedQuiz {
        quiz,
        remaining: decision.remaining,
        degraded: decision.degraded,
    })
}
