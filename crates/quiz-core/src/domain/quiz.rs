use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Upper bound on questions requested from the generator in one call.
pub const MAX_GENERATED_QUESTIONS: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "EASY",
            Difficulty::Medium => "MEDIUM",
            Difficulty::Hard => "HARD",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EASY" => Ok(Difficulty::Easy),
            "MEDIUM" => Ok(Difficulty::Medium),
            "HARD" => Ok(Difficulty::Hard),
            other => Err(DomainError::Validation(format!(
                "difficulty must be EASY, MEDIUM or HARD, got `{other}`"
            ))),
        }
    }
}

/// What the caller asked the question generator for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizSpec {
    pub title: String,
    pub category: String,
    pub difficulty: Difficulty,
    /// Target audience, e.g. `JAVA_DEVELOPER`.
    pub role_type: String,
    pub years_of_experience: u32,
    pub num_questions: u32,
}

impl QuizSpec {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.title.trim().is_empty() {
            return Err(DomainError::Validation("quiz title must not be empty".into()));
        }
        if self.category.trim().is_empty() {
            return Err(DomainError::Validation("category must not be empty".into()));
        }
        if self.num_questions == 0 || self.num_questions > MAX_GENERATED_QUESTIONS {
            return Err(DomainError::Validation(format!(
                "numQuestions must be between 1 and {MAX_GENERATED_QUESTIONS}"
            )));
        }
        Ok(())
    }
}

/// A multiple-choice question with four options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub title: String,
    pub options: [String; 4],
    /// 1-based index into `options`.
    pub right_answer: u8,
    pub difficulty: Difficulty,
    pub category: String,
}

/// A submitted answer: the chosen 1-based option for one question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub question_id: i64,
    pub response: u8,
}

/// Quiz entity. `id == 0` means not yet persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,
    pub title: String,
    pub user_id: i64,
    pub questions: Vec<Question>,
    pub created_at: DateTime<Utc>,
}

impl Quiz {
    pub fn new(title: String, user_id: i64, questions: Vec<Question>) -> Self {
        Self {
            id: 0,
            title,
            user_id,
            questions,
            created_at: Utc::now(),
        }
    }

    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.user_id == user_id
    }

    /// Count correct answers. Each question scores at most once; answers to
    /// questions outside this quiz are rejected.
    pub fn score(&self, answers: &[Answer]) -> Result<u32, DomainError> {
        let mut answered = HashSet::new();
        let mut right = 0;

        for answer in answers {
            let question = self
                .questions
                .iter()
                .find(|q| q.id == answer.question_id)
                .ok_or_else(|| {
                    DomainError::Validation(format!(
                        "question {} is not part of quiz {}",
                        answer.question_id, self.id
                    ))
                })?;

            if answered.insert(question.id) && question.right_answer == answer.response {
                right += 1;
            }
        }

        Ok(right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: i64, right_answer: u8) -> Question {
        Question {
            id,
            title: format!("Question {id}"),
            options: ["a".into(), "b".into(), "c".into(), "d".into()],
            right_answer,
            difficulty: Difficulty::Easy,
            category: "rust".into(),
        }
    }

    fn spec(num_questions: u32) -> QuizSpec {
        QuizSpec {
            title: "Ownership".into(),
            category: "rust".into(),
            difficulty: Difficulty::Medium,
            role_type: "RUST_DEVELOPER".into(),
            years_of_experience: 3,
            num_questions,
        }
    }

    #[test]
    fn test_score_counts_each_question_once() {
        let quiz = Quiz::new("t".into(), 1, vec![question(1, 2), question(2, 4)]);
        let answers = [
            Answer { question_id: 1, response: 2 },
            Answer { question_id: 1, response: 2 },
            Answer { question_id: 2, response: 1 },
        ];
        assert_eq!(quiz.score(&answers).unwrap(), 1);
    }

    #[test]
    fn test_score_rejects_foreign_question() {
        let quiz = Quiz::new("t".into(), 1, vec![question(1, 2)]);
        let result = quiz.score(&[Answer { question_id: 9, response: 1 }]);
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_spec_validation_bounds() {
        assert!(spec(1).validate().is_ok());
        assert!(spec(MAX_GENERATED_QUESTIONS).validate().is_ok());
        assert!(spec(0).validate().is_err());
        assert!(spec(MAX_GENERATED_QUESTIONS + 1).validate().is_err());
    }

    #[test]
    fn test_difficulty_parse() {
        assert_eq!(" hard ".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert!("impossible".parse::<Difficulty>().is_err());
    }
}
