//! Data Transfer Objects - request/response types for the API.
//!
//! Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};

/// Request to register a new user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterUserRequest {
    pub email: String,
    pub password: String,
}

/// Request to login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Response containing a user's public information.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub role: String,
    pub created_at: String,
}

/// Partial update of an account. Absent fields are left unchanged; only
/// admins may change a role.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Response containing an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub user: UserResponse,
}

/// Body of `POST /quiz/generate-with-ai`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateQuizRequest {
    pub category: String,
    pub difficulty_level: String,
    pub role_type: String,
    #[serde(default)]
    pub years_of_experience: u32,
    pub num_questions: u32,
    pub quiz_title: String,
}

/// A question as shown to quiz takers. Never carries the right answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub id: i64,
    pub question_title: String,
    pub option1: String,
    pub option2: String,
    pub option3: String,
    pub option4: String,
    pub difficulty_level: String,
    pub category: String,
}

/// Quiz listing entry without questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSummary {
    pub id: i64,
    pub title: String,
    pub question_count: usize,
    pub created_at: String,
}

/// Quiz with its questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResponse {
    pub id: i64,
    pub title: String,
    pub created_at: String,
    pub questions: Vec<QuestionView>,
}

/// One answer of a submission: question id and chosen option (1-4).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AnswerRequest {
    pub id: i64,
    pub response: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResponse {
    pub quiz_id: i64,
    pub score: u32,
    pub total: usize,
}

/// Generation quota of the caller in the current window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaResponse {
    pub limit: u32,
    pub used: u64,
    pub remaining: u32,
    pub reset_after_seconds: u64,
    /// Counters were unreachable and the limiter is failing open.
    #[serde(default)]
    pub degraded: bool,
}
