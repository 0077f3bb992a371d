//! Gemini `generateContent` question generator.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use quiz_core::domain::{Question, QuizSpec};
use quiz_core::ports::{GeneratorError, QuestionGenerator};

/// Gemini provider configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    /// Default model and endpoint with a 30 second request timeout.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: "gemini-1.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Calls the Gemini REST API and parses the JSON array it is asked to return.
pub struct GeminiQuestionGenerator {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiQuestionGenerator {
    pub fn new(config: GeminiConfig) -> Result<Self, GeneratorError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GeneratorError::Request(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

/// One question as the model is asked to emit it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQuestion {
    question_title: String,
    option1: String,
    option2: String,
    option3: String,
    option4: String,
    right_answer: Value,
}

#[async_trait]
impl QuestionGenerator for GeminiQuestionGenerator {
    async fn generate(&self, spec: &QuizSpec) -> Result<Vec<Question>, GeneratorError> {
        let body = json!({
            "contents": [{ "parts": [{ "text": build_prompt(spec) }] }],
            "generationConfig": {
                "temperature": 0.2,
                "maxOutputTokens": 2048,
                "responseMimeType": "application/json"
            }
        });

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.config.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| GeneratorError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    tracing::debug!(error = %e, "Could not read provider error body");
                    String::new()
                }
            };
            tracing::warn!(status = status.as_u16(), "Question provider rejected request");
            return Err(GeneratorError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let reply: GenerateResponse = response
            .json()
            .await
            .map_err(|e| GeneratorError::Parse(e.to_string()))?;

        let text = reply
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or(GeneratorError::Empty)?;

        parse_questions(&text, spec)
    }
}

fn build_prompt(spec: &QuizSpec) -> String {
    format!(
        r#"Generate {count} multiple-choice questions about {category} for a {role} with {years} years of experience.
Difficulty level: {difficulty}

For each question, provide the question text, 4 options and the number (1-4) of the correct option.

Respond with only a JSON array of objects with these fields:
- questionTitle: the question text
- option1, option2, option3, option4: the options
- rightAnswer: the correct option (1-4)
- difficultyLevel: {difficulty}
- category: {category}

Example:
[{{"questionTitle": "What is the output of this code?", "option1": "10", "option2": "20", "option3": "30", "option4": "40", "rightAnswer": 2, "difficultyLevel": "{difficulty}", "category": "{category}"}}]"#,
        count = spec.num_questions,
        category = spec.category,
        role = spec.role_type,
        years = spec.years_of_experience,
        difficulty = spec.difficulty,
    )
}

/// Parse model output into questions, tolerating Markdown fences and letter
/// answers. Malformed entries are skipped.
fn parse_questions(text: &str, spec: &QuizSpec) -> Result<Vec<Question>, GeneratorError> {
    let raw: Vec<RawQuestion> = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| GeneratorError::Parse(e.to_string()))?;

    let questions: Vec<Question> = raw
        .into_iter()
        .filter_map(|q| {
            let Some(right_answer) = answer_index(&q.right_answer) else {
                tracing::warn!(answer = %q.right_answer, "Skipping question with unusable answer");
                return None;
            };
            Some(Question {
                id: 0,
                title: q.question_title,
                options: [q.option1, q.option2, q.option3, q.option4],
                right_answer,
                difficulty: spec.difficulty,
                category: spec.category.clone(),
            })
        })
        .collect();

    if questions.is_empty() {
        return Err(GeneratorError::Empty);
    }
    Ok(questions)
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag on the opening fence.
    let rest = rest.split_once('\n').map_or(rest, |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// `2`, `"2"`, `"B"` and `"option2"` all mean the second option.
fn answer_index(value: &Value) -> Option<u8> {
    let index = match value {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => {
            let s = s.trim();
            let s = s.strip_prefix("option").unwrap_or(s);
            match s.to_ascii_uppercase().as_str() {
                "A" => 1,
                "B" => 2,
                "C" => 3,
                "D" => 4,
                digits => digits.parse().ok()?,
            }
        }
        _ => return None,
    };
    (1..=4).contains(&index).then_some(index as u8)
}
