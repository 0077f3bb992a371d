//! Quiz handlers. Only AI generation is rate limited.

use actix_web::{HttpRequest, HttpResponse, web};

use quiz_core::domain::{Answer, Question, Quiz, QuizSpec};
use quiz_core::services::GenerateQuiz;
use quiz_shared::dto::{
    AnswerRequest, GenerateQuizRequest, QuestionView, QuizResponse, QuizSummary, QuotaResponse,
    ScoreResponse,
};

use crate::middleware::auth::{Identity, authorization};
use crate::middleware::error::{AppResult, RATE_LIMIT_DEGRADED, RATE_LIMIT_REMAINING};
use crate::state::AppState;

/// POST /quiz/generate-with-ai
///
/// The caller is identified from the bearer token by the admission layer,
/// not by an extractor, so identity failures are admission failures.
pub async fn generate_with_ai(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<GenerateQuizRequest>,
) -> AppResult<HttpResponse> {
    let body = body.into_inner();
    let spec = QuizSpec {
        title: body.quiz_title,
        category: body.category,
        difficulty: body.difficulty_level.parse()?,
        role_type: body.role_type,
        years_of_experience: body.years_of_experience,
        num_questions: body.num_questions,
    };

    let generated = state
        .quizzes
        .generate_with_ai(GenerateQuiz {
            authorization: authorization(&req).map(str::to_owned),
            caller_id: None,
            spec,
        })
        .await?;

    let mut response = HttpResponse::Created();
    response.insert_header((RATE_LIMIT_REMAINING, generated.remaining.to_string()));
    if generated.degraded {
        response.insert_header((RATE_LIMIT_DEGRADED, "true"));
    }
    Ok(response.json(quiz_response(&generated.quiz)))
}

/// GET /quiz/rate-limit
pub async fn rate_limit_status(
    state: web::Data<AppState>,
    identity: Identity,
) -> AppResult<HttpResponse> {
    let quota = state.quizzes.generation_quota(identity.user_id).await?;

    let mut response = HttpResponse::Ok();
    response.insert_header((RATE_LIMIT_REMAINING, quota.remaining.to_string()));
    if quota.degraded {
        response.insert_header((RATE_LIMIT_DEGRADED, "true"));
    }
    Ok(response.json(QuotaResponse {
        limit: quota.limit,
        used: quota.used,
        remaining: quota.remaining,
        reset_after_seconds: quota.reset_after_secs,
        degraded: quota.degraded,
    }))
}

/// GET /quiz/user
pub async fn user_quizzes(
    state: web::Data<AppState>,
    identity: Identity,
) -> AppResult<HttpResponse> {
    let quizzes = state.quizzes.quizzes_for_user(identity.user_id).await?;
    let summaries: Vec<QuizSummary> = quizzes
        .iter()
        .map(|quiz| QuizSummary {
            id: quiz.id,
            title: quiz.title.clone(),
            question_count: quiz.questions.len(),
            created_at: quiz.created_at.to_rfc3339(),
        })
        .collect();

    Ok(HttpResponse::Ok().json(summaries))
}

/// GET /quiz/user/details
pub async fn user_quiz_details(
    state: web::Data<AppState>,
    identity: Identity,
) -> AppResult<HttpResponse> {
    let quizzes = state.quizzes.quizzes_for_user(identity.user_id).await?;
    let details: Vec<QuizResponse> = quizzes.iter().map(quiz_response).collect();

    Ok(HttpResponse::Ok().json(details))
}

/// GET /quiz/user/{id}
pub async fn user_quiz(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<i64>,
) -> AppResult<HttpResponse> {
    let quiz = state
        .quizzes
        .quiz_for_user(path.into_inner(), identity.user_id)
        .await?;

    Ok(HttpResponse::Ok().json(quiz_response(&quiz)))
}

/// POST /quiz/submit/{id}
pub async fn submit(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<i64>,
    body: web::Json<Vec<AnswerRequest>>,
) -> AppResult<HttpResponse> {
    let quiz_id = path.into_inner();
    let answers: Vec<Answer> = body
        .iter()
        .map(|a| Answer {
            question_id: a.id,
            response: a.response,
        })
        .collect();

    let submission = state
        .quizzes
        .submit(quiz_id, identity.user_id, &answers)
        .await?;

    Ok(HttpResponse::Ok().json(ScoreResponse {
        quiz_id,
        score: submission.score,
        total: submission.total,
    }))
}

fn quiz_response(quiz: &Quiz) -> QuizResponse {
    QuizResponse {
        id: quiz.id,
        title: quiz.title.clone(),
        created_at: quiz.created_at.to_rfc3339(),
        questions: quiz.questions.iter().map(question_view).collect(),
    }
}

fn question_view(question: &Question) -> QuestionView {
    let [option1, option2, option3, option4] = question.options.clone();
    QuestionView {
        id: question.id,
        question_title: question.title.clone(),
        option1,
        option2,
        option3,
        option4,
        difficulty_level: question.difficulty.to_string(),
        category: question.category.clone(),
    }
}
