//! HTTP handlers and route configuration.

mod auth;
mod health;
mod quiz;
mod users;


use actix_web::web;

use crate::middleware::error::AppError;

/// Configure all application routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(health::health_check))
            .service(
                web::scope("/v1/auth")
                    .route("/register", web::post().to(auth::register))
                    .route("/login", web::post().to(auth::login))
                    .route("/me", web::get().to(auth::me)),
            )
            .service(
                web::scope("/v1/users")
                    .route("", web::get().to(users::list_users))
                    .route("/{id}", web::get().to(users::get_user))
                    .route("/{id}", web::put().to(users::update_user))
                    .route("/{id}", web::delete().to(users::delete_user)),
            ),
    )
    .service(
        web::scope("/quiz")
            .route("/generate-with-ai", web::post().to(quiz::generate_with_ai))
            .route("/rate-limit", web::get().to(quiz::rate_limit_status))
            .route("/user", web::get().to(quiz::user_quizzes))
            .route("/user/details", web::get().to(quiz::user_quiz_details))
            .route("/user/{id}", web::get().to(quiz::user_quiz))
            .route("/submit/{id}", web::post().to(quiz::submit)),
    );
}

/// Malformed JSON bodies become problem documents like every other error.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| AppError::BadRequest(err.to_string()).into())
}
