//! Application state - shared across all handlers.

use std::sync::Arc;
use std::time::Duration;

use quiz_core::admission::{AdmissionDecider, AdmissionLayer, IdentityResolver, RateLimitPolicy};
use quiz_core::error::AdmissionError;
use quiz_core::ports::{
    AuthError, CounterStore, GeneratorError, PasswordService, QuestionGenerator, StoreError,
    TokenService, UserRepository,
};
use quiz_core::services::QuizService;
use quiz_infra::{
    Argon2PasswordService, InMemoryCounterStore, InMemoryQuizRepository, InMemoryUserRepository,
    JwtTokenService, TemplateQuestionGenerator,
};

use crate::config::{AppConfig, CounterBackend};

/// How often expired in-memory counters are purged.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Anything that stops the server from starting.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("rate limit policy rejected: {0}")]
    Policy(#[from] AdmissionError),

    #[error("counter store unavailable: {0}")]
    Store(#[from] StoreError),

    #[error("authentication misconfigured: {0}")]
    Auth(#[from] AuthError),

    #[error("question generator misconfigured: {0}")]
    Generator(#[from] GeneratorError),
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub quizzes: QuizService,
    pub tokens: Arc<dyn TokenService>,
    pub passwords: Arc<dyn PasswordService>,
}

impl AppState {
    /// Build the application state. Invalid limits are fatal here so that a
    /// bad policy never reaches request time.
    pub async fn new(config: &AppConfig) -> Result<Self, StartupError> {
        let limits = &config.rate_limit;
        let global = RateLimitPolicy::new(limits.max_requests, limits.window_secs)?;
        let generation_policy = global.with_override(&limits.generation)?;

        let tokens: Arc<dyn TokenService> = Arc::new(JwtTokenService::new(config.jwt.clone())?);
        let passwords: Arc<dyn PasswordService> =
            Arc::new(Argon2PasswordService::new(config.password)?);

        let store = counter_store(config).await?;
        let decider = AdmissionDecider::new(store)
            .with_fail_policy(limits.fail_policy)
            .with_store_timeout(limits.store_timeout);
        let generation_limit = AdmissionLayer::new(
            IdentityResolver::new(tokens.clone()),
            decider,
            generation_policy,
        );

        let quizzes = QuizService::new(
            Arc::new(InMemoryQuizRepository::new()),
            question_generator(config)?,
            generation_limit,
        );

        tracing::info!(
            generation_limit = %generation_policy,
            fail_policy = ?limits.fail_policy,
            store_timeout_ms = limits.store_timeout.as_millis() as u64,
            "Application state initialized"
        );

        Ok(Self {
            users: Arc::new(InMemoryUserRepository::new()),
            quizzes,
            tokens,
            passwords,
        })
    }

    /// State over the given collaborators, for handler tests.
    #[cfg(test)]
    pub fn with_parts(
        quiz_repo: Arc<dyn quiz_core::ports::QuizRepository>,
        generator: Arc<dyn QuestionGenerator>,
        decider: AdmissionDecider,
        policy: RateLimitPolicy,
        tokens: Arc<dyn TokenService>,
    ) -> Self {
        let limit = AdmissionLayer::new(IdentityResolver::new(tokens.clone()), decider, policy);
        Self {
            users: Arc::new(InMemoryUserRepository::new()),
            quizzes: QuizService::new(quiz_repo, generator, limit),
            tokens,
            passwords: Arc::new(Argon2PasswordService::default()),
        }
    }
}

async fn counter_store(config: &AppConfig) -> Result<Arc<dyn CounterStore>, StartupError> {
    match config.rate_limit.backend {
        CounterBackend::Memory => Ok(memory_store()),
        #[cfg(feature = "redis")]
        CounterBackend::Redis => {
            match quiz_infra::RedisCounterStore::new(&config.redis).await {
                Ok(store) => {
                    tracing::info!("Using Redis counter store");
                    Ok(Arc::new(store))
                }
                Err(e) if config.redis.fallback_to_memory => {
                    tracing::error!(
                        error = %e,
                        "Redis unreachable, falling back to in-memory counters"
                    );
                    Ok(memory_store())
                }
                Err(e) => Err(e.into()),
            }
        }
        // Rejected by AppConfig::from_env.
        #[cfg(not(feature = "redis"))]
        CounterBackend::Redis => Err(StoreError::Unavailable(
            "redis support not compiled in".to_string(),
        )
        .into()),
    }
}

fn memory_store() -> Arc<dyn CounterStore> {
    let store = Arc::new(InMemoryCounterStore::new());
    store.spawn_sweeper(SWEEP_INTERVAL);
    tracing::info!("Using in-memory counter store");
    store
}

#[cfg_attr(not(feature = "gemini"), allow(unused_variables))]
fn question_generator(config: &AppConfig) -> Result<Arc<dyn QuestionGenerator>, StartupError> {
    #[cfg(feature = "gemini")]
    if let Some(gemini) = &config.gemini {
        tracing::info!(model = %gemini.model, "Using Gemini question generator");
        return Ok(Arc::new(quiz_infra::GeminiQuestionGenerator::new(gemini.clone())?));
    }

    tracing::warn!("GEMINI_API_KEY not set, using template question generator");
    Ok(Arc::new(TemplateQuestionGenerator))
}
