//! Application configuration loaded from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use quiz_core::admission::{AdmissionDecider, FailPolicy, PolicyOverride, RateLimitPolicy};
use quiz_infra::{JwtConfig, PasswordConfig};

#[cfg(feature = "redis")]
use quiz_infra::RedisConfig;

#[cfg(feature = "gemini")]
use quiz_infra::GeminiConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value `{value}` for {name}")]
    Invalid { name: &'static str, value: String },

    #[error("{0} must be set in production")]
    Missing(&'static str),

    #[error("{0}")]
    Unsupported(String),
}

/// Where request counters live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterBackend {
    Memory,
    Redis,
}

impl FromStr for CounterBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(CounterBackend::Memory),
            "redis" => Ok(CounterBackend::Redis),
            other => Err(other.to_string()),
        }
    }
}

/// Rate limiting settings. Values are validated when the limiter is built.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_secs: u64,
    pub fail_policy: FailPolicy,
    pub store_timeout: Duration,
    pub backend: CounterBackend,
    /// Override applied to `POST /quiz/generate-with-ai`.
    pub generation: PolicyOverride,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub rate_limit: RateLimitConfig,
    pub jwt: JwtConfig,
    pub password: PasswordConfig,
    #[cfg(feature = "redis")]
    pub redis: RedisConfig,
    /// `None` runs the offline template generator.
    #[cfg(feature = "gemini")]
    pub gemini: Option<GeminiConfig>,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Load configuration from any variable source. Every numeric or boolean
    /// setting is parsed strictly: unset takes the default, garbage is an error.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars = Vars(lookup);
        let backend = vars.parse_or("RATE_LIMIT_BACKEND", CounterBackend::Memory)?;

        #[cfg(not(feature = "redis"))]
        if backend == CounterBackend::Redis {
            return Err(ConfigError::Unsupported(
                "RATE_LIMIT_BACKEND=redis requires the `redis` feature".to_string(),
            ));
        }

        let rate_limit = RateLimitConfig {
            max_requests: vars
                .parse_or("RATE_LIMIT_MAX_REQUESTS", RateLimitPolicy::DEFAULT_MAX_REQUESTS)?,
            window_secs: vars
                .parse_or("RATE_LIMIT_WINDOW_SECS", RateLimitPolicy::DEFAULT_WINDOW_SECS)?,
            fail_policy: vars.parse_or("RATE_LIMIT_FAIL_POLICY", FailPolicy::default())?,
            store_timeout: Duration::from_millis(vars.parse_or(
                "RATE_LIMIT_STORE_TIMEOUT_MS",
                AdmissionDecider::DEFAULT_STORE_TIMEOUT.as_millis() as u64,
            )?),
            backend,
            generation: PolicyOverride {
                max_requests: vars.parse_opt("GENERATE_QUIZ_RATE_LIMIT_MAX")?,
                window_secs: vars.parse_opt("GENERATE_QUIZ_RATE_LIMIT_WINDOW_SECS")?,
            },
        };

        Ok(Self {
            host: vars.string("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: vars.parse_or("PORT", 8080)?,
            rate_limit,
            jwt: jwt_config(&vars)?,
            password: password_config(&vars)?,
            #[cfg(feature = "redis")]
            redis: redis_config(&vars)?,
            #[cfg(feature = "gemini")]
            gemini: gemini_config(&vars)?,
        })
    }
}

fn jwt_config<F: Fn(&str) -> Option<String>>(vars: &Vars<F>) -> Result<JwtConfig, ConfigError> {
    let defaults = JwtConfig::default();
    let secret = vars.string("JWT_SECRET");

    if secret.is_none() {
        let production = vars
            .string("RUST_ENV")
            .is_some_and(|v| v == "production" || v == "prod");
        if production {
            return Err(ConfigError::Missing("JWT_SECRET"));
        }
    }

    Ok(JwtConfig {
        secret: secret.unwrap_or(defaults.secret),
        expiration_hours: vars.parse_or("JWT_EXPIRATION_HOURS", defaults.expiration_hours)?,
        issuer: vars.string("JWT_ISSUER").unwrap_or(defaults.issuer),
    })
}

fn password_config<F: Fn(&str) -> Option<String>>(
    vars: &Vars<F>,
) -> Result<PasswordConfig, ConfigError> {
    let defaults = PasswordConfig::default();
    Ok(PasswordConfig {
        memory_kib: vars.parse_or("ARGON2_MEMORY_KIB", defaults.memory_kib)?,
        iterations: vars.parse_or("ARGON2_ITERATIONS", defaults.iterations)?,
        parallelism: vars.parse_or("ARGON2_PARALLELISM", defaults.parallelism)?,
    })
}

#[cfg(feature = "redis")]
fn redis_config<F: Fn(&str) -> Option<String>>(
    vars: &Vars<F>,
) -> Result<RedisConfig, ConfigError> {
    let defaults = RedisConfig::default();
    Ok(RedisConfig {
        url: vars.string("REDIS_URL").unwrap_or(defaults.url),
        connect_timeout: vars
            .parse_opt("REDIS_CONNECT_TIMEOUT_SECS")?
            .map_or(defaults.connect_timeout, Duration::from_secs),
        fallback_to_memory: vars.flag("REDIS_FALLBACK_TO_MEMORY", defaults.fallback_to_memory)?,
    })
}

/// `None` when `GEMINI_API_KEY` is unset or empty.
#[cfg(feature = "gemini")]
fn gemini_config<F: Fn(&str) -> Option<String>>(
    vars: &Vars<F>,
) -> Result<Option<GeminiConfig>, ConfigError> {
    let Some(api_key) = vars.string("GEMINI_API_KEY").filter(|k| !k.is_empty()) else {
        return Ok(None);
    };

    let mut config = GeminiConfig::new(api_key);
    if let Some(model) = vars.string("GEMINI_MODEL") {
        config.model = model;
    }
    if let Some(base_url) = vars.string("GEMINI_BASE_URL") {
        config.base_url = base_url;
    }
    if let Some(secs) = vars.parse_opt("GEMINI_TIMEOUT_SECS")? {
        config.timeout = Duration::from_secs(secs);
    }
    Ok(Some(config))
}

/// Variable source plus strict parsers over it.
struct Vars<F>(F);

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.0)(name)
    }

    /// Parse an optional variable. Unset is fine, garbage is not.
    fn parse_opt<T: FromStr>(&self, name: &'static str) -> Result<Option<T>, ConfigError> {
        match self.string(name) {
            Some(value) => value
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| ConfigError::Invalid { name, value }),
            None => Ok(None),
        }
    }

    fn parse_or<T: FromStr>(&self, name: &'static str, default: T) -> Result<T, ConfigError> {
        Ok(self.parse_opt(name)?.unwrap_or(default))
    }

    fn flag(&self, name: &'static str, default: bool) -> Result<bool, ConfigError> {
        let Some(value) = self.string(name) else {
            return Ok(default);
        };
        match value.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(ConfigError::Invalid { name, value }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_vars(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_counter_backend_parse() {
        assert_eq!("Redis".parse::<CounterBackend>(), Ok(CounterBackend::Redis));
        assert_eq!("memory".parse::<CounterBackend>(), Ok(CounterBackend::Memory));
        assert!("memcached".parse::<CounterBackend>().is_err());
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = load(&[]).unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.rate_limit.max_requests, RateLimitPolicy::DEFAULT_MAX_REQUESTS);
        assert_eq!(config.rate_limit.backend, CounterBackend::Memory);
        assert_eq!(config.jwt.expiration_hours, 24);
        assert_eq!(config.password.iterations, PasswordConfig::default().iterations);
    }

    #[test]
    fn test_reads_auth_settings() {
        let config = load(&[
            ("JWT_SECRET", "s3cret"),
            ("JWT_EXPIRATION_HOURS", " 2 "),
            ("ARGON2_ITERATIONS", "3"),
            ("ARGON2_MEMORY_KIB", "8192"),
        ])
        .unwrap();

        assert_eq!(config.jwt.secret, "s3cret");
        assert_eq!(config.jwt.expiration_hours, 2);
        assert_eq!(config.password.iterations, 3);
        assert_eq!(config.password.memory_kib, 8192);
    }

    #[test]
    fn test_rejects_garbage_values() {
        for (name, value) in [
            ("JWT_EXPIRATION_HOURS", "twenty-four"),
            ("ARGON2_MEMORY_KIB", "lots"),
            ("ARGON2_PARALLELISM", "-1"),
            ("RATE_LIMIT_MAX_REQUESTS", "5x"),
            ("PORT", "http"),
        ] {
            match load(&[(name, value)]) {
                Err(ConfigError::Invalid { name: got, value: v }) => {
                    assert_eq!(got, name);
                    assert_eq!(v, value);
                }
                other => panic!("{name}={value} should be rejected, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_production_requires_jwt_secret() {
        assert!(matches!(
            load(&[("RUST_ENV", "production")]),
            Err(ConfigError::Missing("JWT_SECRET"))
        ));
        assert!(load(&[("RUST_ENV", "production"), ("JWT_SECRET", "x")]).is_ok());
    }

    #[cfg(feature = "redis")]
    #[test]
    fn test_redis_settings_are_strict() {
        let config = load(&[
            ("REDIS_CONNECT_TIMEOUT_SECS", "2"),
            ("REDIS_FALLBACK_TO_MEMORY", "1"),
        ])
        .unwrap();
        assert_eq!(config.redis.connect_timeout, Duration::from_secs(2));
        assert!(config.redis.fallback_to_memory);

        assert!(matches!(
            load(&[("REDIS_FALLBACK_TO_MEMORY", "maybe")]),
            Err(ConfigError::Invalid { name: "REDIS_FALLBACK_TO_MEMORY", .. })
        ));
        assert!(matches!(
            load(&[("REDIS_CONNECT_TIMEOUT_SECS", "5s")]),
            Err(ConfigError::Invalid { name: "REDIS_CONNECT_TIMEOUT_SECS", .. })
        ));
    }

    #[cfg(feature = "gemini")]
    #[test]
    fn test_gemini_settings() {
        assert!(load(&[]).unwrap().gemini.is_none());

        let config = load(&[("GEMINI_API_KEY", "k"), ("GEMINI_TIMEOUT_SECS", "10")]).unwrap();
        let gemini = config.gemini.unwrap();
        assert_eq!(gemini.api_key, "k");
        assert_eq!(gemini.timeout, Duration::from_secs(10));

        assert!(matches!(
            load(&[("GEMINI_API_KEY", "k"), ("GEMINI_TIMEOUT_SECS", "soon")]),
            Err(ConfigError::Invalid { name: "GEMINI_TIMEOUT_SECS", .. })
        ));
    }
}
