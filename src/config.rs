use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub scoring: ScoringConfig,
    pub orchestrator: OrchestratorConfig,
    pub guardrails: GuardrailConfig,
    pub vector_service: VectorServiceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
}

/// Scoring weights are externally tunable, not fixed constants.
/// Defaults reconstructed to match the 0-100% UI display and the 30%
/// viability threshold.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    /// Blend weight of the harmony (personality/values) aggregate.
    pub harmony_weight: f64,
    /// Blend weight of the context (logistics) aggregate.
    pub context_weight: f64,
    /// Additive context bonus when both candidates share a campus city.
    pub same_city_bonus: f64,
    /// Additive context bonus when both candidates share an institution.
    pub same_institution_bonus: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    /// Pairs scoring below this overall value are discarded.
    pub min_viability: f64,
    /// Max suggestions persisted per run.
    pub top_n: usize,
    /// Cohort size requested from the repository.
    pub cohort_limit: usize,
    /// Suggestion lifetime in hours.
    pub expiry_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GuardrailConfig {
    /// Refresh lock TTL in seconds. Also the sole recovery bound for a
    /// crashed holder.
    pub lock_ttl_seconds: u64,
    /// Fixed rate-limit window in seconds.
    pub rate_limit_window_seconds: u64,
    /// Max refreshes per user per window.
    pub rate_limit_max_requests: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VectorServiceConfig {
    pub url: String,
    pub timeout_seconds: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenv::dotenv().ok();

        Ok(Config {
            app: AppConfig {
                env: env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                host: env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env_parsed("APP_PORT", 8014)?,
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "postgres://localhost:5432/matching".to_string()),
                max_connections: env_parsed("DATABASE_MAX_CONNECTIONS", 10)?,
            },
            redis: RedisConfig {
                url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            },
            jwt: JwtConfig {
                secret: env::var("JWT_SECRET").unwrap_or_else(|_| "dev-secret".to_string()),
            },
            scoring: ScoringConfig {
                harmony_weight: env_parsed("SCORING_HARMONY_WEIGHT", 0.6)?,
                context_weight: env_parsed("SCORING_CONTEXT_WEIGHT", 0.4)?,
                same_city_bonus: env_parsed("SCORING_SAME_CITY_BONUS", 0.08)?,
                same_institution_bonus: env_parsed("SCORING_SAME_INSTITUTION_BONUS", 0.05)?,
            },
            orchestrator: OrchestratorConfig {
                min_viability: env_parsed("MATCHING_MIN_VIABILITY", 0.30)?,
                top_n: env_parsed("MATCHING_TOP_N", 10)?,
                cohort_limit: env_parsed("MATCHING_COHORT_LIMIT", 500)?,
                expiry_hours: env_parsed("SUGGESTION_EXPIRY_HOURS", 168)?,
            },
            guardrails: GuardrailConfig {
                lock_ttl_seconds: env_parsed("REFRESH_LOCK_TTL_SECONDS", 600)?,
                rate_limit_window_seconds: env_parsed("REFRESH_RATE_WINDOW_SECONDS", 300)?,
                rate_limit_max_requests: env_parsed("REFRESH_RATE_MAX_REQUESTS", 1)?,
            },
            vector_service: VectorServiceConfig {
                url: env::var("VECTOR_SERVICE_URL")
                    .unwrap_or_else(|_| "http://localhost:8015".to_string()),
                timeout_seconds: env_parsed("VECTOR_SERVICE_TIMEOUT_SECONDS", 10)?,
            },
        })
    }
}

fn env_parsed<T>(key: &str, default: T) -> Result<T, anyhow::Error>
where
    T: std::str::FromStr + std::fmt::Display,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("{} must be a valid {}: {}", key, std::any::type_name::<T>(), e)),
        Err(_) => Ok(default),
    }
}
