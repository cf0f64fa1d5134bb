use std::time::Duration;

use serde::Deserialize;

use crate::error::AppError;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct HashConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// `None` runs against in-memory stores.
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub hash: HashConfig,
    pub store_timeout_ms: u64,
    pub hash_timeout_ms: u64,
    pub db_connect_retries: u32,
    pub db_connect_retry_delay_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty());

        let secret = std::env::var("JWT_SECRET")
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::Configuration("JWT_SECRET is not set".into()))?;

        let jwt = JwtConfig {
            secret,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "sbworks".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "sbworks-users".into()),
            ttl_minutes: env_or("JWT_TTL_MINUTES", 60)?,
            refresh_ttl_minutes: env_or("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14)?,
        };

        let defaults = HashConfig::default();
        let hash = HashConfig {
            memory_kib: env_or("HASH_MEMORY_KIB", defaults.memory_kib)?,
            iterations: env_or("HASH_ITERATIONS", defaults.iterations)?,
            parallelism: env_or("HASH_PARALLELISM", defaults.parallelism)?,
        };

        Ok(Self {
            database_url,
            jwt,
            hash,
            store_timeout_ms: env_or("STORE_TIMEOUT_MS", 5_000)?,
            hash_timeout_ms: env_or("HASH_TIMEOUT_MS", 5_000)?,
            db_connect_retries: env_or("DB_CONNECT_RETRIES", 5)?,
            db_connect_retry_delay_secs: env_or("DB_CONNECT_RETRY_DELAY_SECS", 5)?,
        })
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn hash_timeout(&self) -> Duration {
        Duration::from_millis(self.hash_timeout_ms)
    }
}

/// Unset or blank gives `default`; a value that does not parse is fatal.
fn env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => v.trim().parse::<T>().map_err(|_| {
            AppError::Configuration(format!("{} has an unparseable value {:?}", key, v))
        }),
        _ => Ok(default),
    }
}
