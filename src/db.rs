use std::{future::Future, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{info, warn};

use crate::{config::AppConfig, error::AppError};

/// Connects to Postgres, retrying a bounded number of times before giving up.
pub async fn connect_with_retry(config: &AppConfig, database_url: &str) -> anyhow::Result<PgPool> {
    let delay = Duration::from_secs(config.db_connect_retry_delay_secs);
    let mut attempt = 0;
    loop {
        match PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(config.store_timeout())
            .connect(database_url)
            .await
        {
            Ok(pool) => {
                info!(attempt, "database connected");
                return Ok(pool);
            }
            Err(e) if attempt < config.db_connect_retries => {
                attempt += 1;
                warn!(
                    error = %e,
                    attempt,
                    max = config.db_connect_retries,
                    "database connection failed; retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                return Err(anyhow::Error::new(e).context("connect to database"));
            }
        }
    }
}

/// Applies pending migrations. A failure aborts startup.
pub async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("run migrations")?;
    info!("migrations applied");
    Ok(())
}

/// Runs a store or hashing call under a deadline. Expiry is a retryable persistence failure.
pub async fn bounded<T, F>(limit: Duration, what: &str, fut: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res,
        Err(_) => Err(AppError::Persistence(format!(
            "{} timed out after {}ms",
            what,
            limit.as_millis()
        ))),
    }
}
