//! PostgreSQL connection pool with retry on startup

use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::config::DatabaseConfig;
use crate::error::{sanitize_url, Error, Result};

/// Connect a pool, retrying with exponential backoff
///
/// Makes up to `max_retries + 1` attempts. The delay starts at
/// `retry_delay_secs` and doubles after each failure.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool> {
    let mut attempt = 0;
    let base_delay = Duration::from_secs(config.retry_delay_secs);

    loop {
        match try_create_pool(config).await {
            Ok(pool) => {
                if attempt > 0 {
                    tracing::info!(
                        "Database connection established after {} attempt(s)",
                        attempt + 1
                    );
                } else {
                    tracing::info!(
                        "Database connection pool created: max={}, min={}",
                        config.max_connections,
                        config.min_connections
                    );
                }
                return Ok(pool);
            }
            Err(e) => {
                attempt += 1;

                if attempt > config.max_retries {
                    tracing::error!(
                        "Failed to connect to database after {} attempts: {}",
                        config.max_retries + 1,
                        e
                    );
                    return Err(e);
                }

                let delay = backoff_delay(base_delay, attempt);
                tracing::warn!(
                    "Database connection attempt {} failed: {}. Retrying in {:?}...",
                    attempt,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Pool that connects on first use instead of at startup
pub fn create_lazy_pool(config: &DatabaseConfig) -> Result<PgPool> {
    pool_options(config)
        .connect_lazy(&config.url)
        .map_err(|e| connect_error(config, &e))
}

fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
}

async fn try_create_pool(config: &DatabaseConfig) -> Result<PgPool> {
    pool_options(config)
        .connect(&config.url)
        .await
        .map_err(|e| connect_error(config, &e))
}

fn connect_error(config: &DatabaseConfig, err: &sqlx::Error) -> Error {
    Error::Database(format!(
        "failed to connect to '{}' ({}): {}",
        sanitize_url(&config.url),
        categorize(err),
        err
    ))
}

/// Delay before retry number `attempt` (1-based)
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2_u32.saturating_pow(attempt.saturating_sub(1)))
}

fn categorize(err: &sqlx::Error) -> &'static str {
    match err {
        sqlx::Error::Configuration(_) => "configuration error",
        sqlx::Error::Database(_) => "database error",
        sqlx::Error::Io(_) => "network I/O error",
        sqlx::Error::Tls(_) => "TLS error",
        sqlx::Error::PoolTimedOut => "pool timed out",
        sqlx::Error::PoolClosed => "pool closed",
        sqlx::Error::WorkerCrashed => "worker crashed",
        _ => "connection error",
    }
}
