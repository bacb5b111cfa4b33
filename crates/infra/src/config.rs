//! Environment-based infrastructure configuration.

use anyhow::Context;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Connection settings for the shared, process-wide backends.
///
/// The pool and the cache client are shared across all tenants; tenant
/// scoping happens per query/key, never per connection.
#[derive(Debug, Clone)]
pub struct InfraConfig {
    pub database_url: String,
    pub redis_url: Option<String>,
    pub max_connections: u32,
}

impl InfraConfig {
    /// Read configuration from the environment.
    ///
    /// `DATABASE_URL` is required; `REDIS_URL` is optional (no cache when
    /// absent); `DATABASE_MAX_CONNECTIONS` defaults to 10.
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url =
            std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let redis_url = std::env::var("REDIS_URL").ok();
        let max_connections = match std::env::var("DATABASE_MAX_CONNECTIONS") {
            Ok(raw) => raw
                .parse()
                .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?,
            Err(_) => DEFAULT_MAX_CONNECTIONS,
        };

        Ok(Self {
            database_url,
            redis_url,
            max_connections,
        })
    }

    /// Build the shared Postgres connection pool.
    pub async fn connect_pool(&self) -> anyhow::Result<PgPool> {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .connect(&self.database_url)
            .await
            .context("failed to connect to postgres")
    }
}
