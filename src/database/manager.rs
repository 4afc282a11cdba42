use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;
use tracing::info;

use crate::config::DatabaseConfig;

/// SQLSTATE codes the service reacts to
const UNIQUE_VIOLATION: &str = "23505";
const INSUFFICIENT_PRIVILEGE: &str = "42501";
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

/// Errors from the storage layer, classified close to where they occur
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Tenant scope could not be established: {0}")]
    ScopeNotBound(String),

    #[error("{context}: unique constraint violated")]
    UniqueViolation {
        context: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("{context}: row scope violation")]
    ScopeViolation {
        context: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("{context}: concurrent update conflict")]
    Conflict {
        context: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("{context}: {source}")]
    Query {
        context: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Wrap a driver error with the operation that produced it
    pub fn classify(context: &'static str, source: sqlx::Error) -> Self {
        let code = source
            .as_database_error()
            .and_then(|e| e.code())
            .map(|c| c.into_owned());

        match code.as_deref() {
            Some(UNIQUE_VIOLATION) => DatabaseError::UniqueViolation { context, source },
            Some(INSUFFICIENT_PRIVILEGE) => DatabaseError::ScopeViolation { context, source },
            Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED) => {
                DatabaseError::Conflict { context, source }
            }
            _ => DatabaseError::Query { context, source },
        }
    }

    /// Whether rerunning the whole unit of work in a new transaction may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, DatabaseError::Conflict { .. })
    }
}

/// Attach operation context to sqlx results
pub trait QueryContext<T> {
    fn context(self, context: &'static str) -> Result<T, DatabaseError>;
}

impl<T> QueryContext<T> for Result<T, sqlx::Error> {
    fn context(self, context: &'static str) -> Result<T, DatabaseError> {
        self.map_err(|e| DatabaseError::classify(context, e))
    }
}

/// Owns the shared connection pool. Every tenant shares the pool; row
/// visibility is decided per transaction by [`crate::database::TenantBinder`].
#[derive(Clone)]
pub struct DatabaseManager {
    pool: PgPool,
}

impl DatabaseManager {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let url = std::env::var("DATABASE_URL")
            .map_err(|_| DatabaseError::ConfigMissing("DATABASE_URL"))?;
        let pool = Self::pool_options(config).connect(&url).await?;
        info!("Created database pool (max_connections={})", config.max_connections);
        Ok(Self { pool })
    }

    /// Pool that opens connections on first use; handy for routers under test
    pub fn connect_lazy(url: &str, config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let pool = Self::pool_options(config).connect_lazy(url)?;
        Ok(Self { pool })
    }

    fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the embedded migrations under `migrations/`
    pub async fn migrate(&self) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("health check")?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("Closed database pool");
    }
}
