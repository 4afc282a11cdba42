//! Binding a unit of work to one tenant's row scope.
//!
//! The row-level security policies read `app.current_tenant`, a setting that
//! lives on the physical connection. Setting it through the pool and then
//! running a query through the pool may use two different connections, and
//! a session-level value would outlive the request on a reused connection.
//! A [`TenantScope`] therefore owns a single transaction: the setting is
//! applied transaction-locally as its first statement and disappears with
//! the commit or rollback, before the connection goes back to the pool.

use std::time::Duration;

use futures::future::BoxFuture;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::{debug, error, warn};

use crate::config::DatabaseConfig;
use crate::database::manager::{DatabaseError, DatabaseManager, QueryContext};
use crate::types::TenantId;

/// Session setting consulted by the row-level security policies
pub const TENANT_SETTING: &str = "app.current_tenant";

const RETRY_BACKOFF: Duration = Duration::from_millis(20);

/// Errors that can tell whether a fresh attempt of the same work may succeed
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for DatabaseError {
    fn is_retryable(&self) -> bool {
        DatabaseError::is_retryable(self)
    }
}

/// Hands out tenant-scoped units of work over the shared pool
#[derive(Clone)]
pub struct TenantBinder {
    pool: PgPool,
    app_role: Option<String>,
    max_conflict_retries: u32,
}

impl TenantBinder {
    pub fn new(database: &DatabaseManager, config: &DatabaseConfig) -> Self {
        Self {
            pool: database.pool().clone(),
            app_role: config.app_role.clone(),
            max_conflict_retries: config.max_conflict_retries,
        }
    }

    /// Open a transaction bound to `tenant`.
    ///
    /// Fails closed: if the role switch or the tenant setting cannot be
    /// applied and verified, the transaction is rolled back and no scope is
    /// returned.
    pub async fn begin(&self, tenant: &TenantId) -> Result<TenantScope, DatabaseError> {
        let mut tx = self.pool.begin().await.context("begin unit of work")?;

        if let Some(role) = &self.app_role {
            let statement = format!("SET LOCAL ROLE {}", quote_identifier(role));
            if let Err(e) = sqlx::query(&statement).execute(&mut *tx).await {
                error!("Failed to assume role '{}': {}", role, e);
                return Err(DatabaseError::ScopeNotBound(format!("cannot assume role '{}'", role)));
            }
        }

        let bound: Result<Option<String>, sqlx::Error> =
            sqlx::query_scalar("SELECT set_config($1, $2, true)")
                .bind(TENANT_SETTING)
                .bind(tenant.as_str())
                .fetch_one(&mut *tx)
                .await;

        match bound {
            Ok(Some(value)) if value == tenant.as_str() => {}
            Ok(other) => {
                error!("Tenant setting read back as {:?}, expected '{}'", other, tenant);
                return Err(DatabaseError::ScopeNotBound("tenant setting mismatch".to_string()));
            }
            Err(e) => {
                error!("Failed to bind tenant '{}': {}", tenant, e);
                return Err(DatabaseError::ScopeNotBound("cannot set tenant".to_string()));
            }
        }

        debug!("Bound unit of work to tenant '{}'", tenant);
        Ok(TenantScope {
            tenant: tenant.clone(),
            tx,
        })
    }

    /// Run `work` in a tenant-bound transaction and commit it.
    ///
    /// Any error rolls the whole unit back. Serialization failures and
    /// deadlocks rerun `work` from the start in a new transaction, up to the
    /// configured number of retries.
    pub async fn run<T, E, F>(&self, tenant: &TenantId, mut work: F) -> Result<T, E>
    where
        F: for<'s> FnMut(&'s mut TenantScope) -> BoxFuture<'s, Result<T, E>>,
        E: From<DatabaseError> + Retryable + std::fmt::Display,
    {
        let mut attempt: u32 = 0;
        loop {
            let mut scope = self.begin(tenant).await?;
            let result = work(&mut scope).await;
            let outcome = match result {
                Ok(value) => scope.commit().await.map(|_| value).map_err(E::from),
                Err(e) => {
                    scope.rollback().await;
                    Err(e)
                }
            };

            match outcome {
                Err(e) if e.is_retryable() && attempt < self.max_conflict_retries => {
                    attempt += 1;
                    warn!(
                        "Unit of work for tenant '{}' conflicted ({}), retry {}/{}",
                        tenant, e, attempt, self.max_conflict_retries
                    );
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                }
                other => return other,
            }
        }
    }
}

/// A transaction bound to one tenant. Every tenant-scoped query in the crate
/// takes `&mut TenantScope`, so none can run on an unbound connection.
pub struct TenantScope {
    tenant: TenantId,
    tx: Transaction<'static, Postgres>,
}

impl TenantScope {
    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    pub(crate) fn conn(&mut self) -> &mut PgConnection {
        &mut *self.tx
    }

    /// Tenant the row-level security policies currently see on this
    /// transaction's connection
    pub async fn bound_tenant(&mut self) -> Result<Option<String>, DatabaseError> {
        sqlx::query_scalar("SELECT current_setting($1, true)")
            .bind(TENANT_SETTING)
            .fetch_one(self.conn())
            .await
            .context("read tenant setting")
    }

    pub async fn commit(self) -> Result<(), DatabaseError> {
        self.tx.commit().await.context("commit unit of work")
    }

    pub async fn rollback(self) {
        if let Err(e) = self.tx.rollback().await {
            warn!("Rollback for tenant '{}' failed: {}", self.tenant, e);
        }
    }
}

/// Quote SQL identifier to prevent injection
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
