//! PostgreSQL pool, migrations and schema checks for LendingDesk

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use crate::config::Config;
use crate::loan::LoanStatus;

/// Partial unique index that keeps a resource from being lent twice
pub const OPEN_LOAN_INDEX: &str = "loans_one_open_per_resource";

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Failed to connect to database: {0}")]
    ConnectionError(String),

    #[error("Failed to run migrations: {0}")]
    MigrationError(String),

    #[error("Database health check failed: {0}")]
    HealthCheckError(String),

    #[error("Lending schema is incomplete: {0}")]
    SchemaError(String),
}

/// Create a pool sized and timed from `config`
pub async fn create_pool(config: &Config) -> Result<PgPool, DbError> {
    tracing::info!(
        url = %config.database_url_masked(),
        max_connections = config.db_max_connections,
        "Connecting to database"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(config.db_idle_timeout_secs))
        .connect(&config.database_url)
        .await
        .map_err(|e| DbError::ConnectionError(e.to_string()))?;

    Ok(pool)
}

/// Apply the lending schema migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), DbError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| DbError::MigrationError(e.to_string()))?;

    tracing::info!("Lending schema is up to date");
    Ok(())
}

/// What the health check found in the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaReport {
    /// Names in the `loan_statuses` catalog
    pub statuses: Vec<String>,
    pub open_loan_index: bool,
}

impl SchemaReport {
    /// Every loan status must be catalogued and the open-loan index present
    pub fn verify(&self) -> Result<(), DbError> {
        let missing: Vec<&str> = LoanStatus::ALL
            .iter()
            .map(|status| status.as_str())
            .filter(|name| !self.statuses.iter().any(|s| s == name))
            .collect();
        if !missing.is_empty() {
            return Err(DbError::SchemaError(format!(
                "loan_statuses is missing {}",
                missing.join(", ")
            )));
        }
        if !self.open_loan_index {
            return Err(DbError::SchemaError(format!(
                "index {} not found",
                OPEN_LOAN_INDEX
            )));
        }
        Ok(())
    }
}

/// Connectivity plus the schema pieces the lending rules rely on
pub async fn check_health(pool: &PgPool) -> Result<(), DbError> {
    let statuses: Vec<String> = sqlx::query_scalar("SELECT name FROM loan_statuses")
        .fetch_all(pool)
        .await
        .map_err(|e| DbError::HealthCheckError(e.to_string()))?;

    let open_loan_index: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM pg_indexes WHERE indexname = $1)")
            .bind(OPEN_LOAN_INDEX)
            .fetch_one(pool)
            .await
            .map_err(|e| DbError::HealthCheckError(e.to_string()))?;

    SchemaReport {
        statuses,
        open_loan_index,
    }
    .verify()
}
