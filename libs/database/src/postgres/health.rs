use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection, Statement};
use tracing::debug;

use crate::common::DatabaseError;

/// `SELECT 1` against the pool
pub async fn check_health(db: &DatabaseConnection) -> Result<(), DatabaseError> {
    debug!("Running PostgreSQL health check");

    let stmt = Statement::from_string(DatabaseBackend::Postgres, "SELECT 1".to_owned());
    db.query_one_raw(stmt)
        .await
        .map_err(|e| DatabaseError::HealthCheckFailed(e.to_string()))?;

    debug!("PostgreSQL health check passed");
    Ok(())
}

/// Verify that every table in `tables` exists in the current search path.
///
/// Used before commands that read QA entries so a missing migration is reported
/// as such instead of as an opaque query error.
pub async fn check_schema(db: &DatabaseConnection, tables: &[&str]) -> Result<(), DatabaseError> {
    for table in tables {
        let stmt = Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            "SELECT to_regclass($1)::text AS reg",
            [(*table).into()],
        );

        let row = db
            .query_one_raw(stmt)
            .await
            .map_err(|e| DatabaseError::HealthCheckFailed(e.to_string()))?;

        let registered = match row {
            Some(row) => row.try_get::<Option<String>>("", "reg")?,
            None => None,
        };

        if registered.is_none() {
            return Err(DatabaseError::MissingTable((*table).to_string()));
        }
        debug!(table, "Table present");
    }

    Ok(())
}

/// Health probe result with timing
#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub healthy: bool,
    pub message: Option<String>,
    pub response_time_ms: u64,
}

impl HealthStatus {
    pub fn healthy(response_time_ms: u64) -> Self {
        Self {
            healthy: true,
            message: None,
            response_time_ms,
        }
    }

    pub fn unhealthy(message: String, response_time_ms: u64) -> Self {
        Self {
            healthy: false,
            message: Some(message),
            response_time_ms,
        }
    }
}

/// Run [`check_health`] and report the outcome with its latency
pub async fn check_health_detailed(db: &DatabaseConnection) -> HealthStatus {
    let start = std::time::Instant::now();
    let outcome = check_health(db).await;
    let elapsed = start.elapsed().as_millis() as u64;

    match outcome {
        Ok(_) => HealthStatus::healthy(elapsed),
        Err(e) => HealthStatus::unhealthy(e.to_string(), elapsed),
    }
}
