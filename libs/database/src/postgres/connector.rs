use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use super::PostgresConfig;
use crate::common::{DatabaseError, RetryConfig, retry_with_backoff};

/// Connect with explicit SeaORM options
pub async fn connect_with_options(options: ConnectOptions) -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect(options).await?;
    info!("Connected to PostgreSQL");
    Ok(db)
}

/// Connect using a [`PostgresConfig`], no retries
pub async fn connect_from_config(config: PostgresConfig) -> Result<DatabaseConnection, DbErr> {
    connect_with_options(config.into_connect_options()).await
}

/// Connect with exponential backoff.
///
/// `None` uses [`RetryConfig::default`]. Exhausting the budget yields
/// [`DatabaseError::ConnectionFailed`].
///
/// ```ignore
/// let config = PostgresConfig::from_env()?;
/// let db = connect_with_retry(config, Some(RetryConfig::new().with_max_retries(5))).await?;
/// ```
pub async fn connect_with_retry(
    config: PostgresConfig,
    retry_config: Option<RetryConfig>,
) -> Result<DatabaseConnection, DatabaseError> {
    let options = config.into_connect_options();

    retry_with_backoff(
        || connect_with_options(options.clone()),
        retry_config.unwrap_or_default(),
    )
    .await
    .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))
}

/// Apply every pending migration of `M`
pub async fn run_migrations<M: MigratorTrait>(
    db: &DatabaseConnection,
    app_name: &str,
) -> Result<(), DatabaseError> {
    info!(app = app_name, "Running database migrations");
    M::up(db, None)
        .await
        .map_err(|e| DatabaseError::MigrationError(e.to_string()))?;
    info!(app = app_name, "Migrations completed");
    Ok(())
}
