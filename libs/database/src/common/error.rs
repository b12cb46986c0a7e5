/// Errors raised while connecting to, migrating or probing the relational store
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// SeaORM / driver error
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sea_orm::DbErr),

    /// Connection failed after retries
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Health check failed
    #[error("Health check failed: {0}")]
    HealthCheckFailed(String),

    /// A table the QA store depends on is missing
    #[error("Table '{0}' does not exist, run migrations first")]
    MissingTable(String),

    #[cfg(feature = "config")]
    #[error("Configuration error: {0}")]
    Config(#[from] core_config::ConfigError),

    #[error("Migration error: {0}")]
    MigrationError(String),
}

/// Result type alias for database operations
pub type DatabaseResult<T> = Result<T, DatabaseError>;
