//! Configuration for qa-admin

use core_config::{ConfigError, FromEnv};
use database::postgres::PostgresConfig;
use domain_qa_index::VectorStoreConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub database: PostgresConfig,
    pub vector_store: VectorStoreConfig,
}

impl FromEnv for Config {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            database: PostgresConfig::from_env()?,
            vector_store: VectorStoreConfig::from_env()?,
        })
    }
}
