//! PostgreSQL access for the QA document store.
//!
//! Connects the relational side of the system (owner configuration rows and QA entries)
//! through SeaORM, with retrying startup, migration running and a health probe that the
//! operator tooling calls before doing any work.
//!
//! # Features
//!
//! - `config` (default) - `PostgresConfig` loads through `core_config::FromEnv`
//!
//! # Example
//!
//! ```ignore
//! use core_config::FromEnv;
//! use database::postgres::{self, PostgresConfig};
//! use migration::Migrator;
//!
//! let db = postgres::connect_with_retry(PostgresConfig::from_env()?, None).await?;
//! postgres::run_migrations::<Migrator>(&db, "qa_admin").await?;
//! postgres::check_schema(&db, &["app_model_configs", "app_qa_documents"]).await?;
//! ```

pub mod common;
pub mod postgres;

pub use common::{DatabaseError, DatabaseResult};
