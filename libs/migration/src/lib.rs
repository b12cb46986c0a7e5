pub use sea_orm_migration::prelude::*;

mod m20250601_000000_bootstrap;
mod m20250601_000001_create_app_model_configs;
mod m20250601_000002_create_app_qa_documents;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250601_000000_bootstrap::Migration),
            Box::new(m20250601_000001_create_app_model_configs::Migration),
            Box::new(m20250601_000002_create_app_qa_documents::Migration),
        ]
    }
}
