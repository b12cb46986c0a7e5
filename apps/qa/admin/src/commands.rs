//! Command implementations

use std::sync::Arc;

use database::postgres::{self, DatabaseConnection};
use domain_qa_documents::{
    PgDescriptorStore, PgQaDocumentRepository, QaDocumentFilter, QaDocumentRepository,
    QaDocumentService, QaDocumentSort, REQUIRED_TABLES,
};
use domain_qa_index::{
    BackendKind, CachedEmbedding, ConfiguredBackendFactory, OpenAIProvider, SearchKind,
    SearchOptions,
};
use eyre::{Result, WrapErr};
use migration::Migrator;
use serde_json::json;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::config::Config;

pub struct Admin {
    db: DatabaseConnection,
    config: Config,
}

impl Admin {
    pub async fn connect(config: Config) -> Result<Self> {
        let db = postgres::connect_with_retry(config.database.clone(), None)
            .await
            .wrap_err("Database connection failed")?;

        postgres::check_health(&db)
            .await
            .wrap_err("Database health check failed")?;

        Ok(Self { db, config })
    }

    /// Every command except `migrate` needs the QA tables in place
    async fn ensure_schema(&self) -> Result<()> {
        postgres::check_schema(&self.db, &REQUIRED_TABLES)
            .await
            .wrap_err("QA schema missing; run `qa-admin migrate` first")
    }

    fn service(&self) -> Result<QaDocumentService<PgQaDocumentRepository>> {
        let openai = OpenAIProvider::from_env(self.config.vector_store.timeouts)
            .wrap_err("Embedding provider is not configured")?;
        let embeddings = Arc::new(CachedEmbedding::new(
            Arc::new(openai),
            self.config.vector_store.embedding_cache_capacity,
        ));
        let factory = ConfiguredBackendFactory::new(self.config.vector_store.clone(), embeddings);

        Ok(QaDocumentService::new(
            PgQaDocumentRepository::new(self.db.clone()),
            Arc::new(factory),
            Arc::new(PgDescriptorStore::new(self.db.clone())),
        ))
    }

    pub async fn migrate(&self) -> Result<()> {
        postgres::run_migrations::<Migrator>(&self.db, "qa-admin")
            .await
            .wrap_err("Migrations failed")?;
        self.ensure_schema().await?;

        println!("Schema is up to date");
        Ok(())
    }

    pub async fn list(
        &self,
        owner: Uuid,
        keyword: Option<String>,
        enabled: Option<bool>,
        sort: QaDocumentSort,
        limit: usize,
        offset: usize,
    ) -> Result<()> {
        self.ensure_schema().await?;

        let mut filter = QaDocumentFilter::new(owner)
            .sorted_by(sort)
            .paginate(limit, offset);
        filter.keyword = keyword;
        filter.enabled = enabled;
        filter.validate().wrap_err("Invalid listing options")?;

        // no embeddings needed, so no service
        let entries = PgQaDocumentRepository::new(self.db.clone())
            .list(filter)
            .await?;

        println!("{}", serde_json::to_string_pretty(&entries)?);
        Ok(())
    }

    pub async fn status(&self, owner: Uuid) -> Result<()> {
        self.ensure_schema().await?;

        let status = self.service()?.index_status(owner).await?;
        println!("{}", serde_json::to_string_pretty(&status)?);
        Ok(())
    }

    pub async fn rebuild(&self, owner: Uuid) -> Result<()> {
        self.ensure_schema().await?;

        info!(owner_id = %owner, "Rebuilding vector index");
        let status = self.service()?.rebuild_index(owner).await?;

        println!("{}", serde_json::to_string_pretty(&status)?);
        Ok(())
    }

    pub async fn drop_index(&self, owner: Uuid) -> Result<()> {
        self.ensure_schema().await?;

        info!(owner_id = %owner, "Dropping vector collection");
        let status = self.service()?.drop_index(owner).await?;

        println!("{}", serde_json::to_string_pretty(&status)?);
        Ok(())
    }

    pub async fn migrate_index(&self, owner: Uuid, to: BackendKind) -> Result<()> {
        self.ensure_schema().await?;

        info!(owner_id = %owner, to = %to, "Migrating vector index");
        let status = self
            .service()?
            .migrate_index(owner, to)
            .await
            .wrap_err_with(|| format!("Failed to migrate index of {} to {}", owner, to))?;

        println!("{}", serde_json::to_string_pretty(&status)?);
        Ok(())
    }

    pub async fn search(
        &self,
        owner: Uuid,
        text: &str,
        kind: SearchKind,
        top_k: usize,
        score_threshold: Option<f32>,
    ) -> Result<()> {
        self.ensure_schema().await?;

        let mut options = SearchOptions::new(top_k);
        if let Some(threshold) = score_threshold {
            options = options.with_score_threshold(threshold);
        }

        let hits = self.service()?.search(owner, text, kind, &options).await?;

        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "owner": owner,
                "kind": kind.to_string(),
                "hits": hits,
            }))?
        );
        Ok(())
    }
}
