use async_trait::async_trait;
use domain_qa_index::{DescriptorStore, IndexDescriptor, IndexError, IndexResult};
use sea_orm::ActiveValue::{Set, Unchanged};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, TransactionTrait,
};
use uuid::Uuid;

use crate::entity::{app_model_config, qa_document};
use crate::error::{QaDocumentError, QaDocumentResult};
use crate::models::{NewQaDocument, QaDocument, QaDocumentFilter, QaDocumentSort};
use crate::repository::QaDocumentRepository;

/// Tables the repository and descriptor store need
pub const REQUIRED_TABLES: [&str; 2] = ["app_model_configs", "app_qa_documents"];

pub struct PgQaDocumentRepository {
    db: DatabaseConnection,
}

impl PgQaDocumentRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl QaDocumentRepository for PgQaDocumentRepository {
    async fn find_by_id(&self, id: Uuid) -> QaDocumentResult<Option<QaDocument>> {
        let model = qa_document::Entity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(Into::into))
    }

    async fn max_position(&self, app_id: Uuid) -> QaDocumentResult<i32> {
        let config = app_model_config::Entity::find()
            .filter(app_model_config::Column::AppId.eq(app_id))
            .one(&self.db)
            .await?
            .ok_or(QaDocumentError::OwnerNotFound(app_id))?;

        Ok(config.qa_position_high_water)
    }

    async fn insert(&self, input: NewQaDocument) -> QaDocumentResult<QaDocument> {
        let app_id = input.app_id;
        let txn = self.db.begin().await?;

        // The config row lock serializes position allocation per owner
        let config = app_model_config::Entity::find()
            .filter(app_model_config::Column::AppId.eq(app_id))
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(QaDocumentError::OwnerNotFound(app_id))?;

        let position = config.qa_position_high_water + 1;
        let mut config: app_model_config::ActiveModel = config.into();
        config.qa_position_high_water = Set(position);
        config.update(&txn).await?;

        let active: qa_document::ActiveModel = input.into_document(position).into();
        let model = active.insert(&txn).await?;
        txn.commit().await?;

        tracing::info!(entry_id = %model.id, position, "Inserted QA entry");
        Ok(model.into())
    }

    async fn update(&self, entry: QaDocument) -> QaDocumentResult<QaDocument> {
        let id = entry.id;
        let active = qa_document::ActiveModel {
            id: Unchanged(id),
            question: Set(entry.question),
            answer: Set(entry.answer),
            enabled: Set(entry.enabled),
            error: Set(entry.error),
            ..Default::default()
        };

        match active.update(&self.db).await {
            Ok(model) => Ok(model.into()),
            Err(DbErr::RecordNotUpdated) => Err(QaDocumentError::NotFound(id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, id: Uuid) -> QaDocumentResult<bool> {
        let result = qa_document::Entity::delete_by_id(id).exec(&self.db).await?;

        if result.rows_affected > 0 {
            tracing::info!(entry_id = %id, "Deleted QA entry");
        }
        Ok(result.rows_affected > 0)
    }

    async fn list_enabled(&self, app_id: Uuid) -> QaDocumentResult<Vec<QaDocument>> {
        let models = qa_document::Entity::find()
            .filter(qa_document::Column::AppId.eq(app_id))
            .filter(qa_document::Column::Enabled.eq(true))
            .order_by_asc(qa_document::Column::Position)
            .all(&self.db)
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn list(&self, filter: QaDocumentFilter) -> QaDocumentResult<Vec<QaDocument>> {
        let mut query =
            qa_document::Entity::find().filter(qa_document::Column::AppId.eq(filter.app_id));

        if let Some(enabled) = filter.enabled {
            query = query.filter(qa_document::Column::Enabled.eq(enabled));
        }

        if let Some(keyword) = filter.normalized_keyword() {
            let pattern = like_pattern(&keyword);
            query = query.filter(Expr::cust_with_values(
                r"(question ILIKE $1 ESCAPE '\' OR answer ILIKE $2 ESCAPE '\')",
                [pattern.clone(), pattern],
            ));
        }

        query = match filter.sort {
            QaDocumentSort::CreatedAtDesc => query
                .order_by_desc(qa_document::Column::CreatedAt)
                .order_by_desc(qa_document::Column::Position),
            QaDocumentSort::CreatedAt => query
                .order_by_asc(qa_document::Column::CreatedAt)
                .order_by_asc(qa_document::Column::Position),
            QaDocumentSort::Position => query.order_by_asc(qa_document::Column::Position),
        };

        let models = query
            .limit(filter.limit as u64)
            .offset(filter.offset as u64)
            .all(&self.db)
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }
}

/// Descriptor persisted in `app_model_configs.qa_index_struct`
pub struct PgDescriptorStore {
    db: DatabaseConnection,
}

impl PgDescriptorStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create the owner's configuration row if it does not exist yet
    pub async fn ensure_owner(&self, app_id: Uuid) -> QaDocumentResult<()> {
        let active = app_model_config::ActiveModel {
            id: Set(Uuid::now_v7()),
            app_id: Set(app_id),
            qa_index_struct: Set(None),
            qa_position_high_water: Set(0),
            ..Default::default()
        };

        app_model_config::Entity::insert(active)
            .on_conflict(
                OnConflict::column(app_model_config::Column::AppId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        Ok(())
    }
}

fn storage_error(err: DbErr) -> IndexError {
    IndexError::Storage(err.to_string())
}

#[async_trait]
impl DescriptorStore for PgDescriptorStore {
    async fn load(&self, owner_id: Uuid) -> IndexResult<Option<IndexDescriptor>> {
        let config = app_model_config::Entity::find()
            .filter(app_model_config::Column::AppId.eq(owner_id))
            .one(&self.db)
            .await
            .map_err(storage_error)?
            .ok_or(IndexError::OwnerNotFound(owner_id))?;

        config
            .qa_index_struct
            .as_deref()
            .map(IndexDescriptor::from_json)
            .transpose()
    }

    async fn save(&self, owner_id: Uuid, descriptor: Option<IndexDescriptor>) -> IndexResult<()> {
        let raw = descriptor.as_ref().map(IndexDescriptor::to_json).transpose()?;

        let result = app_model_config::Entity::update_many()
            .col_expr(app_model_config::Column::QaIndexStruct, Expr::value(raw))
            .filter(app_model_config::Column::AppId.eq(owner_id))
            .exec(&self.db)
            .await
            .map_err(storage_error)?;

        if result.rows_affected == 0 {
            return Err(IndexError::OwnerNotFound(owner_id));
        }

        tracing::debug!(owner_id = %owner_id, cleared = descriptor.is_none(), "Saved index descriptor");
        Ok(())
    }
}

/// Substring pattern that matches `keyword` literally
fn like_pattern(keyword: &str) -> String {
    let mut pattern = String::with_capacity(keyword.len() + 2);
    pattern.push('%');
    for c in keyword.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domain_qa_index::BackendKind;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn config_row(app_id: Uuid, qa_index_struct: Option<String>) -> app_model_config::Model {
        app_model_config::Model {
            id: Uuid::new_v4(),
            app_id,
            qa_index_struct,
            qa_position_high_water: 2,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_load_parses_descriptor_json() {
        let owner = Uuid::new_v4();
        let raw = r#"{"type":"weaviate","vector_store":{"class_prefix":"Vector_index_abc"}}"#;
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![config_row(owner, Some(raw.to_string()))]])
            .into_connection();

        let descriptor = PgDescriptorStore::new(db).load(owner).await.unwrap().unwrap();

        assert_eq!(descriptor.kind, Some(BackendKind::Weaviate));
        assert_eq!(descriptor.class_prefix(), "Vector_index_abc");
        assert!(descriptor.is_origin());
    }

    #[tokio::test]
    async fn test_load_unknown_owner() {
        let owner = Uuid::new_v4();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<app_model_config::Model>::new()])
            .into_connection();

        let result = PgDescriptorStore::new(db).load(owner).await;

        assert!(matches!(result, Err(IndexError::OwnerNotFound(id)) if id == owner));
    }

    #[tokio::test]
    async fn test_load_rejects_malformed_json() {
        let owner = Uuid::new_v4();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![config_row(owner, Some("{not json".to_string()))]])
            .into_connection();

        let result = PgDescriptorStore::new(db).load(owner).await;

        assert!(matches!(result, Err(IndexError::Descriptor(_))));
    }

    #[tokio::test]
    async fn test_max_position_reads_high_water() {
        let owner = Uuid::new_v4();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![config_row(owner, None)]])
            .into_connection();

        let position = PgQaDocumentRepository::new(db).max_position(owner).await.unwrap();

        assert_eq!(position, 2);
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("pricing"), "%pricing%");
        assert_eq!(like_pattern("50%_off"), r"%50\%\_off%");
        assert_eq!(like_pattern(r"c:\temp"), r"%c:\\temp%");
    }
}
