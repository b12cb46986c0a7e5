use std::sync::Arc;

use domain_qa_index::{
    BackendFactory, BackendKind, DescriptorStore, IndexContext, IndexResult,
    ScoredDocument, SearchKind, SearchOptions, VectorIndex,
};
use tracing::{debug, error, info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::error::{QaDocumentError, QaDocumentResult};
use crate::models::{
    CreateQaDocument, DeleteOutcome, IndexStatus, NewQaDocument, QaDocument, QaDocumentFilter,
    UpdateQaDocument,
};
use crate::repository::QaDocumentRepository;
use crate::source::RepositorySource;

/// Keeps QA entries and their vector index in step.
///
/// The relational write always happens first. An index failure after that write is not
/// returned to the caller: the entry is disabled and the cause stored on it instead.
#[derive(Clone)]
pub struct QaDocumentService<R: QaDocumentRepository> {
    repository: Arc<R>,
    index: IndexContext,
}

impl<R: QaDocumentRepository + 'static> QaDocumentService<R> {
    pub fn new(
        repository: R,
        factory: Arc<dyn BackendFactory>,
        descriptors: Arc<dyn DescriptorStore>,
    ) -> Self {
        let repository = Arc::new(repository);
        let source = Arc::new(RepositorySource::new(repository.clone()));

        Self {
            repository,
            index: IndexContext::new(factory, descriptors, source),
        }
    }

    async fn open_index(&self, app_id: Uuid) -> QaDocumentResult<VectorIndex> {
        self.index
            .open(app_id)
            .await
            .map_err(QaDocumentError::from_index)
    }

    /// Record the outcome of an index mutation on the entry
    async fn settle(
        &self,
        mut entry: QaDocument,
        outcome: IndexResult<()>,
    ) -> QaDocumentResult<QaDocument> {
        match outcome {
            Ok(()) => {
                if entry.mark_indexed() {
                    info!(entry_id = %entry.id, "QA entry re-enabled");
                    return self.repository.update(entry).await;
                }
                Ok(entry)
            }
            Err(e) => {
                error!(entry_id = %entry.id, app_id = %entry.app_id, error = %e, "Indexing QA entry failed");
                entry.mark_failed(&e);
                self.repository.update(entry).await
            }
        }
    }

    /// Create an entry at the owner's next position and index it.
    ///
    /// Returns the entry even when indexing failed; check `enabled`.
    #[instrument(skip(self, input), fields(app_id = %app_id))]
    pub async fn create(
        &self,
        app_id: Uuid,
        input: CreateQaDocument,
    ) -> QaDocumentResult<QaDocument> {
        input
            .validate()
            .map_err(|e| QaDocumentError::Validation(e.to_string()))?;

        let mut index = self.open_index(app_id).await?;
        let entry = self
            .repository
            .insert(NewQaDocument::new(app_id, input))
            .await?;

        let outcome = index.add_texts(vec![entry.to_indexed()], true).await;
        self.settle(entry, outcome).await
    }

    pub async fn get(&self, id: Uuid) -> QaDocumentResult<QaDocument> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or(QaDocumentError::NotFound(id))
    }

    pub async fn list(&self, filter: QaDocumentFilter) -> QaDocumentResult<Vec<QaDocument>> {
        filter
            .validate()
            .map_err(|e| QaDocumentError::Validation(e.to_string()))?;

        self.repository.list(filter).await
    }

    /// Replace question and answer, then re-index the entry.
    ///
    /// Unchanged content on an enabled entry touches neither the row nor the index.
    #[instrument(skip(self, input), fields(entry_id = %id))]
    pub async fn update(&self, id: Uuid, input: UpdateQaDocument) -> QaDocumentResult<QaDocument> {
        input
            .validate()
            .map_err(|e| QaDocumentError::Validation(e.to_string()))?;

        let mut entry = self.get(id).await?;
        let (question, answer) = input.trimmed();

        if entry.enabled && entry.has_content(&question, &answer) {
            debug!("Content unchanged, skipping update");
            return Ok(entry);
        }

        let mut index = self.open_index(entry.app_id).await?;
        entry.question = question;
        entry.answer = answer;
        let entry = self.repository.update(entry).await?;

        let outcome = match index.delete_by_document_id(entry.id).await {
            Ok(()) => index.add_texts(vec![entry.to_indexed()], true).await,
            Err(e) => Err(e),
        };
        self.settle(entry, outcome).await
    }

    /// Remove the entry's vectors, then the entry.
    ///
    /// When the index refuses, the entry is kept, disabled and returned as `Kept`.
    #[instrument(skip(self), fields(entry_id = %id))]
    pub async fn delete(&self, id: Uuid) -> QaDocumentResult<DeleteOutcome> {
        let entry = self.get(id).await?;
        let mut index = self.open_index(entry.app_id).await?;

        if let Err(e) = index.delete_by_document_id(entry.id).await {
            let kept = self.settle(entry, Err(e)).await?;
            return Ok(DeleteOutcome::Kept(kept));
        }

        if !self.repository.delete(id).await? {
            return Err(QaDocumentError::NotFound(id));
        }

        info!(app_id = %entry.app_id, "QA entry deleted");
        Ok(DeleteOutcome::Deleted)
    }

    /// Drop the owner's collection and rebuild it from the enabled entries
    #[instrument(skip(self), fields(app_id = %app_id))]
    pub async fn rebuild_index(&self, app_id: Uuid) -> QaDocumentResult<IndexStatus> {
        let mut index = self.open_index(app_id).await?;
        index.rebuild().await.map_err(QaDocumentError::from_index)?;

        status_of(&index).await
    }

    /// Move the owner's vectors to another backend
    #[instrument(skip(self), fields(app_id = %app_id, to = %kind))]
    pub async fn migrate_index(
        &self,
        app_id: Uuid,
        kind: BackendKind,
    ) -> QaDocumentResult<IndexStatus> {
        let mut index = self.open_index(app_id).await?;
        index
            .migrate_to(kind)
            .await
            .map_err(QaDocumentError::from_index)?;

        status_of(&index).await
    }

    /// Drop the owner's collection. The descriptor stays, so the owner keeps its vector
    /// store and the next create or update fills the collection again.
    #[instrument(skip(self), fields(app_id = %app_id))]
    pub async fn drop_index(&self, app_id: Uuid) -> QaDocumentResult<IndexStatus> {
        let index = self.open_index(app_id).await?;
        index
            .delete_collection()
            .await
            .map_err(QaDocumentError::from_index)?;

        info!(collection = %index.collection_name(), "Vector collection dropped");
        status_of(&index).await
    }

    pub async fn index_status(&self, app_id: Uuid) -> QaDocumentResult<IndexStatus> {
        let index = self.open_index(app_id).await?;
        status_of(&index).await
    }

    /// Nearest questions with their stored answers
    #[instrument(skip(self, text, options), fields(app_id = %app_id, kind = %kind))]
    pub async fn search(
        &self,
        app_id: Uuid,
        text: &str,
        kind: SearchKind,
        options: &SearchOptions,
    ) -> QaDocumentResult<Vec<ScoredDocument>> {
        if text.trim().is_empty() {
            return Err(QaDocumentError::Validation(
                "search text must not be blank".to_string(),
            ));
        }

        let index = self.open_index(app_id).await?;
        index
            .query(text.trim(), kind, options)
            .await
            .map_err(QaDocumentError::from_index)
    }
}

async fn status_of(index: &VectorIndex) -> QaDocumentResult<IndexStatus> {
    let vectors = match index.descriptor() {
        Some(_) => index.count().await.map_err(QaDocumentError::from_index)?,
        None => 0,
    };

    Ok(IndexStatus {
        app_id: index.owner_id(),
        kind: index.kind(),
        collection: index.collection_name(),
        descriptor: index.descriptor().cloned(),
        vectors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MockQaDocumentRepository;
    use async_trait::async_trait;
    use domain_qa_index::{EmbeddingProvider, InMemoryBackendFactory, InMemoryDescriptorStore};

    struct UnitEmbedding;

    #[async_trait]
    impl EmbeddingProvider for UnitEmbedding {
        fn model_name(&self) -> String {
            "unit".to_string()
        }

        async fn embed_documents(&self, texts: &[String]) -> IndexResult<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }

        async fn embed_query(&self, _text: &str) -> IndexResult<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }
    }

    fn service(
        repo: MockQaDocumentRepository,
        descriptors: Arc<InMemoryDescriptorStore>,
    ) -> QaDocumentService<MockQaDocumentRepository> {
        let factory = InMemoryBackendFactory::new(Arc::new(UnitEmbedding))
            .with_default_kind(BackendKind::Qdrant);
        QaDocumentService::new(repo, Arc::new(factory), descriptors)
    }

    fn stored(app_id: Uuid) -> QaDocument {
        NewQaDocument::new(app_id, CreateQaDocument::new("What is X?", "X is Y.")).into_document(1)
    }

    #[tokio::test]
    async fn test_create_rejects_blank_question_before_any_write() {
        let mut repo = MockQaDocumentRepository::new();
        repo.expect_insert().never();

        let service = service(repo, Arc::new(InMemoryDescriptorStore::new()));
        let result = service
            .create(Uuid::new_v4(), CreateQaDocument::new("   ", "X is Y."))
            .await;

        assert!(matches!(result, Err(QaDocumentError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_for_unknown_owner_writes_nothing() {
        let mut repo = MockQaDocumentRepository::new();
        repo.expect_insert().never();

        let owner = Uuid::new_v4();
        let service = service(repo, Arc::new(InMemoryDescriptorStore::new()));
        let result = service
            .create(owner, CreateQaDocument::new("What is X?", "X is Y."))
            .await;

        assert!(matches!(result, Err(QaDocumentError::OwnerNotFound(id)) if id == owner));
    }

    #[tokio::test]
    async fn test_update_with_same_content_is_a_noop() {
        let owner = Uuid::new_v4();
        let entry = stored(owner);
        let returned = entry.clone();

        let mut repo = MockQaDocumentRepository::new();
        repo.expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(returned.clone())));
        repo.expect_update().never();

        let descriptors = Arc::new(InMemoryDescriptorStore::new());
        descriptors.add_owner(owner).await;
        let service = service(repo, descriptors);

        let result = service
            .update(entry.id, UpdateQaDocument::new(" What is X? ", "X is Y."))
            .await
            .unwrap();

        assert_eq!(result, entry);
    }

    #[tokio::test]
    async fn test_delete_missing_entry() {
        let mut repo = MockQaDocumentRepository::new();
        repo.expect_find_by_id().returning(|_| Ok(None));
        repo.expect_delete().never();

        let id = Uuid::new_v4();
        let service = service(repo, Arc::new(InMemoryDescriptorStore::new()));

        let result = service.delete(id).await;

        assert!(matches!(result, Err(QaDocumentError::NotFound(missing)) if missing == id));
    }

    #[tokio::test]
    async fn test_search_rejects_blank_text() {
        let service = service(
            MockQaDocumentRepository::new(),
            Arc::new(InMemoryDescriptorStore::new()),
        );

        let result = service
            .search(Uuid::new_v4(), " ", SearchKind::Similarity, &SearchOptions::default())
            .await;

        assert!(matches!(result, Err(QaDocumentError::Validation(_))));
    }

    #[tokio::test]
    async fn test_list_rejects_oversized_page() {
        let mut repo = MockQaDocumentRepository::new();
        repo.expect_list().never();

        let service = service(repo, Arc::new(InMemoryDescriptorStore::new()));
        let result = service
            .list(QaDocumentFilter::new(Uuid::new_v4()).paginate(500, 0))
            .await;

        assert!(matches!(result, Err(QaDocumentError::Validation(_))));
    }
}
