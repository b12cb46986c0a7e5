use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::backend::VectorBackend;
use crate::descriptor::DescriptorStore;
use crate::error::{IndexError, IndexResult};
use crate::factory::BackendFactory;
use crate::lock::OwnerLocks;
use crate::models::{
    BackendKind, IndexDescriptor, IndexedDocument, ScoredDocument, SearchKind, SearchOptions,
    collection_name_for_owner,
};
use crate::source::DocumentSource;

/// Shared handles every [`VectorIndex`] is opened with.
///
/// Clone it freely; the owner locks are shared between clones, which is what serializes
/// index mutations per owner across requests.
#[derive(Clone)]
pub struct IndexContext {
    factory: Arc<dyn BackendFactory>,
    descriptors: Arc<dyn DescriptorStore>,
    source: Arc<dyn DocumentSource>,
    locks: OwnerLocks,
}

impl IndexContext {
    pub fn new(
        factory: Arc<dyn BackendFactory>,
        descriptors: Arc<dyn DescriptorStore>,
        source: Arc<dyn DocumentSource>,
    ) -> Self {
        Self {
            factory,
            descriptors,
            source,
            locks: OwnerLocks::new(),
        }
    }

    /// Load the owner's descriptor and bind the backend it points at.
    ///
    /// Fails with `OwnerNotFound` for unknown owners and `NotConfigured` when neither the
    /// descriptor nor the configuration names a backend.
    pub async fn open(&self, owner_id: Uuid) -> IndexResult<VectorIndex> {
        let descriptor = self.descriptors.load(owner_id).await?;
        let (kind, backend) = self.resolve(owner_id, descriptor.as_ref())?;

        Ok(VectorIndex {
            owner_id,
            descriptor,
            kind,
            backend,
            context: self.clone(),
        })
    }

    fn resolve(
        &self,
        owner_id: Uuid,
        descriptor: Option<&IndexDescriptor>,
    ) -> IndexResult<(BackendKind, Arc<dyn VectorBackend>)> {
        let kind = descriptor
            .and_then(|d| d.kind)
            .or_else(|| self.factory.default_kind())
            .ok_or_else(|| {
                IndexError::NotConfigured(
                    "no vector store selected for owner; set VECTOR_STORE".to_string(),
                )
            })?;

        let backend = match descriptor {
            Some(d) => self.factory.open(kind, &d.collection_name(), d.is_origin())?,
            None => self
                .factory
                .open(kind, &collection_name_for_owner(owner_id), false)?,
        };

        Ok((kind, backend))
    }
}

/// Backend-independent view of one owner's index.
///
/// Mutations take the owner lock and re-read the persisted descriptor first, so an
/// instance opened before another request rebuilt the index still writes to the right
/// collection.
pub struct VectorIndex {
    owner_id: Uuid,
    descriptor: Option<IndexDescriptor>,
    kind: BackendKind,
    backend: Arc<dyn VectorBackend>,
    context: IndexContext,
}

impl VectorIndex {
    pub fn owner_id(&self) -> Uuid {
        self.owner_id
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// In-memory descriptor; `None` until the first successful create
    pub fn descriptor(&self) -> Option<&IndexDescriptor> {
        self.descriptor.as_ref()
    }

    pub fn collection_name(&self) -> String {
        self.backend.collection_name()
    }

    pub fn supports_score_threshold(&self) -> bool {
        self.backend.supports_score_threshold()
    }

    fn is_origin(&self) -> bool {
        self.descriptor.as_ref().is_some_and(IndexDescriptor::is_origin)
    }

    async fn reload(&mut self) -> IndexResult<()> {
        let descriptor = self.context.descriptors.load(self.owner_id).await?;
        if descriptor != self.descriptor {
            debug!(owner_id = %self.owner_id, "Descriptor changed, rebinding backend");
            let (kind, backend) = self.context.resolve(self.owner_id, descriptor.as_ref())?;
            self.kind = kind;
            self.backend = backend;
            self.descriptor = descriptor;
        }
        Ok(())
    }

    /// Index `documents`. The first call creates the collection and persists the
    /// descriptor; an index with the pre-QA schema is recreated first.
    #[instrument(skip(self, documents), fields(owner_id = %self.owner_id, count = documents.len()))]
    pub async fn add_texts(
        &mut self,
        documents: Vec<IndexedDocument>,
        duplicate_check: bool,
    ) -> IndexResult<()> {
        if documents.is_empty() {
            return Ok(());
        }

        let _guard = self.context.locks.acquire(self.owner_id).await;
        self.reload().await?;

        if self.is_origin() {
            self.recreate_locked().await?;
        }

        if self.descriptor.is_none() {
            let descriptor = self.backend.create(documents).await?;
            self.context
                .descriptors
                .save(self.owner_id, Some(descriptor.clone()))
                .await?;
            info!(collection = %descriptor.collection_name(), "Created vector index");
            self.descriptor = Some(descriptor);
            return Ok(());
        }

        self.backend.upsert(documents, duplicate_check).await
    }

    /// Remove the vectors of one entry. An index with the pre-QA schema is recreated.
    #[instrument(skip(self), fields(owner_id = %self.owner_id))]
    pub async fn delete_by_document_id(&mut self, document_id: Uuid) -> IndexResult<()> {
        let _guard = self.context.locks.acquire(self.owner_id).await;
        self.reload().await?;

        if self.descriptor.is_none() {
            debug!(doc_id = %document_id, "No index yet, nothing to delete");
            return Ok(());
        }

        if self.is_origin() {
            self.recreate_locked().await?;
            if self.descriptor.is_none() {
                return Ok(());
            }
        }

        // a recreate re-indexes the entry, which stays enabled until its row is deleted
        self.backend.delete_by_document_id(document_id).await
    }

    /// Drop the collection and rebuild it from the owner's enabled entries
    #[instrument(skip(self), fields(owner_id = %self.owner_id))]
    pub async fn rebuild(&mut self) -> IndexResult<()> {
        let _guard = self.context.locks.acquire(self.owner_id).await;
        self.reload().await?;
        self.recreate_locked().await
    }

    /// Caller holds the owner lock. The persisted descriptor is written only after the
    /// backend accepted the documents; on failure the in-memory one is restored.
    async fn recreate_locked(&mut self) -> IndexResult<()> {
        info!(owner_id = %self.owner_id, kind = %self.kind, "Recreating vector index");

        self.backend.delete_collection().await?;
        let documents = self.context.source.enabled_documents(self.owner_id).await?;

        let target = self.open_owner_collection(self.kind)?;
        let previous = self.descriptor.take();

        let count = documents.len();
        let created = if documents.is_empty() {
            Ok(None)
        } else {
            target.create(documents).await.map(Some)
        };

        let descriptor = match created {
            Ok(descriptor) => descriptor,
            Err(e) => {
                warn!(owner_id = %self.owner_id, error = %e, "Recreate failed, descriptor restored");
                self.descriptor = previous;
                return Err(e);
            }
        };

        if let Err(e) = self
            .context
            .descriptors
            .save(self.owner_id, descriptor.clone())
            .await
        {
            self.descriptor = previous;
            return Err(e);
        }

        self.descriptor = descriptor;
        self.backend = target;
        info!(owner_id = %self.owner_id, documents = count, "Recreated vector index");
        Ok(())
    }

    fn open_owner_collection(&self, kind: BackendKind) -> IndexResult<Arc<dyn VectorBackend>> {
        let collection = collection_name_for_owner(self.owner_id);
        if kind == self.kind && collection == self.backend.collection_name() && !self.is_origin() {
            return Ok(self.backend.clone());
        }
        self.context.factory.open(kind, &collection, false)
    }

    /// Move the owner's vectors to another backend.
    ///
    /// The new collection is filled from the enabled entries before the descriptor
    /// switches; the old collection is dropped last and a failed drop is only logged.
    #[instrument(skip(self), fields(owner_id = %self.owner_id, from = %self.kind))]
    pub async fn migrate_to(&mut self, kind: BackendKind) -> IndexResult<()> {
        let _guard = self.context.locks.acquire(self.owner_id).await;
        self.reload().await?;

        if kind == self.kind {
            return self.recreate_locked().await;
        }

        let target = self.context.factory.open(kind, &collection_name_for_owner(self.owner_id), false)?;
        target.delete_collection().await?;

        let documents = self.context.source.enabled_documents(self.owner_id).await?;
        let count = documents.len();
        let descriptor = if documents.is_empty() {
            IndexDescriptor::for_owner(kind, self.owner_id)
        } else {
            target.create(documents).await?
        };

        self.context
            .descriptors
            .save(self.owner_id, Some(descriptor.clone()))
            .await?;

        let previous = std::mem::replace(&mut self.backend, target);
        let had_index = self.descriptor.replace(descriptor).is_some();
        self.kind = kind;

        if had_index {
            if let Err(e) = previous.delete_collection().await {
                warn!(
                    collection = %previous.collection_name(),
                    error = %e,
                    "Failed to drop collection on previous backend"
                );
            }
        }

        info!(owner_id = %self.owner_id, to = %kind, documents = count, "Migrated vector index");
        Ok(())
    }

    /// Search the owner's index. An owner without an index has no hits.
    pub async fn query(
        &self,
        text: &str,
        kind: SearchKind,
        options: &SearchOptions,
    ) -> IndexResult<Vec<ScoredDocument>> {
        if kind == SearchKind::SimilarityScoreThreshold && !self.supports_score_threshold() {
            return Err(IndexError::Unsupported {
                backend: self.kind,
                operation: "score threshold search",
            });
        }
        if self.descriptor.is_none() {
            return Ok(vec![]);
        }
        self.backend.query(text, kind, options).await
    }

    pub async fn exists_by_id(&self, id: Uuid) -> IndexResult<bool> {
        if self.descriptor.is_none() {
            return Ok(false);
        }
        self.backend.exists_by_id(id).await
    }

    pub async fn count(&self) -> IndexResult<u64> {
        self.backend.count().await
    }

    /// Drop the bound collection. The descriptor is kept; the next write recreates
    /// the collection on demand.
    pub async fn delete_collection(&self) -> IndexResult<()> {
        let _guard = self.context.locks.acquire(self.owner_id).await;
        self.backend.delete_collection().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockVectorBackend;
    use crate::descriptor::{InMemoryDescriptorStore, MockDescriptorStore};
    use crate::factory::MockBackendFactory;
    use crate::source::MockDocumentSource;

    fn source_with(documents: Vec<IndexedDocument>) -> Arc<dyn DocumentSource> {
        let mut source = MockDocumentSource::new();
        source
            .expect_enabled_documents()
            .returning(move |_| Ok(documents.clone()));
        Arc::new(source)
    }

    fn factory_returning(backend: MockVectorBackend) -> Arc<dyn BackendFactory> {
        let backend: Arc<dyn VectorBackend> = Arc::new(backend);
        let mut factory = MockBackendFactory::new();
        factory
            .expect_default_kind()
            .returning(|| Some(BackendKind::Qdrant));
        factory
            .expect_open()
            .returning(move |_, _, _| Ok(backend.clone()));
        Arc::new(factory)
    }

    #[tokio::test]
    async fn test_open_without_backend_is_not_configured() {
        let owner = Uuid::new_v4();
        let descriptors = InMemoryDescriptorStore::new();
        descriptors.add_owner(owner).await;

        let mut factory = MockBackendFactory::new();
        factory.expect_default_kind().returning(|| None);
        factory.expect_open().never();

        let context = IndexContext::new(
            Arc::new(factory),
            Arc::new(descriptors),
            source_with(vec![]),
        );

        let result = context.open(owner).await;

        assert!(matches!(result, Err(IndexError::NotConfigured(_))));
    }

    #[tokio::test]
    async fn test_descriptor_kind_wins_over_default() {
        let owner = Uuid::new_v4();
        let descriptors = InMemoryDescriptorStore::new();
        descriptors
            .add_owner_with(owner, IndexDescriptor::for_owner(BackendKind::Milvus, owner))
            .await;

        let mut factory = MockBackendFactory::new();
        factory
            .expect_default_kind()
            .returning(|| Some(BackendKind::Weaviate));
        factory
            .expect_open()
            .withf(move |kind, collection, origin| {
                *kind == BackendKind::Milvus
                    && collection == collection_name_for_owner(owner)
                    && !origin
            })
            .times(1)
            .returning(|_, _, _| Ok(Arc::new(MockVectorBackend::new()) as Arc<dyn VectorBackend>));

        let context = IndexContext::new(
            Arc::new(factory),
            Arc::new(descriptors),
            source_with(vec![]),
        );

        let index = context.open(owner).await.unwrap();

        assert_eq!(index.kind(), BackendKind::Milvus);
    }

    #[tokio::test]
    async fn test_first_add_creates_and_persists_descriptor() {
        let owner = Uuid::new_v4();
        let descriptors = Arc::new(InMemoryDescriptorStore::new());
        descriptors.add_owner(owner).await;

        let mut backend = MockVectorBackend::new();
        backend
            .expect_collection_name()
            .returning(move || collection_name_for_owner(owner));
        backend
            .expect_create()
            .times(1)
            .returning(move |_| Ok(IndexDescriptor::for_owner(BackendKind::Qdrant, owner)));
        backend.expect_upsert().never();

        let context = IndexContext::new(
            factory_returning(backend),
            descriptors.clone(),
            source_with(vec![]),
        );
        let mut index = context.open(owner).await.unwrap();

        index
            .add_texts(vec![IndexedDocument::qa(Uuid::new_v4(), owner, "q", "a")], true)
            .await
            .unwrap();

        let expected = IndexDescriptor::for_owner(BackendKind::Qdrant, owner);
        assert_eq!(index.descriptor(), Some(&expected));
        assert_eq!(descriptors.load(owner).await.unwrap(), Some(expected));
    }

    #[tokio::test]
    async fn test_add_with_descriptor_upserts() {
        let owner = Uuid::new_v4();
        let descriptors = InMemoryDescriptorStore::new();
        descriptors
            .add_owner_with(owner, IndexDescriptor::for_owner(BackendKind::Qdrant, owner))
            .await;

        let mut backend = MockVectorBackend::new();
        backend.expect_create().never();
        backend
            .expect_upsert()
            .withf(|docs, duplicate_check| docs.len() == 1 && *duplicate_check)
            .times(1)
            .returning(|_, _| Ok(()));

        let context = IndexContext::new(
            factory_returning(backend),
            Arc::new(descriptors),
            source_with(vec![]),
        );
        let mut index = context.open(owner).await.unwrap();

        index
            .add_texts(vec![IndexedDocument::qa(Uuid::new_v4(), owner, "q", "a")], true)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_empty_add_is_noop() {
        let owner = Uuid::new_v4();
        let mut descriptors = MockDescriptorStore::new();
        descriptors.expect_load().times(1).returning(|_| Ok(None));
        descriptors.expect_save().never();

        let mut backend = MockVectorBackend::new();
        backend.expect_create().never();
        backend.expect_upsert().never();

        let context = IndexContext::new(
            factory_returning(backend),
            Arc::new(descriptors),
            source_with(vec![]),
        );
        let mut index = context.open(owner).await.unwrap();

        index.add_texts(vec![], false).await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_recreate_restores_descriptor() {
        let owner = Uuid::new_v4();
        let before = IndexDescriptor::for_owner(BackendKind::Qdrant, owner);

        let mut descriptors = MockDescriptorStore::new();
        let loaded = before.clone();
        descriptors
            .expect_load()
            .returning(move |_| Ok(Some(loaded.clone())));
        descriptors.expect_save().never();

        let mut backend = MockVectorBackend::new();
        backend
            .expect_collection_name()
            .returning(move || collection_name_for_owner(owner));
        backend.expect_delete_collection().times(1).returning(|| Ok(()));
        backend
            .expect_create()
            .times(1)
            .returning(|_| Err(IndexError::BackendUnavailable("connection refused".into())));

        let context = IndexContext::new(
            factory_returning(backend),
            Arc::new(descriptors),
            source_with(vec![IndexedDocument::qa(Uuid::new_v4(), owner, "q", "a")]),
        );
        let mut index = context.open(owner).await.unwrap();

        let result = index.rebuild().await;

        assert!(matches!(result, Err(IndexError::BackendUnavailable(_))));
        assert_eq!(index.descriptor(), Some(&before));
    }

    #[tokio::test]
    async fn test_recreate_without_documents_clears_descriptor() {
        let owner = Uuid::new_v4();
        let descriptors = Arc::new(InMemoryDescriptorStore::new());
        descriptors
            .add_owner_with(owner, IndexDescriptor::for_owner(BackendKind::Qdrant, owner))
            .await;

        let mut backend = MockVectorBackend::new();
        backend
            .expect_collection_name()
            .returning(move || collection_name_for_owner(owner));
        backend.expect_delete_collection().times(1).returning(|| Ok(()));
        backend.expect_create().never();

        let context = IndexContext::new(
            factory_returning(backend),
            descriptors.clone(),
            source_with(vec![]),
        );
        let mut index = context.open(owner).await.unwrap();

        index.rebuild().await.unwrap();

        assert_eq!(index.descriptor(), None);
        assert_eq!(descriptors.load(owner).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_threshold_query_on_unsupported_backend() {
        let owner = Uuid::new_v4();
        let descriptors = InMemoryDescriptorStore::new();
        descriptors
            .add_owner_with(owner, IndexDescriptor::for_owner(BackendKind::Qdrant, owner))
            .await;

        let mut backend = MockVectorBackend::new();
        backend.expect_supports_score_threshold().returning(|| false);
        backend.expect_query().never();

        let context = IndexContext::new(
            factory_returning(backend),
            Arc::new(descriptors),
            source_with(vec![]),
        );
        let index = context.open(owner).await.unwrap();

        let result = index
            .query("q", SearchKind::SimilarityScoreThreshold, &SearchOptions::default())
            .await;

        assert!(matches!(result, Err(IndexError::Unsupported { .. })));
    }
}
