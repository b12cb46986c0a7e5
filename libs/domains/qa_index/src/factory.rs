use std::sync::Arc;

use crate::backend::{
    InMemoryBackend, InMemoryVectorStore, MilvusBackend, QdrantBackend, VectorBackend,
    WeaviateBackend,
};
use crate::config::VectorStoreConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{IndexError, IndexResult};
use crate::models::BackendKind;

/// Opens a backend bound to one collection
#[cfg_attr(test, mockall::automock)]
pub trait BackendFactory: Send + Sync {
    /// Backend used for owners that have no descriptor yet
    fn default_kind(&self) -> Option<BackendKind>;

    /// `origin` marks collections written with the pre-QA schema
    fn open(
        &self,
        kind: BackendKind,
        collection: &str,
        origin: bool,
    ) -> IndexResult<Arc<dyn VectorBackend>>;
}

/// Builds vendor clients from [`VectorStoreConfig`]
pub struct ConfiguredBackendFactory {
    config: VectorStoreConfig,
    embeddings: Arc<dyn EmbeddingProvider>,
}

impl ConfiguredBackendFactory {
    pub fn new(config: VectorStoreConfig, embeddings: Arc<dyn EmbeddingProvider>) -> Self {
        Self { config, embeddings }
    }

    fn missing(kind: BackendKind) -> IndexError {
        IndexError::NotConfigured(format!("{} settings are missing", kind))
    }
}

impl BackendFactory for ConfiguredBackendFactory {
    fn default_kind(&self) -> Option<BackendKind> {
        self.config.default_kind
    }

    fn open(
        &self,
        kind: BackendKind,
        collection: &str,
        origin: bool,
    ) -> IndexResult<Arc<dyn VectorBackend>> {
        let timeouts = self.config.timeouts;
        let embeddings = self.embeddings.clone();

        let backend: Arc<dyn VectorBackend> = match kind {
            BackendKind::Weaviate => {
                let config = self.config.weaviate.as_ref().ok_or_else(|| Self::missing(kind))?;
                Arc::new(
                    WeaviateBackend::new(config, timeouts, collection, embeddings)?
                        .with_origin_schema(origin),
                )
            }
            BackendKind::Qdrant => {
                let config = self.config.qdrant.as_ref().ok_or_else(|| Self::missing(kind))?;
                Arc::new(QdrantBackend::new(config, timeouts, collection, embeddings)?)
            }
            BackendKind::Milvus => {
                let config = self.config.milvus.as_ref().ok_or_else(|| Self::missing(kind))?;
                Arc::new(MilvusBackend::new(config, timeouts, collection, embeddings)?)
            }
        };

        Ok(backend)
    }
}

/// Every kind is served by one shared [`InMemoryVectorStore`] per kind, so switching
/// kinds behaves like switching servers.
pub struct InMemoryBackendFactory {
    default_kind: Option<BackendKind>,
    embeddings: Arc<dyn EmbeddingProvider>,
    weaviate: InMemoryVectorStore,
    qdrant: InMemoryVectorStore,
    milvus: InMemoryVectorStore,
}

impl InMemoryBackendFactory {
    pub fn new(embeddings: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            default_kind: None,
            embeddings,
            weaviate: InMemoryVectorStore::new(),
            qdrant: InMemoryVectorStore::new(),
            milvus: InMemoryVectorStore::new(),
        }
    }

    pub fn with_default_kind(mut self, kind: BackendKind) -> Self {
        self.default_kind = Some(kind);
        self
    }

    /// The store standing in for `kind`'s server
    pub fn store(&self, kind: BackendKind) -> &InMemoryVectorStore {
        match kind {
            BackendKind::Weaviate => &self.weaviate,
            BackendKind::Qdrant => &self.qdrant,
            BackendKind::Milvus => &self.milvus,
        }
    }
}

impl BackendFactory for InMemoryBackendFactory {
    fn default_kind(&self) -> Option<BackendKind> {
        self.default_kind
    }

    fn open(
        &self,
        kind: BackendKind,
        collection: &str,
        _origin: bool,
    ) -> IndexResult<Arc<dyn VectorBackend>> {
        Ok(Arc::new(InMemoryBackend::new(
            kind,
            collection,
            self.embeddings.clone(),
            self.store(kind).clone(),
        )))
    }
}
