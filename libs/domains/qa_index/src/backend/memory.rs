use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::{VectorBackend, embed_batch, retain_missing, sort_by_score};
use crate::embedding::EmbeddingProvider;
use crate::error::{IndexError, IndexResult};
use crate::models::{
    BackendKind, IndexDescriptor, IndexedDocument, ScoredDocument, SearchKind, SearchOptions,
};

#[derive(Debug, Clone)]
struct StoredVector {
    document: IndexedDocument,
    vector: Vec<f32>,
}

type Collections = HashMap<String, HashMap<Uuid, StoredVector>>;

/// Process-local stand-in for a vector store server. Clones share the same collections,
/// so every backend opened on it sees the others' writes.
#[derive(Clone, Default)]
pub struct InMemoryVectorStore {
    collections: Arc<RwLock<Collections>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn has_collection(&self, name: &str) -> bool {
        self.collections.read().await.contains_key(name)
    }

    pub async fn collection_len(&self, name: &str) -> usize {
        self.collections
            .read()
            .await
            .get(name)
            .map(HashMap::len)
            .unwrap_or(0)
    }

    pub async fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Exact cosine search over an [`InMemoryVectorStore`], answering as `kind`.
pub struct InMemoryBackend {
    kind: BackendKind,
    collection: String,
    embeddings: Arc<dyn EmbeddingProvider>,
    store: InMemoryVectorStore,
    score_threshold: bool,
}

impl InMemoryBackend {
    pub fn new(
        kind: BackendKind,
        collection: impl Into<String>,
        embeddings: Arc<dyn EmbeddingProvider>,
        store: InMemoryVectorStore,
    ) -> Self {
        Self {
            kind,
            collection: collection.into(),
            embeddings,
            store,
            score_threshold: true,
        }
    }

    /// Behave like a vendor without server-side score filtering
    pub fn without_score_threshold(mut self) -> Self {
        self.score_threshold = false;
        self
    }

    async fn embed(&self, documents: Vec<IndexedDocument>) -> IndexResult<Vec<StoredVector>> {
        let vectors = embed_batch(self.embeddings.as_ref(), &documents).await?;

        Ok(documents
            .into_iter()
            .zip(vectors)
            .map(|(document, vector)| StoredVector { document, vector })
            .collect())
    }

    async fn write(&self, stored: Vec<StoredVector>) {
        let mut collections = self.store.collections.write().await;
        let collection = collections.entry(self.collection.clone()).or_default();
        for item in stored {
            collection.insert(item.document.id(), item);
        }
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[async_trait]
impl VectorBackend for InMemoryBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn collection_name(&self) -> String {
        self.collection.clone()
    }

    async fn create(&self, documents: Vec<IndexedDocument>) -> IndexResult<IndexDescriptor> {
        if self.store.collection_len(&self.collection).await > 0 {
            return Err(IndexError::BackendConflict(self.collection.clone()));
        }

        let stored = self.embed(documents).await?;
        let count = stored.len();
        self.store
            .collections
            .write()
            .await
            .insert(self.collection.clone(), HashMap::new());
        self.write(stored).await;

        info!(collection = %self.collection, documents = count, "Created in-memory collection");
        Ok(IndexDescriptor::new(self.kind, self.collection.clone()))
    }

    async fn upsert(
        &self,
        documents: Vec<IndexedDocument>,
        duplicate_check: bool,
    ) -> IndexResult<()> {
        let documents = if duplicate_check {
            retain_missing(self, documents).await?
        } else {
            documents
        };
        if documents.is_empty() {
            return Ok(());
        }

        let stored = self.embed(documents).await?;
        self.write(stored).await;
        Ok(())
    }

    async fn exists_by_id(&self, id: Uuid) -> IndexResult<bool> {
        Ok(self
            .store
            .collections
            .read()
            .await
            .get(&self.collection)
            .is_some_and(|c| c.contains_key(&id)))
    }

    async fn delete_by_document_id(&self, document_id: Uuid) -> IndexResult<()> {
        let mut collections = self.store.collections.write().await;
        if let Some(collection) = collections.get_mut(&self.collection) {
            collection.retain(|_, item| item.document.metadata.doc_id != document_id);
        }
        Ok(())
    }

    async fn delete_collection(&self) -> IndexResult<()> {
        let removed = self
            .store
            .collections
            .write()
            .await
            .remove(&self.collection);
        if removed.is_none() {
            debug!(collection = %self.collection, "Collection already absent");
        }
        Ok(())
    }

    async fn count(&self) -> IndexResult<u64> {
        Ok(self.store.collection_len(&self.collection).await as u64)
    }

    async fn query(
        &self,
        text: &str,
        kind: SearchKind,
        options: &SearchOptions,
    ) -> IndexResult<Vec<ScoredDocument>> {
        if kind == SearchKind::SimilarityScoreThreshold && !self.score_threshold {
            return Err(IndexError::Unsupported {
                backend: self.kind,
                operation: "score threshold search",
            });
        }

        let query = self.embeddings.embed_query(text).await?;
        let collections = self.store.collections.read().await;
        let Some(collection) = collections.get(&self.collection) else {
            return Ok(vec![]);
        };

        let mut hits: Vec<ScoredDocument> = collection
            .values()
            .map(|item| ScoredDocument {
                doc_id: item.document.metadata.doc_id,
                page_content: item.document.page_content.clone(),
                qa_answer: Some(item.document.metadata.qa_answer.clone()),
                score: Some(cosine(&query, &item.vector)),
            })
            .collect();

        sort_by_score(&mut hits);

        if kind == SearchKind::SimilarityScoreThreshold {
            let threshold = options.threshold();
            hits.retain(|hit| hit.score.is_some_and(|s| s >= threshold));
        } else {
            for hit in &mut hits {
                hit.score = None;
            }
        }
        hits.truncate(options.top_k);

        Ok(hits)
    }

    fn supports_score_threshold(&self) -> bool {
        self.score_threshold
    }
}
