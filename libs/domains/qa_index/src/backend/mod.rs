//! Vendor adapters behind one capability contract.
//!
//! Every adapter is bound to a single collection when it is constructed; the facade
//! never passes collection names around.

mod memory;
mod milvus;
mod qdrant;
pub mod status;
mod weaviate;

use std::collections::HashSet;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::embedding::EmbeddingProvider;
use crate::error::{IndexError, IndexResult};
use crate::models::{
    BackendKind, IndexDescriptor, IndexedDocument, ScoredDocument, SearchKind, SearchOptions,
};

pub use memory::{InMemoryBackend, InMemoryVectorStore};
pub use milvus::MilvusBackend;
pub use qdrant::QdrantBackend;
pub use weaviate::WeaviateBackend;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VectorBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Collection this adapter reads and writes
    fn collection_name(&self) -> String;

    /// Provision the collection, insert `documents` and return the descriptor to persist.
    ///
    /// Fails with `BackendConflict` when the collection already holds vectors.
    async fn create(&self, documents: Vec<IndexedDocument>) -> IndexResult<IndexDescriptor>;

    /// Insert or replace by id. With `duplicate_check`, ids already stored are skipped.
    async fn upsert(&self, documents: Vec<IndexedDocument>, duplicate_check: bool)
    -> IndexResult<()>;

    async fn exists_by_id(&self, id: Uuid) -> IndexResult<bool>;

    /// Remove every vector whose metadata `doc_id` equals `document_id`
    async fn delete_by_document_id(&self, document_id: Uuid) -> IndexResult<()>;

    /// Drop the collection. A vendor "not found" counts as success.
    async fn delete_collection(&self) -> IndexResult<()>;

    /// Number of stored vectors, 0 when the collection does not exist
    async fn count(&self) -> IndexResult<u64>;

    async fn query(
        &self,
        text: &str,
        kind: SearchKind,
        options: &SearchOptions,
    ) -> IndexResult<Vec<ScoredDocument>>;

    fn supports_score_threshold(&self) -> bool {
        true
    }
}

/// Drops documents whose id is already stored, and repeated ids within the batch.
pub(crate) async fn retain_missing<B>(
    backend: &B,
    documents: Vec<IndexedDocument>,
) -> IndexResult<Vec<IndexedDocument>>
where
    B: VectorBackend + ?Sized,
{
    let mut seen = HashSet::new();
    let mut missing = Vec::with_capacity(documents.len());

    for document in documents {
        let id = document.id();
        if !seen.insert(id) {
            continue;
        }
        if backend.exists_by_id(id).await? {
            debug!(doc_id = %id, collection = %backend.collection_name(), "Skipping stored document");
            continue;
        }
        missing.push(document);
    }

    Ok(missing)
}

/// Embeds the page contents of `documents`, one vector per document in order
pub(crate) async fn embed_batch(
    embeddings: &dyn EmbeddingProvider,
    documents: &[IndexedDocument],
) -> IndexResult<Vec<Vec<f32>>> {
    let texts: Vec<String> = documents.iter().map(|d| d.page_content.clone()).collect();
    let vectors = embeddings.embed_documents(&texts).await?;
    if vectors.len() != documents.len() {
        return Err(IndexError::Embedding(format!(
            "Expected {} embeddings, got {}",
            documents.len(),
            vectors.len()
        )));
    }
    Ok(vectors)
}

/// Error for a non-success HTTP answer from a REST vendor
pub(crate) fn http_failure(vendor: BackendKind, status: reqwest::StatusCode, body: &str) -> IndexError {
    let message = format!("{} returned {}: {}", vendor, status, body);
    match status {
        reqwest::StatusCode::BAD_GATEWAY
        | reqwest::StatusCode::SERVICE_UNAVAILABLE
        | reqwest::StatusCode::GATEWAY_TIMEOUT => IndexError::BackendUnavailable(message),
        _ => IndexError::BackendRejected(message),
    }
}

/// Shared client for the REST vendors
pub(crate) fn http_client(timeouts: crate::config::Timeouts) -> IndexResult<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(timeouts.connect)
        .timeout(timeouts.read)
        .build()
        .map_err(|e| IndexError::Internal(format!("Failed to build HTTP client: {}", e)))
}

/// Stable order for backends that return hits unsorted
pub(crate) fn sort_by_score(hits: &mut [ScoredDocument]) {
    hits.sort_by(|a, b| {
        b.score
            .unwrap_or(f32::MIN)
            .total_cmp(&a.score.unwrap_or(f32::MIN))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    #[tokio::test]
    async fn test_retain_missing_skips_stored_and_repeated_ids() {
        let owner = Uuid::new_v4();
        let stored = Uuid::new_v4();
        let fresh = Uuid::new_v4();

        let mut backend = MockVectorBackend::new();
        backend
            .expect_collection_name()
            .returning(|| "Vector_index_test_qa".to_string());
        backend
            .expect_exists_by_id()
            .with(eq(stored))
            .times(1)
            .returning(|_| Ok(true));
        backend
            .expect_exists_by_id()
            .with(eq(fresh))
            .times(1)
            .returning(|_| Ok(false));

        let documents = vec![
            IndexedDocument::qa(stored, owner, "q1", "a1"),
            IndexedDocument::qa(fresh, owner, "q2", "a2"),
            IndexedDocument::qa(fresh, owner, "q2 again", "a2"),
        ];

        let missing = retain_missing(&backend, documents).await.unwrap();

        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].id(), fresh);
        assert_eq!(missing[0].page_content, "q2");
    }

    #[test]
    fn test_http_failure_classification() {
        let unavailable = http_failure(
            BackendKind::Weaviate,
            reqwest::StatusCode::SERVICE_UNAVAILABLE,
            "starting",
        );
        assert!(matches!(unavailable, IndexError::BackendUnavailable(_)));

        let rejected = http_failure(
            BackendKind::Milvus,
            reqwest::StatusCode::UNPROCESSABLE_ENTITY,
            "bad vector",
        );
        assert!(matches!(rejected, IndexError::BackendRejected(msg) if msg.contains("bad vector")));
    }

    #[test]
    fn test_sort_by_score_descending() {
        let hit = |score: Option<f32>| ScoredDocument {
            doc_id: Uuid::new_v4(),
            page_content: String::new(),
            qa_answer: None,
            score,
        };
        let mut hits = vec![hit(Some(0.2)), hit(None), hit(Some(0.9))];

        sort_by_score(&mut hits);

        assert_eq!(hits[0].score, Some(0.9));
        assert_eq!(hits[1].score, Some(0.2));
        assert_eq!(hits[2].score, None);
    }
}
