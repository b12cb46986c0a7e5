use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use qdrant_client::qdrant::{
    self, Condition, CountPointsBuilder, CreateCollectionBuilder,
    CreateFieldIndexCollectionBuilder, DeletePointsBuilder, Distance, FieldType, Filter,
    GetPointsBuilder, PointId, PointStruct, SearchPointsBuilder, UpsertPointsBuilder,
    Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::status::DropStatus;
use super::{VectorBackend, embed_batch, retain_missing};
use crate::config::{QdrantConfig, Timeouts};
use crate::embedding::EmbeddingProvider;
use crate::error::{IndexError, IndexResult};
use crate::models::{
    BackendKind, IndexDescriptor, IndexedDocument, ScoredDocument, SearchKind, SearchOptions,
};

const CONTENT_KEY: &str = "page_content";
const DOC_ID_KEY: &str = "metadata.doc_id";
const UPSERT_CHUNK: usize = 100;

/// Points carry `{"page_content": question, "metadata": {doc_id, document_id, app_id,
/// qa_answer}}`; the point id is the entry id.
pub struct QdrantBackend {
    client: Qdrant,
    collection: String,
    embeddings: Arc<dyn EmbeddingProvider>,
}

impl QdrantBackend {
    pub fn new(
        config: &QdrantConfig,
        timeouts: Timeouts,
        collection: impl Into<String>,
        embeddings: Arc<dyn EmbeddingProvider>,
    ) -> IndexResult<Self> {
        let mut builder = Qdrant::from_url(&config.url)
            .timeout(timeouts.read)
            .connect_timeout(timeouts.connect);

        if let Some(api_key) = &config.api_key {
            builder = builder.api_key(api_key.clone());
        }

        let client = builder
            .build()
            .map_err(|e| IndexError::NotConfigured(format!("Qdrant client: {}", e)))?;

        Ok(Self::from_client(client, collection, embeddings))
    }

    pub fn from_client(
        client: Qdrant,
        collection: impl Into<String>,
        embeddings: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            client,
            collection: collection.into(),
            embeddings,
        }
    }

    async fn ensure_collection(&self, dimension: usize) -> IndexResult<()> {
        if self.client.collection_exists(self.collection.as_str()).await? {
            return Ok(());
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection).vectors_config(
                    VectorParamsBuilder::new(dimension as u64, Distance::Cosine),
                ),
            )
            .await?;

        self.client
            .create_field_index(CreateFieldIndexCollectionBuilder::new(
                &self.collection,
                DOC_ID_KEY,
                FieldType::Keyword,
            ))
            .await?;

        info!(collection = %self.collection, dimension, "Created Qdrant collection");
        Ok(())
    }

    async fn write(&self, documents: Vec<IndexedDocument>) -> IndexResult<()> {
        if documents.is_empty() {
            return Ok(());
        }

        let vectors = embed_batch(self.embeddings.as_ref(), &documents).await?;
        let Some(dimension) = vectors.first().map(Vec::len) else {
            return Err(IndexError::Embedding("No embeddings returned".to_string()));
        };
        self.ensure_collection(dimension).await?;

        let points = documents
            .into_iter()
            .zip(vectors)
            .map(|(document, vector)| to_point(document, vector))
            .collect::<IndexResult<Vec<_>>>()?;

        for chunk in points.chunks(UPSERT_CHUNK) {
            self.client
                .upsert_points(UpsertPointsBuilder::new(&self.collection, chunk.to_vec()).wait(true))
                .await?;
        }

        Ok(())
    }
}

fn point_id(id: Uuid) -> PointId {
    PointId::from(id.to_string())
}

fn to_point(document: IndexedDocument, vector: Vec<f32>) -> IndexResult<PointStruct> {
    let id = document.id();
    let payload = Payload::try_from(json!({
        CONTENT_KEY: document.page_content,
        "metadata": document.metadata,
    }))?;

    Ok(PointStruct::new(point_id(id), vector, payload))
}

fn qdrant_value_to_json(val: QdrantValue) -> serde_json::Value {
    use qdrant::value::Kind;

    match val.kind {
        Some(Kind::BoolValue(b)) => serde_json::Value::Bool(b),
        Some(Kind::IntegerValue(i)) => serde_json::Value::Number(i.into()),
        Some(Kind::DoubleValue(f)) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Some(Kind::StringValue(s)) => serde_json::Value::String(s),
        Some(Kind::StructValue(s)) => serde_json::Value::Object(
            s.fields
                .into_iter()
                .map(|(k, v)| (k, qdrant_value_to_json(v)))
                .collect(),
        ),
        Some(Kind::ListValue(l)) => {
            serde_json::Value::Array(l.values.into_iter().map(qdrant_value_to_json).collect())
        }
        Some(Kind::NullValue(_)) | None => serde_json::Value::Null,
    }
}

/// `None` when the point lacks a usable `metadata.doc_id`
fn to_hit(payload: HashMap<String, QdrantValue>, score: Option<f32>) -> Option<ScoredDocument> {
    let payload: serde_json::Map<String, serde_json::Value> = payload
        .into_iter()
        .map(|(k, v)| (k, qdrant_value_to_json(v)))
        .collect();

    let metadata = payload.get("metadata")?;
    let doc_id = metadata
        .get("doc_id")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())?;

    Some(ScoredDocument {
        doc_id,
        page_content: payload
            .get(CONTENT_KEY)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        qa_answer: metadata
            .get("qa_answer")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        score,
    })
}

#[async_trait]
impl VectorBackend for QdrantBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Qdrant
    }

    fn collection_name(&self) -> String {
        self.collection.clone()
    }

    async fn create(&self, documents: Vec<IndexedDocument>) -> IndexResult<IndexDescriptor> {
        if self.count().await? > 0 {
            return Err(IndexError::BackendConflict(self.collection.clone()));
        }

        let count = documents.len();
        self.write(documents).await?;

        info!(collection = %self.collection, documents = count, "Indexed documents into Qdrant");
        Ok(IndexDescriptor::new(BackendKind::Qdrant, self.collection.clone()))
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
        self.write(documents).await
    }

    async fn exists_by_id(&self, id: Uuid) -> IndexResult<bool> {
        if !self.client.collection_exists(self.collection.as_str()).await? {
            return Ok(false);
        }

        let response = self
            .client
            .get_points(
                GetPointsBuilder::new(&self.collection, vec![point_id(id)])
                    .with_payload(false)
                    .with_vectors(false),
            )
            .await?;

        Ok(!response.result.is_empty())
    }

    async fn delete_by_document_id(&self, document_id: Uuid) -> IndexResult<()> {
        if !self.client.collection_exists(self.collection.as_str()).await? {
            debug!(collection = %self.collection, "Qdrant collection absent, nothing to delete");
            return Ok(());
        }

        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(Filter::must([Condition::matches(
                        DOC_ID_KEY,
                        document_id.to_string(),
                    )]))
                    .wait(true),
            )
            .await?;

        debug!(collection = %self.collection, doc_id = %document_id, "Deleted Qdrant points");
        Ok(())
    }

    async fn delete_collection(&self) -> IndexResult<()> {
        let existed = self.client.collection_exists(self.collection.as_str()).await?;
        let acknowledged = if existed {
            self.client.delete_collection(self.collection.as_str()).await?.result
        } else {
            debug!(collection = %self.collection, "Qdrant collection already absent");
            false
        };

        DropStatus::qdrant(existed, acknowledged).into_result(&self.collection, || {
            "Qdrant did not acknowledge the drop".to_string()
        })
    }

    async fn count(&self) -> IndexResult<u64> {
        if !self.client.collection_exists(self.collection.as_str()).await? {
            return Ok(0);
        }

        let response = self
            .client
            .count(CountPointsBuilder::new(&self.collection).exact(true))
            .await?;

        Ok(response.result.map(|r| r.count).unwrap_or(0))
    }

    async fn query(
        &self,
        text: &str,
        kind: SearchKind,
        options: &SearchOptions,
    ) -> IndexResult<Vec<ScoredDocument>> {
        let vector = self.embeddings.embed_query(text).await?;

        let mut builder = SearchPointsBuilder::new(&self.collection, vector, options.top_k as u64)
            .with_payload(true);
        if kind == SearchKind::SimilarityScoreThreshold {
            builder = builder.score_threshold(options.threshold());
        }

        let response = self.client.search_points(builder).await?;

        let mut hits = Vec::with_capacity(response.result.len());
        for point in response.result {
            let score = (kind == SearchKind::SimilarityScoreThreshold).then_some(point.score);
            match to_hit(point.payload, score) {
                Some(hit) => hits.push(hit),
                None => warn!(collection = %self.collection, "Skipping point without doc_id"),
            }
        }

        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload_of(document: IndexedDocument) -> HashMap<String, QdrantValue> {
        let point = to_point(document, vec![0.1, 0.2]).unwrap();
        point.payload
    }

    #[test]
    fn test_point_payload_round_trips_into_hit() {
        let id = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let payload = payload_of(IndexedDocument::qa(id, owner, "What is X?", "X is Y."));

        let hit = to_hit(payload, Some(0.97)).unwrap();

        assert_eq!(hit.doc_id, id);
        assert_eq!(hit.page_content, "What is X?");
        assert_eq!(hit.qa_answer.as_deref(), Some("X is Y."));
        assert_eq!(hit.score, Some(0.97));
    }

    #[test]
    fn test_origin_payload_without_answer() {
        let id = Uuid::new_v4();
        let payload: Payload = Payload::try_from(json!({
            "page_content": "legacy",
            "metadata": { "doc_id": id.to_string() }
        }))
        .unwrap();
        let payload: HashMap<String, QdrantValue> = payload.into();

        let hit = to_hit(payload, None).unwrap();

        assert_eq!(hit.doc_id, id);
        assert_eq!(hit.qa_answer, None);
    }

    #[test]
    fn test_payload_without_doc_id_is_skipped() {
        let payload: Payload = Payload::try_from(json!({ "page_content": "orphan" })).unwrap();
        assert!(to_hit(payload.into(), None).is_none());
    }

    #[test]
    fn test_nested_value_conversion() {
        let payload: Payload = Payload::try_from(json!({
            "list": [1, "two", true],
            "nested": { "depth": 2.5 }
        }))
        .unwrap();
        let map: HashMap<String, QdrantValue> = payload.into();

        let list = qdrant_value_to_json(map["list"].clone());
        let nested = qdrant_value_to_json(map["nested"].clone());

        assert_eq!(list, json!([1, "two", true]));
        assert_eq!(nested, json!({ "depth": 2.5 }));
    }
}
