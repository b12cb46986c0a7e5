use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::status::DropStatus;
use super::{
    VectorBackend, embed_batch, http_client, http_failure, retain_missing, sort_by_score,
};
use crate::config::{MilvusConfig, Timeouts};
use crate::embedding::EmbeddingProvider;
use crate::error::{IndexError, IndexResult};
use crate::models::{
    BackendKind, IndexDescriptor, IndexedDocument, ScoredDocument, SearchKind, SearchOptions,
};

const ID_MAX_LENGTH: u32 = 64;
const OUTPUT_FIELDS: [&str; 3] = ["text", "doc_id", "qa_answer"];

/// Milvus REST API response wrapper
#[derive(Debug, Deserialize)]
struct MilvusResponse<T> {
    code: i32,
    data: Option<T>,
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct HasCollection {
    has: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CollectionStats {
    row_count: u64,
}

/// Milvus collection accessed over the v2 REST API. Entities are
/// `{id, vector, text, doc_id, document_id, app_id, qa_answer}` with the metadata kept in
/// dynamic fields; the metric is cosine so search distances are similarities.
pub struct MilvusBackend {
    client: Client,
    base_url: String,
    token: String,
    batch_size: usize,
    collection: String,
    embeddings: Arc<dyn EmbeddingProvider>,
}

impl MilvusBackend {
    pub fn new(
        config: &MilvusConfig,
        timeouts: Timeouts,
        collection: impl Into<String>,
        embeddings: Arc<dyn EmbeddingProvider>,
    ) -> IndexResult<Self> {
        Ok(Self {
            client: http_client(timeouts)?,
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            token: config.token(),
            batch_size: config.batch_size.max(1),
            collection: collection.into(),
            embeddings,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v2/vectordb/{}", self.base_url, path)
    }

    async fn post_raw(&self, path: &str, body: &Value) -> IndexResult<reqwest::Response> {
        Ok(self
            .client
            .post(self.url(path))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?)
    }

    /// POST and unwrap the `code`/`data` envelope
    async fn call<T: DeserializeOwned + Default>(&self, path: &str, body: Value) -> IndexResult<T> {
        let response = self.post_raw(path, &body).await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(http_failure(BackendKind::Milvus, status, &text));
        }

        let envelope: MilvusResponse<T> = response.json().await?;
        if envelope.code != 0 {
            return Err(IndexError::BackendRejected(format!(
                "milvus {} returned code {}: {}",
                path,
                envelope.code,
                envelope.message.unwrap_or_default()
            )));
        }

        Ok(envelope.data.unwrap_or_default())
    }

    async fn has_collection(&self) -> IndexResult<bool> {
        let data: HasCollection = self
            .call(
                "collections/has",
                json!({ "collectionName": self.collection }),
            )
            .await?;
        Ok(data.has)
    }

    async fn ensure_collection(&self, dimension: usize) -> IndexResult<()> {
        if self.has_collection().await? {
            return Ok(());
        }

        let _: Value = self
            .call("collections/create", create_body(&self.collection, dimension))
            .await?;

        info!(collection = %self.collection, dimension, "Created Milvus collection");
        Ok(())
    }

    async fn write(&self, documents: Vec<IndexedDocument>) -> IndexResult<()> {
        if documents.is_empty() {
            return Ok(());
        }

        for chunk in documents.chunks(self.batch_size) {
            let vectors = embed_batch(self.embeddings.as_ref(), chunk).await?;
            let Some(dimension) = vectors.first().map(Vec::len) else {
                return Err(IndexError::Embedding("No embeddings returned".to_string()));
            };
            self.ensure_collection(dimension).await?;

            let data: Vec<Value> = chunk
                .iter()
                .zip(vectors)
                .map(|(document, vector)| to_entity(document, vector))
                .collect();

            let _: Value = self
                .call(
                    "entities/upsert",
                    json!({ "collectionName": self.collection, "data": data }),
                )
                .await?;
        }

        Ok(())
    }
}

fn create_body(collection: &str, dimension: usize) -> Value {
    json!({
        "collectionName": collection,
        "dimension": dimension,
        "metricType": "COSINE",
        "idType": "VarChar",
        "primaryFieldName": "id",
        "vectorFieldName": "vector",
        "params": { "max_length": ID_MAX_LENGTH },
        "enableDynamicField": true,
    })
}

fn to_entity(document: &IndexedDocument, vector: Vec<f32>) -> Value {
    let metadata = &document.metadata;
    json!({
        "id": document.id(),
        "vector": vector,
        "text": document.page_content,
        "doc_id": metadata.doc_id,
        "document_id": metadata.document_id,
        "app_id": metadata.app_id,
        "qa_answer": metadata.qa_answer,
    })
}

fn doc_id_expr(document_id: Uuid) -> String {
    format!("doc_id == \"{}\"", document_id)
}

/// `threshold` drops hits below the similarity bound and keeps the score on the rest
fn parse_hits(rows: Vec<Value>, threshold: Option<f32>) -> Vec<ScoredDocument> {
    let mut hits: Vec<ScoredDocument> = rows
        .into_iter()
        .filter_map(|row| {
            let Some(doc_id) = row["doc_id"].as_str().and_then(|s| Uuid::parse_str(s).ok()) else {
                warn!("Skipping Milvus entity without doc_id");
                return None;
            };
            let similarity = row["distance"].as_f64().map(|d| d as f32);

            let score = match threshold {
                Some(min) => match similarity {
                    Some(s) if s >= min => Some(s),
                    _ => return None,
                },
                None => None,
            };

            Some(ScoredDocument {
                doc_id,
                page_content: row["text"].as_str().unwrap_or_default().to_string(),
                qa_answer: row["qa_answer"].as_str().map(str::to_string),
                score,
            })
        })
        .collect();

    if threshold.is_some() {
        sort_by_score(&mut hits);
    }
    hits
}

#[async_trait]
impl VectorBackend for MilvusBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Milvus
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

        info!(collection = %self.collection, documents = count, "Indexed documents into Milvus");
        Ok(IndexDescriptor::new(BackendKind::Milvus, self.collection.clone()))
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
        if !self.has_collection().await? {
            return Ok(false);
        }

        let rows: Vec<Value> = self
            .call(
                "entities/get",
                json!({
                    "collectionName": self.collection,
                    "id": [id.to_string()],
                    "outputFields": ["id"],
                }),
            )
            .await?;

        Ok(!rows.is_empty())
    }

    async fn delete_by_document_id(&self, document_id: Uuid) -> IndexResult<()> {
        if !self.has_collection().await? {
            return Ok(());
        }

        let _: Value = self
            .call(
                "entities/delete",
                json!({
                    "collectionName": self.collection,
                    "filter": doc_id_expr(document_id),
                }),
            )
            .await?;

        debug!(collection = %self.collection, doc_id = %document_id, "Deleted Milvus entities");
        Ok(())
    }

    async fn delete_collection(&self) -> IndexResult<()> {
        let response = self
            .post_raw(
                "collections/drop",
                &json!({ "collectionName": self.collection }),
            )
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let envelope = serde_json::from_str::<MilvusResponse<Value>>(&body).ok();
        let code = envelope.as_ref().map(|e| e.code);

        let outcome = DropStatus::milvus(status.as_u16(), code);
        if outcome == DropStatus::Absent {
            debug!(collection = %self.collection, ?code, "Milvus collection already absent");
        }
        outcome.into_result(&self.collection, || format!("HTTP {}: {}", status, body))
    }

    async fn count(&self) -> IndexResult<u64> {
        if !self.has_collection().await? {
            return Ok(0);
        }

        let stats: CollectionStats = self
            .call(
                "collections/get_stats",
                json!({ "collectionName": self.collection }),
            )
            .await?;
        Ok(stats.row_count)
    }

    async fn query(
        &self,
        text: &str,
        kind: SearchKind,
        options: &SearchOptions,
    ) -> IndexResult<Vec<ScoredDocument>> {
        let vector = self.embeddings.embed_query(text).await?;

        let rows: Vec<Value> = self
            .call(
                "entities/search",
                json!({
                    "collectionName": self.collection,
                    "data": [vector],
                    "annsField": "vector",
                    "limit": options.top_k,
                    "outputFields": OUTPUT_FIELDS,
                }),
            )
            .await?;

        let threshold = (kind == SearchKind::SimilarityScoreThreshold).then(|| options.threshold());
        Ok(parse_hits(rows, threshold))
    }
}
