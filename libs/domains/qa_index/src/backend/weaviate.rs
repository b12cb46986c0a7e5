use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::status::DropStatus;
use super::{VectorBackend, embed_batch, http_client, http_failure, retain_missing};
use crate::config::{Timeouts, WeaviateConfig};
use crate::embedding::EmbeddingProvider;
use crate::error::{IndexError, IndexResult};
use crate::models::{
    BackendKind, IndexDescriptor, IndexedDocument, ScoredDocument, SearchKind, SearchOptions,
};

const TEXT_KEY: &str = "text";
const QA_PROPERTIES: [&str; 4] = ["doc_id", "document_id", "app_id", "qa_answer"];

/// Weaviate class with `vectorizer: none`; object ids are entry ids and the metadata
/// fields are flattened into class properties next to `text`.
pub struct WeaviateBackend {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    batch_size: usize,
    class: String,
    embeddings: Arc<dyn EmbeddingProvider>,
    origin_schema: bool,
}

impl WeaviateBackend {
    pub fn new(
        config: &WeaviateConfig,
        timeouts: Timeouts,
        class: impl Into<String>,
        embeddings: Arc<dyn EmbeddingProvider>,
    ) -> IndexResult<Self> {
        Ok(Self {
            client: http_client(timeouts)?,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            batch_size: config.batch_size.max(1),
            class: class.into(),
            embeddings,
            origin_schema: false,
        })
    }

    /// Classes written before the QA schema only carry `doc_id`
    pub fn with_origin_schema(mut self, origin: bool) -> Self {
        self.origin_schema = origin;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1{}", self.endpoint, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> IndexResult<Response> {
        let response = self.authorized(request).send().await?;
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(http_failure(BackendKind::Weaviate, status, &body))
    }

    async fn class_exists(&self) -> IndexResult<bool> {
        let response = self
            .authorized(self.client.get(self.url(&format!("/schema/{}", self.class))))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(http_failure(BackendKind::Weaviate, status, &body))
            }
        }
    }

    async fn ensure_class(&self) -> IndexResult<()> {
        if self.class_exists().await? {
            return Ok(());
        }

        self.send(self.client.post(self.url("/schema")).json(&class_schema(&self.class)))
            .await?;
        info!(class = %self.class, "Created Weaviate class");
        Ok(())
    }

    async fn graphql(&self, query: String) -> IndexResult<Value> {
        let response: GraphQlResponse = self
            .send(self.client.post(self.url("/graphql")).json(&json!({ "query": query })))
            .await?
            .json()
            .await?;

        if let Some(errors) = response.errors.filter(|e| !e.is_empty()) {
            let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
            return Err(IndexError::BackendRejected(format!(
                "weaviate graphql: {}",
                messages.join("; ")
            )));
        }

        Ok(response.data.unwrap_or(Value::Null))
    }

    async fn write(&self, documents: Vec<IndexedDocument>) -> IndexResult<()> {
        if documents.is_empty() {
            return Ok(());
        }
        self.ensure_class().await?;

        for chunk in documents.chunks(self.batch_size) {
            let vectors = embed_batch(self.embeddings.as_ref(), chunk).await?;

            let objects: Vec<Value> = chunk
                .iter()
                .zip(vectors)
                .map(|(document, vector)| to_object(&self.class, document, vector))
                .collect();

            let results: Vec<BatchObjectResult> = self
                .send(
                    self.client
                        .post(self.url("/batch/objects"))
                        .json(&json!({ "objects": objects })),
                )
                .await?
                .json()
                .await?;

            let errors: Vec<String> = results
                .into_iter()
                .flat_map(BatchObjectResult::error_messages)
                .collect();
            if !errors.is_empty() {
                return Err(IndexError::BackendRejected(format!(
                    "weaviate batch: {}",
                    errors.join("; ")
                )));
            }
        }

        Ok(())
    }

    fn properties(&self) -> String {
        if self.origin_schema {
            format!("{} doc_id", TEXT_KEY)
        } else {
            format!("{} doc_id qa_answer", TEXT_KEY)
        }
    }
}

fn class_schema(class: &str) -> Value {
    let mut properties = vec![json!({ "name": TEXT_KEY, "dataType": ["text"] })];
    properties.extend(
        QA_PROPERTIES
            .iter()
            .map(|name| json!({ "name": name, "dataType": ["text"] })),
    );

    json!({
        "class": class,
        "vectorizer": "none",
        "properties": properties,
    })
}

fn to_object(class: &str, document: &IndexedDocument, vector: Vec<f32>) -> Value {
    let metadata = &document.metadata;
    json!({
        "class": class,
        "id": document.id(),
        "vector": vector,
        "properties": {
            TEXT_KEY: document.page_content,
            "doc_id": metadata.doc_id,
            "document_id": metadata.document_id,
            "app_id": metadata.app_id,
            "qa_answer": metadata.qa_answer,
        },
    })
}

fn doc_id_filter(class: &str, document_id: Uuid) -> Value {
    json!({
        "match": {
            "class": class,
            "where": {
                "operator": "Equal",
                "path": ["doc_id"],
                "valueText": document_id.to_string(),
            },
        },
    })
}

/// Cosine distance bound equivalent to a minimum similarity
fn max_distance(threshold: f32) -> f32 {
    1.0 - threshold
}

fn parse_hits(data: &Value, class: &str, with_score: bool) -> Vec<ScoredDocument> {
    let Some(objects) = data["Get"][class].as_array() else {
        return vec![];
    };

    objects
        .iter()
        .filter_map(|object| {
            let doc_id = object["doc_id"].as_str().and_then(|s| Uuid::parse_str(s).ok());
            let Some(doc_id) = doc_id else {
                warn!(class, "Skipping object without doc_id");
                return None;
            };
            let score = object["_additional"]["distance"]
                .as_f64()
                .map(|d| 1.0 - d as f32);

            Some(ScoredDocument {
                doc_id,
                page_content: object[TEXT_KEY].as_str().unwrap_or_default().to_string(),
                qa_answer: object["qa_answer"].as_str().map(str::to_string),
                score: if with_score { score } else { None },
            })
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<Value>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct BatchObjectResult {
    #[serde(default)]
    result: Option<BatchResult>,
}

#[derive(Debug, Deserialize)]
struct BatchResult {
    #[serde(default)]
    errors: Option<BatchErrors>,
}

#[derive(Debug, Deserialize)]
struct BatchErrors {
    #[serde(default)]
    error: Vec<GraphQlError>,
}

impl BatchObjectResult {
    fn error_messages(self) -> Vec<String> {
        self.result
            .and_then(|r| r.errors)
            .map(|e| e.error.into_iter().map(|e| e.message).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl VectorBackend for WeaviateBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Weaviate
    }

    fn collection_name(&self) -> String {
        self.class.clone()
    }

    async fn create(&self, documents: Vec<IndexedDocument>) -> IndexResult<IndexDescriptor> {
        if self.count().await? > 0 {
            return Err(IndexError::BackendConflict(self.class.clone()));
        }

        let count = documents.len();
        self.ensure_class().await?;
        self.write(documents).await?;

        info!(class = %self.class, documents = count, "Indexed documents into Weaviate");
        Ok(IndexDescriptor::new(BackendKind::Weaviate, self.class.clone()))
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
        let response = self
            .authorized(
                self.client
                    .head(self.url(&format!("/objects/{}/{}", self.class, id))),
            )
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(http_failure(BackendKind::Weaviate, status, "")),
        }
    }

    async fn delete_by_document_id(&self, document_id: Uuid) -> IndexResult<()> {
        if !self.class_exists().await? {
            debug!(class = %self.class, "Weaviate class absent, nothing to delete");
            return Ok(());
        }

        self.send(
            self.client
                .delete(self.url("/batch/objects"))
                .json(&doc_id_filter(&self.class, document_id)),
        )
        .await?;

        debug!(class = %self.class, doc_id = %document_id, "Deleted Weaviate objects");
        Ok(())
    }

    async fn delete_collection(&self) -> IndexResult<()> {
        let response = self
            .authorized(
                self.client
                    .delete(self.url(&format!("/schema/{}", self.class))),
            )
            .send()
            .await?;

        let status = response.status();
        let outcome = DropStatus::weaviate(status.as_u16());
        if outcome == DropStatus::Absent {
            debug!(class = %self.class, %status, "Weaviate class already absent");
        }
        let body = response.text().await.unwrap_or_default();
        outcome.into_result(&self.class, || format!("HTTP {}: {}", status, body))
    }

    async fn count(&self) -> IndexResult<u64> {
        if !self.class_exists().await? {
            return Ok(0);
        }

        let data = self
            .graphql(format!("{{ Aggregate {{ {} {{ meta {{ count }} }} }} }}", self.class))
            .await?;

        Ok(data["Aggregate"][&self.class][0]["meta"]["count"]
            .as_u64()
            .unwrap_or(0))
    }

    async fn query(
        &self,
        text: &str,
        kind: SearchKind,
        options: &SearchOptions,
    ) -> IndexResult<Vec<ScoredDocument>> {
        let vector = self.embeddings.embed_query(text).await?;
        let vector = serde_json::to_string(&vector)?;

        let near = match kind {
            SearchKind::SimilarityScoreThreshold => format!(
                "nearVector: {{ vector: {}, distance: {} }}",
                vector,
                max_distance(options.threshold())
            ),
            SearchKind::Similarity => format!("nearVector: {{ vector: {} }}", vector),
        };

        let query = format!(
            "{{ Get {{ {}({}, limit: {}) {{ {} _additional {{ id distance }} }} }} }}",
            self.class,
            near,
            options.top_k,
            self.properties()
        );

        let data = self.graphql(query).await?;
        Ok(parse_hits(
            &data,
            &self.class,
            kind == SearchKind::SimilarityScoreThreshold,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_schema_has_text_and_metadata() {
        let schema = class_schema("Vector_index_a_qa");
        let names: Vec<&str> = schema["properties"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["name"].as_str().unwrap())
            .collect();

        assert_eq!(schema["vectorizer"], "none");
        assert_eq!(names, ["text", "doc_id", "document_id", "app_id", "qa_answer"]);
    }

    #[test]
    fn test_object_flattens_metadata() {
        let id = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let doc = IndexedDocument::qa(id, owner, "What is X?", "X is Y.");

        let object = to_object("Vector_index_a_qa", &doc, vec![0.5, 0.5]);

        assert_eq!(object["id"], id.to_string());
        assert_eq!(object["properties"]["text"], "What is X?");
        assert_eq!(object["properties"]["doc_id"], id.to_string());
        assert_eq!(object["properties"]["app_id"], owner.to_string());
        assert_eq!(object["properties"]["qa_answer"], "X is Y.");
    }

    #[test]
    fn test_doc_id_filter_shape() {
        let id = Uuid::new_v4();
        let filter = doc_id_filter("Vector_index_a_qa", id);

        assert_eq!(filter["match"]["where"]["operator"], "Equal");
        assert_eq!(filter["match"]["where"]["path"][0], "doc_id");
        assert_eq!(filter["match"]["where"]["valueText"], id.to_string());
    }

    #[test]
    fn test_parse_hits_converts_distance() {
        let id = Uuid::new_v4();
        let data = json!({
            "Get": {
                "Vector_index_a_qa": [
                    {
                        "text": "What is X?",
                        "doc_id": id.to_string(),
                        "qa_answer": "X is Y.",
                        "_additional": { "distance": 0.02 }
                    },
                    { "text": "broken", "_additional": { "distance": 0.5 } }
                ]
            }
        });

        let hits = parse_hits(&data, "Vector_index_a_qa", true);

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].doc_id, id);
        assert!(hits[0].score.is_some_and(|s| (s - 0.98).abs() < 1e-6));

        let unscored = parse_hits(&data, "Vector_index_a_qa", false);
        assert_eq!(unscored[0].score, None);
    }

    #[test]
    fn test_batch_errors_are_collected() {
        let results: Vec<BatchObjectResult> = serde_json::from_value(json!([
            { "result": {} },
            { "result": { "errors": { "error": [{ "message": "vector length mismatch" }] } } }
        ]))
        .unwrap();

        let errors: Vec<String> = results
            .into_iter()
            .flat_map(BatchObjectResult::error_messages)
            .collect();

        assert_eq!(errors, vec!["vector length mismatch".to_string()]);
    }

    #[test]
    fn test_max_distance() {
        assert!((max_distance(0.95) - 0.05).abs() < 1e-6);
    }

    use crate::embedding::MockEmbeddingProvider;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CLASS: &str = "Vector_index_a_qa";

    fn backend(server: &MockServer, embeddings: MockEmbeddingProvider) -> WeaviateBackend {
        WeaviateBackend::new(
            &WeaviateConfig::new(server.uri()),
            Timeouts::default(),
            CLASS,
            Arc::new(embeddings),
        )
        .unwrap()
    }

    async fn mount_class(server: &MockServer, exists: bool) {
        let response = if exists {
            ResponseTemplate::new(200).set_body_json(class_schema(CLASS))
        } else {
            ResponseTemplate::new(404)
        };
        Mock::given(method("GET"))
            .and(path(format!("/v1/schema/{}", CLASS)))
            .respond_with(response)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_delete_from_missing_class_is_a_no_op() {
        let server = MockServer::start().await;
        mount_class(&server, false).await;
        Mock::given(method("DELETE"))
            .and(path("/v1/batch/objects"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let backend = backend(&server, MockEmbeddingProvider::new());

        backend.delete_by_document_id(Uuid::new_v4()).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_from_existing_class_sends_batch_delete() {
        let server = MockServer::start().await;
        mount_class(&server, true).await;
        Mock::given(method("DELETE"))
            .and(path("/v1/batch/objects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": {} })))
            .expect(1)
            .mount(&server)
            .await;

        let backend = backend(&server, MockEmbeddingProvider::new());

        backend.delete_by_document_id(Uuid::new_v4()).await.unwrap();
    }

    #[tokio::test]
    async fn test_short_embedding_batch_writes_nothing() {
        let server = MockServer::start().await;
        mount_class(&server, true).await;
        Mock::given(method("POST"))
            .and(path("/v1/batch/objects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(0)
            .mount(&server)
            .await;

        let mut embeddings = MockEmbeddingProvider::new();
        embeddings
            .expect_embed_documents()
            .returning(|_| Ok(vec![vec![1.0, 0.0]]));
        let backend = backend(&server, embeddings);
        let owner = Uuid::new_v4();
        let documents = vec![
            IndexedDocument::qa(Uuid::new_v4(), owner, "What is X?", "X."),
            IndexedDocument::qa(Uuid::new_v4(), owner, "What is Y?", "Y."),
        ];

        let err = backend.upsert(documents, false).await.unwrap_err();

        assert!(matches!(err, IndexError::Embedding(msg) if msg.contains("Expected 2")));
    }
}
