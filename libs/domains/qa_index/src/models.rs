use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::error::{IndexError, IndexResult};

/// Prefix shared by every QA collection name
pub const COLLECTION_PREFIX: &str = "Vector_index_";

/// Suffix of collections written with the current QA schema
pub const QA_SUFFIX: &str = "_qa";

/// Score used by threshold searches when the caller gives none
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.95;

pub const DEFAULT_TOP_K: usize = 4;

/// Vector store vendor
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum BackendKind {
    Weaviate,
    Qdrant,
    Milvus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorStoreRef {
    pub class_prefix: String,
}

/// Where an owner's vectors live, persisted on the owner configuration row as
/// `{"type": "<kind>", "vector_store": {"class_prefix": "<name>"}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    /// `None` means the owner falls back to the configured default backend
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<BackendKind>,
    pub vector_store: VectorStoreRef,
}

impl IndexDescriptor {
    pub fn new(kind: BackendKind, class_prefix: impl Into<String>) -> Self {
        Self {
            kind: Some(kind),
            vector_store: VectorStoreRef {
                class_prefix: class_prefix.into(),
            },
        }
    }

    /// Descriptor for a freshly created collection of `owner_id`
    pub fn for_owner(kind: BackendKind, owner_id: Uuid) -> Self {
        Self::new(kind, collection_name_for_owner(owner_id))
    }

    pub fn class_prefix(&self) -> &str {
        &self.vector_store.class_prefix
    }

    /// Collection the descriptor points at. Prefixes from the pre-QA schema get the
    /// suffix appended; the stored prefix itself is left alone.
    pub fn collection_name(&self) -> String {
        let prefix = self.class_prefix();
        if prefix.ends_with(QA_SUFFIX) {
            prefix.to_string()
        } else {
            format!("{}{}", prefix, QA_SUFFIX)
        }
    }

    /// True for indexes written with the pre-QA schema. Mutating those forces a rebuild.
    pub fn is_origin(&self) -> bool {
        !self.class_prefix().ends_with(QA_SUFFIX)
    }

    pub fn from_json(raw: &str) -> IndexResult<Self> {
        serde_json::from_str(raw).map_err(|e| IndexError::Descriptor(e.to_string()))
    }

    pub fn to_json(&self) -> IndexResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// `Vector_index_<owner id with '_' for '-'>_qa`
pub fn collection_name_for_owner(owner_id: Uuid) -> String {
    format!(
        "{}{}{}",
        COLLECTION_PREFIX,
        owner_id.to_string().replace('-', "_"),
        QA_SUFFIX
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub doc_id: Uuid,
    pub document_id: Uuid,
    pub app_id: Uuid,
    pub qa_answer: String,
}

/// One QA entry as it is written to a vector store: the question is embedded,
/// the answer travels as metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub page_content: String,
    pub metadata: DocumentMetadata,
}

impl IndexedDocument {
    pub fn qa(entry_id: Uuid, owner_id: Uuid, question: &str, answer: &str) -> Self {
        Self {
            page_content: question.to_string(),
            metadata: DocumentMetadata {
                doc_id: entry_id,
                document_id: entry_id,
                app_id: owner_id,
                qa_answer: answer.to_string(),
            },
        }
    }

    pub fn id(&self) -> Uuid {
        self.metadata.doc_id
    }
}

/// A search hit. Pre-QA collections only stored `doc_id`, so the answer is optional.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredDocument {
    pub doc_id: Uuid,
    pub page_content: String,
    pub qa_answer: Option<String>,
    /// Set in threshold mode only
    pub score: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum SearchKind {
    /// Plain top-k
    #[default]
    Similarity,
    /// Top-k restricted to hits scoring at least the threshold
    SimilarityScoreThreshold,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    pub top_k: usize,
    pub score_threshold: Option<f32>,
}

impl SearchOptions {
    pub fn new(top_k: usize) -> Self {
        Self {
            top_k,
            score_threshold: None,
        }
    }

    pub fn with_score_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = Some(threshold);
        self
    }

    pub fn threshold(&self) -> f32 {
        self.score_threshold.unwrap_or(DEFAULT_SCORE_THRESHOLD)
    }
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self::new(DEFAULT_TOP_K)
    }
}
