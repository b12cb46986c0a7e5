use thiserror::Error;
use uuid::Uuid;

use crate::models::BackendKind;

#[derive(Debug, Error)]
pub enum IndexError {
    /// Missing embedding or vector store settings; raised before any mutation
    #[error("Vector index not configured: {0}")]
    NotConfigured(String),

    #[error("Vector store unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Collection {0} already exists and is not empty")]
    BackendConflict(String),

    /// The vector store answered but refused the request
    #[error("Vector store rejected request: {0}")]
    BackendRejected(String),

    #[error("Embedding quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Owner not found: {0}")]
    OwnerNotFound(Uuid),

    #[error("{backend} does not support {operation}")]
    Unsupported {
        backend: BackendKind,
        operation: &'static str,
    },

    #[error("Invalid index descriptor: {0}")]
    Descriptor(String),

    /// Reading entries or persisting the descriptor failed
    #[error("Index storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type IndexResult<T> = Result<T, IndexError>;

impl From<qdrant_client::QdrantError> for IndexError {
    fn from(err: qdrant_client::QdrantError) -> Self {
        IndexError::BackendUnavailable(format!("Qdrant: {}", err))
    }
}

impl From<reqwest::Error> for IndexError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            IndexError::BackendUnavailable(err.to_string())
        } else if err.is_decode() {
            IndexError::Internal(format!("Malformed response: {}", err))
        } else {
            IndexError::BackendRejected(err.to_string())
        }
    }
}

impl From<serde_json::Error> for IndexError {
    fn from(err: serde_json::Error) -> Self {
        IndexError::Internal(format!("JSON error: {}", err))
    }
}

impl From<core_config::ConfigError> for IndexError {
    fn from(err: core_config::ConfigError) -> Self {
        IndexError::NotConfigured(err.to_string())
    }
}
