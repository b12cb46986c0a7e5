use std::str::FromStr;
use std::time::Duration;

use core_config::{ConfigError, FromEnv, env_optional, env_parse_or, env_required};

use crate::models::BackendKind;

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
const DEFAULT_READ_TIMEOUT_SECS: u64 = 60;
const DEFAULT_BATCH_SIZE: usize = 100;
const DEFAULT_EMBEDDING_CACHE_CAPACITY: usize = 10_000;

/// Client timeouts shared by every vector store adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Duration,
    pub read: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            read: Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WeaviateConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub batch_size: usize,
}

impl WeaviateConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: None,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

impl FromEnv for WeaviateConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: env_required("WEAVIATE_ENDPOINT")?,
            api_key: env_optional("WEAVIATE_API_KEY"),
            batch_size: env_parse_or("WEAVIATE_BATCH_SIZE", DEFAULT_BATCH_SIZE)?,
        })
    }
}

/// Qdrant gRPC endpoint, usually `http://host:6334`
#[derive(Debug, Clone)]
pub struct QdrantConfig {
    pub url: String,
    pub api_key: Option<String>,
}

impl QdrantConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

impl FromEnv for QdrantConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            url: env_required("QDRANT_URL")?,
            api_key: env_optional("QDRANT_API_KEY"),
        })
    }
}

/// Milvus REST (v2) endpoint, usually `http://host:19530`
#[derive(Debug, Clone)]
pub struct MilvusConfig {
    pub endpoint: String,
    pub user: String,
    pub password: String,
    pub batch_size: usize,
}

impl MilvusConfig {
    pub fn new(
        endpoint: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            user: user.into(),
            password: password.into(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Milvus accepts `user:password` as a bearer token
    pub fn token(&self) -> String {
        format!("{}:{}", self.user, self.password)
    }
}

impl FromEnv for MilvusConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: env_required("MILVUS_ENDPOINT")?,
            user: env_required("MILVUS_USER")?,
            password: env_required("MILVUS_PASSWORD")?,
            batch_size: env_parse_or("MILVUS_BATCH_SIZE", DEFAULT_BATCH_SIZE)?,
        })
    }
}

/// Process-wide vector store settings.
///
/// A vendor section is `None` when its endpoint variable is unset. Opening an index on
/// such a vendor fails with `NotConfigured`; a section that is present but incomplete
/// fails here instead.
#[derive(Debug, Clone)]
pub struct VectorStoreConfig {
    /// Backend for owners that have no descriptor yet (`VECTOR_STORE`)
    pub default_kind: Option<BackendKind>,
    pub timeouts: Timeouts,
    /// Document embeddings kept in memory (`EMBEDDING_CACHE_CAPACITY`)
    pub embedding_cache_capacity: usize,
    pub weaviate: Option<WeaviateConfig>,
    pub qdrant: Option<QdrantConfig>,
    pub milvus: Option<MilvusConfig>,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            default_kind: None,
            timeouts: Timeouts::default(),
            embedding_cache_capacity: DEFAULT_EMBEDDING_CACHE_CAPACITY,
            weaviate: None,
            qdrant: None,
            milvus: None,
        }
    }
}

impl VectorStoreConfig {
    pub fn with_default_kind(mut self, kind: BackendKind) -> Self {
        self.default_kind = Some(kind);
        self
    }
}

fn section<T: FromEnv>(marker: &str) -> Result<Option<T>, ConfigError> {
    match env_optional(marker) {
        Some(_) => T::from_env().map(Some),
        None => Ok(None),
    }
}

impl FromEnv for VectorStoreConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let default_kind = env_optional("VECTOR_STORE")
            .map(|raw| {
                BackendKind::from_str(raw.trim()).map_err(|_| ConfigError::ParseError {
                    key: "VECTOR_STORE".to_string(),
                    details: format!("unsupported vector store '{}'", raw),
                })
            })
            .transpose()?;

        let timeouts = Timeouts {
            connect: Duration::from_secs(env_parse_or(
                "VECTOR_CONNECT_TIMEOUT_SECS",
                DEFAULT_CONNECT_TIMEOUT_SECS,
            )?),
            read: Duration::from_secs(env_parse_or(
                "VECTOR_READ_TIMEOUT_SECS",
                DEFAULT_READ_TIMEOUT_SECS,
            )?),
        };

        let embedding_cache_capacity =
            env_parse_or("EMBEDDING_CACHE_CAPACITY", DEFAULT_EMBEDDING_CACHE_CAPACITY)?;
        if embedding_cache_capacity == 0 {
            return Err(ConfigError::ParseError {
                key: "EMBEDDING_CACHE_CAPACITY".to_string(),
                details: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            default_kind,
            timeouts,
            embedding_cache_capacity,
            weaviate: section("WEAVIATE_ENDPOINT")?,
            qdrant: section("QDRANT_URL")?,
            milvus: section("MILVUS_ENDPOINT")?,
        })
    }
}
