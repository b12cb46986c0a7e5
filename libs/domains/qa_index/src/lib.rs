//! QA Vector Index
//!
//! Mirrors an owner's question/answer entries into a vector store (Weaviate, Qdrant or
//! Milvus) behind one backend-independent API.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │   VectorIndex    │  ← facade: descriptor, owner lock, recreate
//! └────────┬─────────┘
//!          │
//! ┌────────▼─────────┐     ┌──────────────────┐
//! │  BackendFactory  │────▶│ EmbeddingProvider│
//! └────────┬─────────┘     └──────────────────┘
//!          │
//! ┌────────▼─────────┐
//! │  VectorBackend   │  ← one adapter per vendor, bound to one collection
//! └──────────────────┘
//! ```
//!
//! The descriptor (`{"type": "qdrant", "vector_store": {"class_prefix": "..."}}`) lives on
//! the owner's configuration row and is the only record of where the vectors are. It is
//! written after the backend accepted the documents, never before.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use domain_qa_index::{
//!     IndexContext, InMemoryBackendFactory, InMemoryDescriptorStore, OpenAIProvider,
//!     Timeouts, BackendKind,
//! };
//! # use domain_qa_index::{DocumentSource, IndexResult, IndexedDocument};
//! # struct NoEntries;
//! # #[async_trait::async_trait]
//! # impl DocumentSource for NoEntries {
//! #     async fn enabled_documents(&self, _: uuid::Uuid) -> IndexResult<Vec<IndexedDocument>> {
//! #         Ok(vec![])
//! #     }
//! # }
//!
//! # async fn example() -> domain_qa_index::IndexResult<()> {
//! let embeddings = Arc::new(OpenAIProvider::from_env(Timeouts::default())?);
//! let factory = InMemoryBackendFactory::new(embeddings).with_default_kind(BackendKind::Qdrant);
//! let context = IndexContext::new(
//!     Arc::new(factory),
//!     Arc::new(InMemoryDescriptorStore::new()),
//!     Arc::new(NoEntries),
//! );
//!
//! let mut index = context.open(uuid::Uuid::new_v4()).await?;
//! index.rebuild().await?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod descriptor;
pub mod embedding;
pub mod error;
pub mod factory;
pub mod index;
pub mod lock;
pub mod models;
pub mod source;

pub use backend::{InMemoryBackend, InMemoryVectorStore, VectorBackend};
pub use config::{MilvusConfig, QdrantConfig, Timeouts, VectorStoreConfig, WeaviateConfig};
pub use descriptor::{DescriptorStore, InMemoryDescriptorStore};
pub use embedding::{CachedEmbedding, EmbeddingProvider, OpenAIConfig, OpenAIProvider};
pub use error::{IndexError, IndexResult};
pub use factory::{BackendFactory, ConfiguredBackendFactory, InMemoryBackendFactory};
pub use index::{IndexContext, VectorIndex};
pub use lock::{OwnerGuard, OwnerLocks};
pub use models::{
    BackendKind, DocumentMetadata, IndexDescriptor, IndexedDocument, ScoredDocument,
    SearchKind, SearchOptions, collection_name_for_owner,
};
pub use source::DocumentSource;
