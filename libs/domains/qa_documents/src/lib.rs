//! QA Documents Domain
//!
//! Question/answer knowledge entries of an owner, mirrored into the owner's vector index.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │   Service   │  ← validation, write-then-index, failure containment
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐      ┌──────────────────┐
//! │ Repository  │ ◄─── │ RepositorySource │ ← enabled entries for index rebuilds
//! └──────┬──────┘      └──────────────────┘
//!        │
//! ┌──────▼──────┐
//! │  Entities   │  ← app_model_configs, app_qa_documents
//! └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use domain_qa_documents::{CreateQaDocument, InMemoryQaDocumentRepository, QaDocumentService};
//! use domain_qa_index::{BackendKind, EmbeddingProvider, InMemoryBackendFactory, InMemoryDescriptorStore};
//!
//! # async fn example(embeddings: Arc<dyn EmbeddingProvider>, app_id: uuid::Uuid) {
//! let factory = InMemoryBackendFactory::new(embeddings).with_default_kind(BackendKind::Qdrant);
//! let descriptors = Arc::new(InMemoryDescriptorStore::new());
//! descriptors.add_owner(app_id).await;
//!
//! let service = QaDocumentService::new(
//!     InMemoryQaDocumentRepository::new(),
//!     Arc::new(factory),
//!     descriptors,
//! );
//!
//! let entry = service
//!     .create(app_id, CreateQaDocument::new("What is X?", "X is Y."))
//!     .await
//!     .unwrap();
//! assert!(entry.enabled);
//! # }
//! ```

pub mod entity;
pub mod error;
pub mod models;
pub mod postgres;
pub mod repository;
pub mod service;
pub mod source;

pub use error::{QaDocumentError, QaDocumentResult};
pub use models::{
    CreateQaDocument, DeleteOutcome, IndexStatus, NewQaDocument, QaDocument, QaDocumentFilter,
    QaDocumentSort, UpdateQaDocument,
};
pub use postgres::{PgDescriptorStore, PgQaDocumentRepository, REQUIRED_TABLES};
pub use repository::{InMemoryQaDocumentRepository, QaDocumentRepository};
pub use service::QaDocumentService;
pub use source::RepositorySource;
