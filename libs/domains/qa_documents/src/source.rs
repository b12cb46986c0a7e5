use std::sync::Arc;

use async_trait::async_trait;
use domain_qa_index::{DocumentSource, IndexError, IndexResult, IndexedDocument};
use uuid::Uuid;

use crate::repository::QaDocumentRepository;

/// Feeds index rebuilds from the entry repository
pub struct RepositorySource {
    repository: Arc<dyn QaDocumentRepository>,
}

impl RepositorySource {
    pub fn new(repository: Arc<dyn QaDocumentRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl DocumentSource for RepositorySource {
    async fn enabled_documents(&self, owner_id: Uuid) -> IndexResult<Vec<IndexedDocument>> {
        let entries = self
            .repository
            .list_enabled(owner_id)
            .await
            .map_err(IndexError::from)?;

        Ok(entries.iter().map(|e| e.to_indexed()).collect())
    }
}
