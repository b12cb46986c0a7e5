use async_trait::async_trait;
use uuid::Uuid;

use crate::error::IndexResult;
use crate::models::IndexedDocument;

/// Where a rebuild reads the owner's entries from. Only enabled entries are indexed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn enabled_documents(&self, owner_id: Uuid) -> IndexResult<Vec<IndexedDocument>>;
}
