use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{QaDocumentError, QaDocumentResult};
use crate::models::{NewQaDocument, QaDocument, QaDocumentFilter, QaDocumentSort};

/// Repository trait for QA entry persistence
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QaDocumentRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> QaDocumentResult<Option<QaDocument>>;

    /// Highest position ever handed out for the owner, 0 before the first entry
    async fn max_position(&self, app_id: Uuid) -> QaDocumentResult<i32>;

    /// Insert an enabled entry at `max_position + 1`
    async fn insert(&self, input: NewQaDocument) -> QaDocumentResult<QaDocument>;

    /// Persist question, answer, enabled and error; touches `updated_at`
    async fn update(&self, entry: QaDocument) -> QaDocumentResult<QaDocument>;

    async fn delete(&self, id: Uuid) -> QaDocumentResult<bool>;

    /// Enabled entries of the owner in position order
    async fn list_enabled(&self, app_id: Uuid) -> QaDocumentResult<Vec<QaDocument>>;

    async fn list(&self, filter: QaDocumentFilter) -> QaDocumentResult<Vec<QaDocument>>;
}

#[derive(Debug, Default)]
struct State {
    documents: HashMap<Uuid, QaDocument>,
    high_water: HashMap<Uuid, i32>,
}

/// In-memory implementation of QaDocumentRepository (for development/testing)
#[derive(Debug, Default, Clone)]
pub struct InMemoryQaDocumentRepository {
    state: Arc<RwLock<State>>,
}

impl InMemoryQaDocumentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

pub(crate) fn sort_documents(documents: &mut [QaDocument], sort: QaDocumentSort) {
    match sort {
        QaDocumentSort::CreatedAtDesc => documents.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.position.cmp(&a.position))
        }),
        QaDocumentSort::CreatedAt => documents.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.position.cmp(&b.position))
        }),
        QaDocumentSort::Position => documents.sort_by_key(|d| d.position),
    }
}

#[async_trait]
impl QaDocumentRepository for InMemoryQaDocumentRepository {
    async fn find_by_id(&self, id: Uuid) -> QaDocumentResult<Option<QaDocument>> {
        Ok(self.state.read().await.documents.get(&id).cloned())
    }

    async fn max_position(&self, app_id: Uuid) -> QaDocumentResult<i32> {
        Ok(self
            .state
            .read()
            .await
            .high_water
            .get(&app_id)
            .copied()
            .unwrap_or(0))
    }

    async fn insert(&self, input: NewQaDocument) -> QaDocumentResult<QaDocument> {
        let mut state = self.state.write().await;

        let high_water = state.high_water.entry(input.app_id).or_insert(0);
        *high_water += 1;
        let document = input.into_document(*high_water);

        state.documents.insert(document.id, document.clone());

        tracing::debug!(entry_id = %document.id, position = document.position, "Inserted QA entry");
        Ok(document)
    }

    async fn update(&self, entry: QaDocument) -> QaDocumentResult<QaDocument> {
        let mut state = self.state.write().await;
        let stored = state
            .documents
            .get_mut(&entry.id)
            .ok_or(QaDocumentError::NotFound(entry.id))?;

        stored.question = entry.question;
        stored.answer = entry.answer;
        stored.enabled = entry.enabled;
        stored.error = entry.error;
        stored.updated_at = Utc::now();

        Ok(stored.clone())
    }

    async fn delete(&self, id: Uuid) -> QaDocumentResult<bool> {
        Ok(self.state.write().await.documents.remove(&id).is_some())
    }

    async fn list_enabled(&self, app_id: Uuid) -> QaDocumentResult<Vec<QaDocument>> {
        let state = self.state.read().await;
        let mut documents: Vec<QaDocument> = state
            .documents
            .values()
            .filter(|d| d.app_id == app_id && d.enabled)
            .cloned()
            .collect();

        sort_documents(&mut documents, QaDocumentSort::Position);
        Ok(documents)
    }

    async fn list(&self, filter: QaDocumentFilter) -> QaDocumentResult<Vec<QaDocument>> {
        let state = self.state.read().await;
        let mut documents: Vec<QaDocument> = state
            .documents
            .values()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect();

        sort_documents(&mut documents, filter.sort);

        Ok(documents
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit)
            .collect())
    }
}
