use domain_qa_index::IndexError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum QaDocumentError {
    #[error("QA entry not found: {0}")]
    NotFound(Uuid),

    #[error("Owner not found: {0}")]
    OwnerNotFound(Uuid),

    #[error("Invalid input: {0}")]
    Validation(String),

    /// Index failures that surface before any write, or from an explicit rebuild
    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type QaDocumentResult<T> = Result<T, QaDocumentError>;

impl QaDocumentError {
    /// Like `From<IndexError>`, but an unknown owner stays a lookup failure
    pub fn from_index(err: IndexError) -> Self {
        match err {
            IndexError::OwnerNotFound(id) => QaDocumentError::OwnerNotFound(id),
            other => QaDocumentError::Index(other),
        }
    }
}

/// Repository failures seen from the index side, e.g. while collecting entries for a rebuild
impl From<QaDocumentError> for IndexError {
    fn from(err: QaDocumentError) -> Self {
        match err {
            QaDocumentError::Index(e) => e,
            QaDocumentError::OwnerNotFound(id) => IndexError::OwnerNotFound(id),
            other => IndexError::Storage(other.to_string()),
        }
    }
}
