//! How each vendor reports the outcome of dropping a collection.
//!
//! Dropping a collection that does not exist is a success for the recreate protocol,
//! every other refusal is an error. Vendors disagree on how "does not exist" looks:
//!
//! | Vendor   | Dropped              | Absent                              | Anything else |
//! |----------|----------------------|-------------------------------------|---------------|
//! | Weaviate | HTTP 2xx             | HTTP 400 or 404                     | error         |
//! | Milvus   | body `code` 0        | body `code` 100 or HTTP 404         | error         |
//! | Qdrant   | `result: true`       | `collection_exists` was false       | error         |
//!
//! Deleting an entry's vectors follows the same rule: every adapter checks that the
//! collection exists first (`GET /v1/schema/{class}`, `collections/has`,
//! `collection_exists`) and treats an absent one as nothing to delete. A descriptor can
//! name a collection that was never created, e.g. after moving an owner with no enabled
//! entries to another vendor.

use crate::error::{IndexError, IndexResult};

/// Milvus error code for an unknown collection
pub const MILVUS_COLLECTION_NOT_FOUND: i32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropStatus {
    Dropped,
    Absent,
    Failed,
}

impl DropStatus {
    pub fn weaviate(http_status: u16) -> Self {
        match http_status {
            200..=299 => DropStatus::Dropped,
            400 | 404 => DropStatus::Absent,
            _ => DropStatus::Failed,
        }
    }

    /// `code` is the body-level status; `None` when the body could not be read
    pub fn milvus(http_status: u16, code: Option<i32>) -> Self {
        match (http_status, code) {
            (404, _) => DropStatus::Absent,
            (200..=299, Some(0)) => DropStatus::Dropped,
            (200..=299, Some(MILVUS_COLLECTION_NOT_FOUND)) => DropStatus::Absent,
            _ => DropStatus::Failed,
        }
    }

    pub fn qdrant(existed: bool, acknowledged: bool) -> Self {
        match (existed, acknowledged) {
            (false, _) => DropStatus::Absent,
            (true, true) => DropStatus::Dropped,
            (true, false) => DropStatus::Failed,
        }
    }

    /// `Dropped` and `Absent` are both success
    pub fn into_result(self, collection: &str, detail: impl FnOnce() -> String) -> IndexResult<()> {
        match self {
            DropStatus::Dropped | DropStatus::Absent => Ok(()),
            DropStatus::Failed => Err(IndexError::BackendRejected(format!(
                "dropping {} failed: {}",
                collection,
                detail()
            ))),
        }
    }
}
