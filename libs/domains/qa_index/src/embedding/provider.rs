use async_trait::async_trait;

use crate::error::IndexResult;

/// Turns text into fixed-length vectors.
///
/// Failures surface as `NotConfigured` (missing credentials), `QuotaExceeded`
/// or `Embedding`, and are treated like any other index-mutation failure.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier, part of the cache key
    fn model_name(&self) -> String;

    /// One vector per input, in input order
    async fn embed_documents(&self, texts: &[String]) -> IndexResult<Vec<Vec<f32>>>;

    async fn embed_query(&self, text: &str) -> IndexResult<Vec<f32>>;
}
