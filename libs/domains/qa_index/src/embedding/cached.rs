use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use lru::LruCache;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::debug;

use super::EmbeddingProvider;
use crate::error::{IndexError, IndexResult};

/// Memoizes document embeddings by SHA-256 of model and text, so rebuilding an
/// index does not pay for questions that were already embedded. Queries are not cached.
///
/// Holds at most `capacity` vectors; the least recently used one is evicted first.
pub struct CachedEmbedding {
    inner: Arc<dyn EmbeddingProvider>,
    cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl CachedEmbedding {
    pub fn new(inner: Arc<dyn EmbeddingProvider>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn key(&self, text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.inner.model_name().as_bytes());
        hasher.update([0u8]);
        hasher.update(text.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub async fn len(&self) -> usize {
        self.cache.lock().await.len()
    }

    pub async fn capacity(&self) -> usize {
        self.cache.lock().await.cap().get()
    }
}

#[async_trait]
impl EmbeddingProvider for CachedEmbedding {
    fn model_name(&self) -> String {
        self.inner.model_name()
    }

    async fn embed_documents(&self, texts: &[String]) -> IndexResult<Vec<Vec<f32>>> {
        let keys: Vec<String> = texts.iter().map(|t| self.key(t)).collect();

        let mut resolved: Vec<Option<Vec<f32>>> = Vec::with_capacity(texts.len());
        let mut missing: Vec<String> = Vec::new();
        let mut missing_keys: Vec<&String> = Vec::new();
        {
            let mut cache = self.cache.lock().await;
            for (text, key) in texts.iter().zip(&keys) {
                let hit = cache.get(key).cloned();
                if hit.is_none() && !missing_keys.contains(&key) {
                    missing.push(text.clone());
                    missing_keys.push(key);
                }
                resolved.push(hit);
            }
        }

        if !missing.is_empty() {
            debug!(
                hits = texts.len() - missing.len(),
                misses = missing.len(),
                "Embedding cache lookup"
            );
            let fresh = self.inner.embed_documents(&missing).await?;
            if fresh.len() != missing.len() {
                return Err(IndexError::Embedding(format!(
                    "Expected {} embeddings, got {}",
                    missing.len(),
                    fresh.len()
                )));
            }

            let mut cache = self.cache.lock().await;
            for (key, vector) in missing_keys.iter().zip(&fresh) {
                cache.put((*key).clone(), vector.clone());
            }

            // fill from the fresh batch, not the cache, which may already have evicted them
            for (slot, key) in resolved.iter_mut().zip(&keys) {
                if slot.is_none() {
                    *slot = missing_keys
                        .iter()
                        .position(|k| *k == key)
                        .map(|i| fresh[i].clone());
                }
            }
        }

        resolved
            .into_iter()
            .map(|vector| {
                vector.ok_or_else(|| IndexError::Internal("Embedding cache lost an entry".to_string()))
            })
            .collect()
    }

    async fn embed_query(&self, text: &str) -> IndexResult<Vec<f32>> {
        self.inner.embed_query(text).await
    }
}
