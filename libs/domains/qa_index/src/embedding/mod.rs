mod cached;
mod openai;
mod provider;

pub use cached::CachedEmbedding;
pub use openai::{OpenAIConfig, OpenAIProvider};
pub use provider::EmbeddingProvider;

#[cfg(test)]
pub use provider::MockEmbeddingProvider;
