use async_trait::async_trait;
use core_config::{ConfigError, FromEnv, env_optional, env_or_default, env_required};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::EmbeddingProvider;
use crate::config::Timeouts;
use crate::error::{IndexError, IndexResult};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "text-embedding-3-small";

/// Inputs per `/embeddings` request
const MAX_INPUTS_PER_REQUEST: usize = 256;

#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl OpenAIConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

impl FromEnv for OpenAIConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_key: env_required("OPENAI_API_KEY")?,
            base_url: env_optional("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: env_or_default("EMBEDDING_MODEL", DEFAULT_MODEL),
        })
    }
}

/// OpenAI-compatible `/embeddings` client
pub struct OpenAIProvider {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIProvider {
    pub fn new(config: OpenAIConfig, timeouts: Timeouts) -> IndexResult<Self> {
        let client = Client::builder()
            .connect_timeout(timeouts.connect)
            .timeout(timeouts.read)
            .build()
            .map_err(|e| IndexError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn from_env(timeouts: Timeouts) -> IndexResult<Self> {
        Self::new(OpenAIConfig::from_env()?, timeouts)
    }

    async fn request(&self, input: &[String]) -> IndexResult<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: &self.config.model,
            input,
        };

        let response = self
            .client
            .post(format!(
                "{}/embeddings",
                self.config.base_url.trim_end_matches('/')
            ))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| IndexError::Embedding(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, body));
        }

        let mut data = response
            .json::<EmbeddingResponse>()
            .await
            .map_err(|e| IndexError::Embedding(format!("Malformed response: {}", e)))?
            .data;

        if data.len() != input.len() {
            return Err(IndexError::Embedding(format!(
                "Expected {} embeddings, got {}",
                input.len(),
                data.len()
            )));
        }

        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

fn classify_failure(status: StatusCode, body: String) -> IndexError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => IndexError::QuotaExceeded(body),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            IndexError::NotConfigured(format!("embedding provider rejected credentials: {}", body))
        }
        _ => IndexError::Embedding(format!("OpenAI API error ({}): {}", status, body)),
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> String {
        self.config.model.clone()
    }

    async fn embed_documents(&self, texts: &[String]) -> IndexResult<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(MAX_INPUTS_PER_REQUEST) {
            debug!(inputs = chunk.len(), model = %self.config.model, "Requesting embeddings");
            vectors.extend(self.request(chunk).await?);
        }
        Ok(vectors)
    }

    async fn embed_query(&self, text: &str) -> IndexResult<Vec<f32>> {
        self.request(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| IndexError::Embedding("No embedding returned".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_maps_to_quota_exceeded() {
        let err = classify_failure(StatusCode::TOO_MANY_REQUESTS, "slow down".to_string());
        assert!(matches!(err, IndexError::QuotaExceeded(msg) if msg == "slow down"));
    }

    #[test]
    fn test_bad_credentials_map_to_not_configured() {
        let err = classify_failure(StatusCode::UNAUTHORIZED, "invalid key".to_string());
        assert!(matches!(err, IndexError::NotConfigured(_)));
    }

    #[test]
    fn test_server_error_maps_to_embedding() {
        let err = classify_failure(StatusCode::BAD_GATEWAY, String::new());
        assert!(matches!(err, IndexError::Embedding(_)));
    }

    #[test]
    fn test_config_from_env_defaults() {
        temp_env::with_vars(
            [
                ("OPENAI_API_KEY", Some("sk-test")),
                ("OPENAI_BASE_URL", None),
                ("EMBEDDING_MODEL", None),
            ],
            || {
                let config = OpenAIConfig::from_env().unwrap();
                assert_eq!(config.api_key, "sk-test");
                assert_eq!(config.base_url, DEFAULT_BASE_URL);
                assert_eq!(config.model, DEFAULT_MODEL);
            },
        );
    }

    #[test]
    fn test_config_requires_api_key() {
        temp_env::with_var_unset("OPENAI_API_KEY", || {
            let err = OpenAIConfig::from_env().unwrap_err();
            assert!(err.to_string().contains("OPENAI_API_KEY"));
        });
    }

    #[test]
    fn test_request_body_shape() {
        let input = vec!["What is X?".to_string()];
        let body = serde_json::to_value(EmbeddingRequest {
            model: DEFAULT_MODEL,
            input: &input,
        })
        .unwrap();

        assert_eq!(body["model"], DEFAULT_MODEL);
        assert_eq!(body["input"][0], "What is X?");
    }
}
