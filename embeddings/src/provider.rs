//! Embedding providers.
//!
//! Supports multiple interchangeable providers: a deterministic offline
//! hash provider, a pretrained local model, and the OpenAI embeddings API.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{EmbeddingError, Result};
use crate::similarity::normalize;
use crate::{DEFAULT_DIMENSION, Embedding};

/// Trait for embedding providers.
///
/// Implementations must be deterministic for a given configuration and
/// must return an all-zero vector of [`dimension`](Self::dimension) length
/// for empty input rather than failing.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Get the name of this provider.
    fn name(&self) -> &str;

    /// Get the embedding dimension this provider produces.
    fn dimension(&self) -> usize;

    /// Generate an embedding for the given text.
    async fn embed(&self, text: &str) -> Result<Embedding>;
}

/// Accumulate whitespace tokens into a hashed count vector, L2-normalized.
///
/// Token-free input yields the zero vector unmodified (no division by zero).
fn hash_features(text: &str, dim: usize) -> Embedding {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut vec = vec![0.0f32; dim];

    for token in text.to_lowercase().split_whitespace() {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        let idx = (hasher.finish() % dim as u64) as usize;
        vec[idx] += 1.0;
    }

    normalize(&mut vec);
    vec
}

/// Deterministic, fully offline provider backed by token hashing.
///
/// Semantic quality is far below a real embedding model, but the data
/// flow is identical and no external service is needed. This is the
/// reference/default provider.
pub struct HashProvider {
    dimension: usize,
}

impl HashProvider {
    /// Create a new hash provider with the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for HashProvider {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

#[async_trait]
impl EmbeddingProvider for HashProvider {
    fn name(&self) -> &str {
        "hash"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        Ok(hash_features(text, self.dimension))
    }
}

/// OpenAI embedding provider.
pub struct OpenAIProvider {
    /// API key.
    api_key: String,

    /// API base URL.
    base_url: String,

    /// HTTP client.
    client: reqwest::Client,

    /// Model to use.
    model: String,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider.
    ///
    /// Fails with [`EmbeddingError::ProviderNotConfigured`] when no API
    /// key is supplied, so a misconfigured provider is caught at startup
    /// rather than on the first embed call.
    pub fn new(api_key: Option<String>) -> Result<Self> {
        let api_key = api_key.ok_or_else(|| {
            EmbeddingError::ProviderNotConfigured("missing OpenAI API key".to_string())
        })?;

        Ok(Self {
            api_key,
            base_url: "https://api.openai.com/v1".to_string(),
            client: reqwest::Client::new(),
            model: "text-embedding-3-small".to_string(),
        })
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn dimension(&self) -> usize {
        match self.model.as_str() {
            "text-embedding-3-small" => 1536,
            "text-embedding-3-large" => 3072,
            "text-embedding-ada-002" => 1536,
            _ => 1536,
        }
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        if text.is_empty() {
            return Ok(vec![0.0f32; self.dimension()]);
        }

        debug!("Generating embedding with model: {}", self.model);

        let body = serde_json::json!({
            "input": text,
            "model": self.model
        });

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);

            return Err(EmbeddingError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::ApiRequest(format!(
                "API error: {error_text}"
            )));
        }

        let result: OpenAIEmbeddingResponse = response.json().await?;

        let embedding = result
            .data
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidResponse("No embedding in response".to_string()))?
            .embedding;

        info!("Generated embedding with {} dimensions", embedding.len());

        Ok(embedding)
    }
}

/// OpenAI API response format.
#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingData {
    embedding: Vec<f32>,
}

/// Pretrained local model provider.
///
/// The model file must exist when the provider is constructed; a missing
/// model is a configuration error, not a per-call failure.
pub struct LocalModelProvider {
    model_path: PathBuf,
    dimension: usize,
}

impl LocalModelProvider {
    /// MiniLM dimension.
    const MINILM_DIMENSION: usize = 384;

    /// Create a new local model provider.
    pub fn new(model_path: impl Into<PathBuf>) -> Result<Self> {
        let model_path = model_path.into();
        if !model_path.exists() {
            return Err(EmbeddingError::ModelNotFound {
                path: model_path.display().to_string(),
            });
        }

        Ok(Self {
            model_path,
            dimension: Self::MINILM_DIMENSION,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for LocalModelProvider {
    fn name(&self) -> &str {
        "local"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        // Model inference is not wired up yet; fall back to hashed token
        // features at the model dimension so the contract still holds.
        warn!(
            "Local model inference not yet implemented for {}, using hashed features",
            self.model_path.display()
        );

        Ok(hash_features(text, self.dimension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_hash_provider_empty_text_is_zero_vector() {
        let provider = HashProvider::new(16);
        let embedding = provider.embed("").await.unwrap();
        assert_eq!(embedding, vec![0.0f32; 16]);
    }

    #[tokio::test]
    async fn test_hash_provider_whitespace_only_is_zero_vector() {
        let provider = HashProvider::new(16);
        let embedding = provider.embed("   \t\n").await.unwrap();
        assert_eq!(embedding, vec![0.0f32; 16]);
    }

    #[tokio::test]
    async fn test_hash_provider_is_deterministic() {
        let provider = HashProvider::new(64);
        let a = provider.embed("login button does nothing").await.unwrap();
        let b = provider.embed("login button does nothing").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_hash_provider_output_is_unit_length() {
        let provider = HashProvider::default();
        let embedding = provider.embed("password reset email missing").await.unwrap();
        assert_eq!(embedding.len(), DEFAULT_DIMENSION);

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_hash_provider_case_insensitive() {
        let provider = HashProvider::new(64);
        let a = provider.embed("Login Fails").await.unwrap();
        let b = provider.embed("login fails").await.unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_openai_provider_requires_api_key() {
        let result = OpenAIProvider::new(None);
        assert!(matches!(
            result,
            Err(EmbeddingError::ProviderNotConfigured(_))
        ));
    }

    #[test]
    fn test_openai_provider_model_dimensions() {
        let provider = OpenAIProvider::new(Some("sk-test".to_string()))
            .unwrap()
            .with_model("text-embedding-3-large");
        assert_eq!(provider.dimension(), 3072);
    }

    #[test]
    fn test_local_provider_missing_model_is_config_error() {
        let result = LocalModelProvider::new("/nonexistent/model.onnx");
        assert!(matches!(result, Err(EmbeddingError::ModelNotFound { .. })));
    }

    #[tokio::test]
    async fn test_openai_provider_embed() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(header("Authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"embedding": [0.1, 0.2, 0.3]}],
                "model": "text-embedding-3-small"
            })))
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new(Some("sk-test".to_string()))
            .unwrap()
            .with_base_url(server.uri());

        let embedding = provider.embed("login issue").await.unwrap();
        assert_eq!(embedding, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn test_openai_provider_api_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new(Some("sk-test".to_string()))
            .unwrap()
            .with_base_url(server.uri());

        let result = provider.embed("login issue").await;
        assert!(matches!(result, Err(EmbeddingError::ApiRequest(_))));
    }

    #[tokio::test]
    async fn test_openai_provider_rate_limited() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new(Some("sk-test".to_string()))
            .unwrap()
            .with_base_url(server.uri());

        let result = provider.embed("login issue").await;
        assert!(matches!(
            result,
            Err(EmbeddingError::RateLimited {
                retry_after_secs: 7
            })
        ));
    }
}
