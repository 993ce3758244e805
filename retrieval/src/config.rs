//! Configuration for the retrieval engine.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use triage_embeddings::{
    DEFAULT_DIMENSION, EmbeddingProvider, HashProvider, LocalModelProvider, OpenAIProvider,
};

use crate::error::{Result, RetrievalError};

/// Configuration for the retrieval engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Directory where embedding records are persisted.
    pub store_dir: PathBuf,

    /// Embedding provider configuration.
    pub embedding: EmbeddingConfig,
}

impl RetrievalConfig {
    /// Create a new configuration with default values.
    pub fn new(store_dir: impl Into<PathBuf>) -> Self {
        Self {
            store_dir: store_dir.into(),
            embedding: EmbeddingConfig::default(),
        }
    }

    /// Set the embedding configuration.
    pub fn with_embedding(mut self, config: EmbeddingConfig) -> Self {
        self.embedding = config;
        self
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self::new(dirs::data_dir().unwrap_or_default().join("triage/embeddings"))
    }
}

/// Configuration for the embedding provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Which provider to use.
    pub provider: EmbeddingProviderKind,

    /// Dimension for the hash provider.
    pub dimension: usize,

    /// Model to use (remote provider).
    pub model: Option<String>,

    /// API key (remote provider). Falls back to `OPENAI_API_KEY`.
    pub api_key: Option<String>,

    /// Path to a pretrained model file (local provider).
    pub model_path: Option<PathBuf>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::Hash,
            dimension: DEFAULT_DIMENSION,
            model: None,
            api_key: None,
            model_path: None,
        }
    }
}

/// Type of embedding provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderKind {
    /// Deterministic offline token-hash embeddings.
    Hash,
    /// Pretrained local embedding model.
    Local,
    /// OpenAI embeddings API.
    OpenAI,
}

/// Build the configured embedding provider.
///
/// This is the single selection point for provider identity; the
/// retriever holds exactly one provider for its whole lifetime.
/// Configuration problems (missing key, missing model file) surface
/// here, at startup.
pub fn build_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider {
        EmbeddingProviderKind::Hash => Ok(Arc::new(HashProvider::new(config.dimension))),
        EmbeddingProviderKind::Local => {
            let path = config.model_path.as_ref().ok_or_else(|| {
                RetrievalError::Config("local provider requires model_path".to_string())
            })?;
            Ok(Arc::new(LocalModelProvider::new(path)?))
        }
        EmbeddingProviderKind::OpenAI => {
            let api_key = config
                .api_key
                .clone()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
            let mut provider = OpenAIProvider::new(api_key)?;
            if let Some(model) = &config.model {
                provider = provider.with_model(model.clone());
            }
            Ok(Arc::new(provider))
        }
    }
}
