//! # Embeddings
//!
//! Embedding generation and similarity scoring for the triage
//! similar-issue retrieval system.
//!
//! Free text goes in, a fixed-length `Vec<f32>` comes out. Several
//! interchangeable providers implement the same [`EmbeddingProvider`]
//! contract:
//!
//! - [`HashProvider`]: deterministic, fully offline token-hash vectors.
//!   Low semantic quality, zero setup. The reference implementation.
//! - [`OpenAIProvider`]: remote embeddings API over HTTP.
//! - [`LocalModelProvider`]: pretrained local model.
//!
//! Callers depend only on the trait; which provider is active is decided
//! once, at retriever construction.

pub mod error;
pub mod provider;
pub mod similarity;

pub use error::{EmbeddingError, Result};
pub use provider::{EmbeddingProvider, HashProvider, LocalModelProvider, OpenAIProvider};
pub use similarity::cosine_similarity;

/// A dense vector embedding.
pub type Embedding = Vec<f32>;

/// Default embedding dimension for the hash provider.
pub const DEFAULT_DIMENSION: usize = 128;
