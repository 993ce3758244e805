//! # Retrieval
//!
//! Durable vector store and similar-issue retriever for the triage
//! system.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    Issue Retriever                       │
//! ├──────────────────────────────────────────────────────────┤
//! │  text ──► EmbeddingProvider ──► vector ──► EmbeddingStore│
//! │                                                │         │
//! │  query text ──► vector ──► scan ──► cosine ──► ranked    │
//! │                                                top-k     │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use triage_retrieval::{IssueRetriever, NewIssue, RetrievalConfig, SearchOptions};
//!
//! let retriever = IssueRetriever::new(RetrievalConfig::new("data/embeddings")).await?;
//!
//! retriever.index(&NewIssue::new("login fails on submit")).await?;
//!
//! let outcome = retriever
//!     .find_similar(&NewIssue::new("login issue"), SearchOptions::default())
//!     .await?;
//! ```

pub mod config;
pub mod error;
pub mod retriever;
pub mod store;

pub use config::{EmbeddingConfig, EmbeddingProviderKind, RetrievalConfig};
pub use error::{Result, RetrievalError};
pub use retriever::{
    IssueRetriever, NewIssue, QUERY_NOT_STORED_ID, ScoredIssue, SearchOptions, SearchStats,
    SimilarityOutcome,
};
pub use store::{EmbeddingStore, StoredIssue};

// Re-export from dependencies for convenience
pub use triage_embeddings::{Embedding, EmbeddingProvider, cosine_similarity};
