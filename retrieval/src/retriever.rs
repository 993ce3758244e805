//! Similar-issue retrieval over the embedding store.
//!
//! The retriever wires one [`EmbeddingProvider`] to one [`EmbeddingStore`]
//! and implements the four public operations: `index`, `bulk_index`,
//! `list`, and `find_similar`. Which provider is active is decided once,
//! at construction; a corpus is only coherent across a single embedding
//! configuration, which is the caller's responsibility.

use std::sync::Arc;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::debug;

use triage_embeddings::{EmbeddingProvider, cosine_similarity};

use crate::config::{RetrievalConfig, build_provider};
use crate::error::Result;
use crate::store::{EmbeddingStore, StoredIssue};

/// Sentinel id carried by the query record when `store_query` is false.
///
/// Real record ids are UUIDs, so this can never collide with one.
pub const QUERY_NOT_STORED_ID: &str = "query-not-stored";

/// An issue to index or to search with.
///
/// This is the shape import sources must produce: `summary` is mandatory,
/// everything else optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewIssue {
    /// Optional caller-supplied business key.
    pub external_key: Option<String>,

    /// Issue summary.
    pub summary: String,

    /// Issue description.
    pub description: Option<String>,
}

impl NewIssue {
    /// Create a new issue with just a summary.
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            external_key: None,
            summary: summary.into(),
            description: None,
        }
    }

    /// Set the business key.
    pub fn with_external_key(mut self, key: impl Into<String>) -> Self {
        self.external_key = Some(key.into());
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The text that gets embedded: summary and description joined.
    fn comparison_text(&self) -> String {
        format!("{}\n{}", self.summary, self.description.as_deref().unwrap_or(""))
    }
}

/// A stored issue together with its similarity score for one query.
///
/// Produced transiently by [`IssueRetriever::find_similar`]; never
/// persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredIssue {
    /// Id of the matched record.
    pub id: String,

    /// Business key of the matched record.
    pub external_key: Option<String>,

    /// Summary of the matched record.
    pub summary: String,

    /// Description of the matched record.
    pub description: Option<String>,

    /// Cosine similarity against the query, higher is more similar.
    pub score: f32,
}

/// Options for a similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Maximum number of candidates to return. Zero yields no candidates.
    pub top_k: usize,

    /// Minimum similarity score a candidate must reach. Kept low by
    /// default because hash embeddings score conservatively.
    pub min_score: f32,

    /// Whether to persist the query itself as a new record after scoring.
    pub store_query: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_score: 0.3,
            store_query: true,
        }
    }
}

/// Diagnostic counters for one similarity search.
///
/// Always present in the outcome, zeroed on an empty corpus. Not used in
/// ranking.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchStats {
    /// Records in the snapshot that was scanned.
    pub total_indexed: usize,

    /// Records actually scored.
    pub checked_issues: usize,

    /// Records whose score reached the threshold.
    pub passed_min_score: usize,

    /// The threshold that was applied.
    pub min_score_threshold: f32,

    /// Highest score observed across the scan.
    pub max_score_found: f32,

    /// Lowest score observed across the scan.
    pub min_score_found: f32,

    /// Mean score across the scan.
    pub avg_score: f32,
}

/// Result of a similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityOutcome {
    /// The query as a record: persisted with a real id when
    /// `store_query` was set, otherwise transient with
    /// [`QUERY_NOT_STORED_ID`].
    pub query_issue: StoredIssue,

    /// Candidates at or above the threshold, ranked by descending score,
    /// at most `top_k` of them.
    pub matches: Vec<ScoredIssue>,

    /// Diagnostic counters for the scan.
    pub stats: SearchStats,
}

/// Retrieves previously indexed issues similar to a query by comparing
/// embeddings.
pub struct IssueRetriever {
    /// Active embedding provider.
    provider: Arc<dyn EmbeddingProvider>,

    /// Durable record store.
    store: EmbeddingStore,
}

impl IssueRetriever {
    /// Create a retriever from configuration.
    ///
    /// Provider misconfiguration (missing API key, missing model file)
    /// fails here, before any operation runs.
    pub async fn new(config: RetrievalConfig) -> Result<Self> {
        let provider = build_provider(&config.embedding)?;
        let store = EmbeddingStore::new(&config.store_dir).await?;
        Ok(Self { provider, store })
    }

    /// Create a retriever from already constructed parts.
    pub fn with_parts(provider: Arc<dyn EmbeddingProvider>, store: EmbeddingStore) -> Self {
        Self { provider, store }
    }

    /// Index a single issue: embed its text and persist the record.
    pub async fn index(&self, issue: &NewIssue) -> Result<StoredIssue> {
        let embedding = self.provider.embed(&issue.comparison_text()).await?;
        self.store
            .save(
                issue.external_key.clone(),
                issue.summary.clone(),
                issue.description.clone(),
                embedding,
            )
            .await
    }

    /// Index several issues in input order.
    ///
    /// Best-effort, not transactional: an error partway through leaves
    /// the already indexed issues persisted.
    pub async fn bulk_index(&self, items: &[NewIssue]) -> Result<Vec<StoredIssue>> {
        let mut indexed = Vec::with_capacity(items.len());
        for item in items {
            indexed.push(self.index(item).await?);
        }
        Ok(indexed)
    }

    /// List every stored record.
    pub async fn list(&self) -> Result<Vec<StoredIssue>> {
        self.store.list().await
    }

    /// Find stored issues similar to the query.
    ///
    /// The snapshot that gets scored is taken before the query is
    /// persisted, regardless of `store_query`, so a query never scores
    /// against itself and ranking does not depend on persistence order.
    pub async fn find_similar(
        &self,
        query: &NewIssue,
        options: SearchOptions,
    ) -> Result<SimilarityOutcome> {
        let query_vec = self.provider.embed(&query.comparison_text()).await?;

        let snapshot = self.store.list().await?;

        let mut stats = SearchStats {
            total_indexed: snapshot.len(),
            min_score_threshold: options.min_score,
            ..SearchStats::default()
        };

        let mut matches: Vec<ScoredIssue> = Vec::new();
        let mut score_sum = 0.0f32;

        for issue in &snapshot {
            let score = cosine_similarity(&query_vec, &issue.embedding);
            stats.checked_issues += 1;
            score_sum += score;

            if stats.checked_issues == 1 {
                stats.max_score_found = score;
                stats.min_score_found = score;
            } else {
                stats.max_score_found = stats.max_score_found.max(score);
                stats.min_score_found = stats.min_score_found.min(score);
            }

            if score < options.min_score {
                continue;
            }

            stats.passed_min_score += 1;
            matches.push(ScoredIssue {
                id: issue.id.clone(),
                external_key: issue.external_key.clone(),
                summary: issue.summary.clone(),
                description: issue.description.clone(),
                score,
            });
        }

        if stats.checked_issues > 0 {
            stats.avg_score = score_sum / stats.checked_issues as f32;
        }

        // Stable sort: equal scores keep their scan order, and scan
        // order is deterministic, so ties resolve deterministically.
        matches.sort_by(|a, b| OrderedFloat(b.score).cmp(&OrderedFloat(a.score)));
        matches.truncate(options.top_k);

        debug!(
            "Scored {} records, {} passed threshold {}",
            stats.checked_issues, stats.passed_min_score, stats.min_score_threshold
        );

        // Persist the query only after scoring, never before.
        let query_issue = if options.store_query {
            self.store
                .save(
                    query.external_key.clone(),
                    query.summary.clone(),
                    query.description.clone(),
                    query_vec,
                )
                .await?
        } else {
            StoredIssue {
                id: QUERY_NOT_STORED_ID.to_string(),
                external_key: query.external_key.clone(),
                summary: query.summary.clone(),
                description: query.description.clone(),
                embedding: query_vec,
            }
        };

        Ok(SimilarityOutcome {
            query_issue,
            matches,
            stats,
        })
    }
}
