//! Durable embedding record storage.
//!
//! The `EmbeddingStore` persists one record per indexed issue, append-only,
//! as a pair of JSON files addressed by a generated id: `<id>.json` holds
//! the metadata and `<id>.vec.json` holds the embedding vector. The
//! metadata half is written last, so its presence marks a complete record;
//! a reader that finds only one half treats the record as corrupt and
//! skips it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use triage_embeddings::Embedding;

use crate::error::{Result, RetrievalError};

/// Suffix of the vector half of a record.
const VECTOR_SUFFIX: &str = ".vec.json";

/// A persisted embedding record.
///
/// `id` is a generated technical identifier; `external_key` is the
/// caller's business key (e.g. an issue tracker key like `PROJ-123`),
/// passed through untouched and not guaranteed unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredIssue {
    /// Generated unique identifier.
    pub id: String,

    /// Optional caller-supplied business key.
    pub external_key: Option<String>,

    /// Issue summary.
    pub summary: String,

    /// Issue description.
    pub description: Option<String>,

    /// Embedding computed from summary + description at save time.
    pub embedding: Embedding,
}

/// Metadata half of a record as stored on disk.
#[derive(Debug, Serialize, Deserialize)]
struct IssueMeta {
    id: String,
    external_key: Option<String>,
    summary: String,
    description: Option<String>,
}

/// File-backed store for embedding records.
///
/// Records are immutable once saved; there is no update or delete. Every
/// record gets its own uniquely named file pair, so concurrent saves
/// never contend on a shared mutable structure.
pub struct EmbeddingStore {
    /// Root directory for record storage.
    root: PathBuf,
}

impl EmbeddingStore {
    /// Create a new store at the given root directory.
    ///
    /// This will create the directory if it doesn't exist.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        fs::create_dir_all(&root)
            .await
            .map_err(|e| RetrievalError::Storage(format!("{}: {e}", root.display())))?;

        Ok(Self { root })
    }

    /// Path of the metadata half for a record id.
    fn meta_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    /// Path of the vector half for a record id.
    fn vector_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}{VECTOR_SUFFIX}"))
    }

    /// Write a file atomically and durably: temp file, flush to disk,
    /// rename into place.
    async fn write_durable(path: &Path, content: &str) -> Result<()> {
        let temp_path = path.with_extension("json.tmp");

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| RetrievalError::Storage(format!("{}: {e}", temp_path.display())))?;
        file.write_all(content.as_bytes())
            .await
            .map_err(|e| RetrievalError::Storage(format!("{}: {e}", temp_path.display())))?;
        file.sync_all()
            .await
            .map_err(|e| RetrievalError::Storage(format!("{}: {e}", temp_path.display())))?;

        fs::rename(&temp_path, path)
            .await
            .map_err(|e| RetrievalError::Storage(format!("{}: {e}", path.display())))?;

        Ok(())
    }

    /// Persist a new record and return it with its assigned id.
    ///
    /// The vector half is written first and the metadata half last, so a
    /// crash in between leaves no record that `list` would report as
    /// valid. The record is on disk before this returns.
    pub async fn save(
        &self,
        external_key: Option<String>,
        summary: String,
        description: Option<String>,
        embedding: Embedding,
    ) -> Result<StoredIssue> {
        let id = Uuid::new_v4().to_string();

        let vector_content = serde_json::to_string(&embedding)?;
        Self::write_durable(&self.vector_path(&id), &vector_content).await?;

        let meta = IssueMeta {
            id: id.clone(),
            external_key: external_key.clone(),
            summary: summary.clone(),
            description: description.clone(),
        };
        let meta_content = serde_json::to_string(&meta)?;
        Self::write_durable(&self.meta_path(&id), &meta_content).await?;

        debug!("Saved embedding record: {id}");

        Ok(StoredIssue {
            id,
            external_key,
            summary,
            description,
            embedding,
        })
    }

    /// Load every valid record, sorted by id.
    ///
    /// A record whose metadata or vector half is missing or unparsable is
    /// skipped with a warning; one bad record must not make the whole
    /// corpus unavailable.
    pub async fn list(&self) -> Result<Vec<StoredIssue>> {
        let mut ids = Vec::new();

        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| RetrievalError::Storage(format!("{}: {e}", self.root.display())))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| RetrievalError::Storage(format!("{e}")))?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.ends_with(VECTOR_SUFFIX) {
                continue;
            }
            if let Some(id) = name.strip_suffix(".json") {
                ids.push(id.to_string());
            }
        }

        // Deterministic scan order for a given on-disk state.
        ids.sort();

        let mut issues = Vec::with_capacity(ids.len());
        for id in ids {
            match self.load_record(&id).await {
                Ok(issue) => issues.push(issue),
                Err(e) => {
                    warn!("Skipping corrupt record {id}: {e}");
                }
            }
        }

        info!("Loaded {} embedding records", issues.len());
        Ok(issues)
    }

    /// Load both halves of a single record.
    async fn load_record(&self, id: &str) -> Result<StoredIssue> {
        let meta_content = fs::read_to_string(self.meta_path(id))
            .await
            .map_err(|e| RetrievalError::Storage(format!("metadata: {e}")))?;
        let meta: IssueMeta = serde_json::from_str(&meta_content)?;

        let vector_content = fs::read_to_string(self.vector_path(id))
            .await
            .map_err(|e| RetrievalError::Storage(format!("vector: {e}")))?;
        let embedding: Embedding = serde_json::from_str(&vector_content)?;

        Ok(StoredIssue {
            id: meta.id,
            external_key: meta.external_key,
            summary: meta.summary,
            description: meta.description,
            embedding,
        })
    }
}
