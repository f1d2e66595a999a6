//! Semantic index manager: the orchestration core of the service.
//!
//! Owns the vector index, the identifier table, and the persistence layer,
//! and is the only surface external callers interact with. One exclusive
//! lock guards the (index, table) pair for reads and writes alike, so an
//! insert and its persistence save are atomic with respect to every other
//! operation.

use std::sync::Mutex;

use serde::Serialize;

use crate::config::IndexConfig;
use crate::semantic::embeddings::{Embedder, EmbeddingError};
use crate::semantic::index::{IndexError, VectorIndex};
use crate::semantic::storage::{IndexStorage, StorageError};
use crate::semantic::table::DocumentTable;

/// Errors that can occur during index manager operations.
#[derive(Debug, thiserror::Error)]
pub enum SemanticIndexError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error("index persistence failed: {0}")]
    Persistence(#[source] StorageError),

    #[error("persisted index state is unusable: {0}")]
    CorruptState(#[source] StorageError),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Outcome of an index operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    /// The document was embedded, stored, and persisted.
    Indexed,
    /// The identifier was already present; the call was an idempotent no-op.
    AlreadyIndexed,
}

/// A search result: an identifier and its distance to the query.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    /// Caller-supplied document identifier
    pub identifier: String,
    /// Squared Euclidean distance to the query embedding
    pub distance: f32,
}

/// Read-only index statistics.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    /// Embedding model name
    pub model: String,
    /// Embedding dimensionality
    pub dimensions: usize,
    /// Number of indexed documents
    pub document_count: usize,
}

/// The pair guarded by the service lock. Invariant at every release:
/// `index.len() == documents.len()`.
struct IndexState {
    index: VectorIndex,
    documents: DocumentTable,
}

/// Semantic document index service.
///
/// Created once at startup via [`SemanticIndexer::open`]; safe to share
/// across request-handling threads.
pub struct SemanticIndexer {
    embedder: Box<dyn Embedder>,
    storage: IndexStorage,
    config: IndexConfig,
    model_id: [u8; 32],
    state: Mutex<IndexState>,
}

impl SemanticIndexer {
    /// Open the index: restore persisted state, or start empty if none.
    ///
    /// The embedding model must already be loaded; any mismatch between it
    /// and the persisted artifacts, or any damage to them, refuses startup
    /// rather than dropping data.
    pub fn open(
        embedder: Box<dyn Embedder>,
        storage: IndexStorage,
        config: IndexConfig,
    ) -> Result<Self, SemanticIndexError> {
        let model_id = embedder.model_id_hash();
        let dimensions = embedder.dimensions();

        let state = match storage.load(&model_id, dimensions) {
            Ok(Some((index, documents))) => {
                log::info!("loaded {} indexed documents from storage", documents.len());
                IndexState { index, documents }
            }
            Ok(None) => {
                log::info!("no existing index, starting fresh");
                IndexState {
                    index: VectorIndex::new(dimensions),
                    documents: DocumentTable::new(),
                }
            }
            Err(StorageError::Io(e)) => return Err(SemanticIndexError::Persistence(e.into())),
            Err(e) => return Err(SemanticIndexError::CorruptState(e)),
        };

        Ok(Self {
            embedder,
            storage,
            config,
            model_id,
            state: Mutex::new(state),
        })
    }

    /// Embed and store a document under `identifier`.
    ///
    /// Re-submitting an already-indexed identifier is not an error: it
    /// returns [`IndexOutcome::AlreadyIndexed`] and changes nothing.
    ///
    /// A failed persistence save is reported as `Persistence` *after* the
    /// in-memory index has been updated; searches in this process will see
    /// the document, but it is not guaranteed durable.
    pub fn index_document(
        &self,
        identifier: &str,
        text: &str,
    ) -> Result<IndexOutcome, SemanticIndexError> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(SemanticIndexError::InvalidArgument(
                "identifier must not be empty".to_string(),
            ));
        }
        if identifier.chars().count() > self.config.max_identifier_length {
            return Err(SemanticIndexError::InvalidArgument(format!(
                "identifier exceeds {} characters",
                self.config.max_identifier_length
            )));
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(SemanticIndexError::InvalidArgument(
                "document text must not be empty".to_string(),
            ));
        }

        let mut state = self.lock_state()?;

        if state.documents.contains(identifier) {
            log::debug!("document {:?} already indexed, skipping", identifier);
            return Ok(IndexOutcome::AlreadyIndexed);
        }

        let embedding = self.embedder.embed(text)?;
        let slot = state.index.insert(embedding)?;
        state
            .documents
            .push(identifier)
            .ok_or_else(|| SemanticIndexError::Internal("identifier table out of step".into()))?;

        self.storage
            .save(&state.index, &state.documents, &self.model_id)
            .map_err(SemanticIndexError::Persistence)?;

        log::info!("indexed document {:?} at slot {}", identifier, slot);
        Ok(IndexOutcome::Indexed)
    }

    /// Find the `k` documents most similar to `query`, closest first.
    ///
    /// Returns fewer than `k` results when the index holds fewer documents;
    /// an empty index yields an empty list.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>, SemanticIndexError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SemanticIndexError::InvalidArgument(
                "search query must not be empty".to_string(),
            ));
        }
        if query.chars().count() > self.config.max_query_length {
            return Err(SemanticIndexError::InvalidArgument(format!(
                "search query exceeds {} characters",
                self.config.max_query_length
            )));
        }
        if k == 0 {
            return Err(SemanticIndexError::InvalidArgument(
                "k must be at least 1".to_string(),
            ));
        }
        if k > self.config.max_results {
            return Err(SemanticIndexError::InvalidArgument(format!(
                "k exceeds the maximum of {}",
                self.config.max_results
            )));
        }

        let state = self.lock_state()?;

        let query_embedding = self.embedder.embed(query)?;
        let hits = state.index.search(&query_embedding, k)?;

        hits.into_iter()
            .map(|hit| {
                let identifier = state
                    .documents
                    .get(hit.slot)
                    .ok_or_else(|| {
                        SemanticIndexError::Internal(format!(
                            "slot {} has no recorded identifier",
                            hit.slot
                        ))
                    })?
                    .to_string();
                Ok(SearchHit {
                    identifier,
                    distance: hit.distance,
                })
            })
            .collect()
    }

    /// Current index statistics.
    pub fn stats(&self) -> Result<IndexStats, SemanticIndexError> {
        let state = self.lock_state()?;
        Ok(IndexStats {
            model: self.embedder.name().to_string(),
            dimensions: state.index.dimensions(),
            document_count: state.documents.len(),
        })
    }

    /// Number of indexed documents.
    pub fn document_count(&self) -> Result<usize, SemanticIndexError> {
        Ok(self.lock_state()?.documents.len())
    }

    fn lock_state(&self) -> Result<std::sync::MutexGuard<'_, IndexState>, SemanticIndexError> {
        self.state
            .lock()
            .map_err(|e| SemanticIndexError::Internal(format!("lock poisoned: {}", e)))
    }
}
