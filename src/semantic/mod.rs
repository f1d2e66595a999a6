//! Semantic document indexing and search.
//!
//! This module is the core of the service: it converts documents into
//! fixed-size embeddings, keeps them in a similarity-searchable index that
//! is persisted after every insert, and answers free-text nearest-neighbor
//! queries with document identifiers.
//!
//! # Architecture
//!
//! - `embeddings`: Embedder trait + fastembed-backed implementation
//! - `index`: slot-addressed in-memory vector index, brute-force L2 search
//! - `table`: slot -> identifier mapping with O(1) duplicate detection
//! - `storage`: two-artifact durable persistence (vectors.bin + documents.json)
//! - `service`: the index manager tying it all together behind one lock

pub mod embeddings;
mod index;
mod service;
mod storage;
mod table;

pub use embeddings::{Embedder, EmbeddingModel};
pub use index::{IndexError, VectorIndex};
pub use service::{IndexOutcome, IndexStats, SearchHit, SemanticIndexError, SemanticIndexer};
pub use storage::{IndexStorage, StorageError};
pub use table::DocumentTable;

/// Default embedding model name (384-dimensional, small download)
pub const DEFAULT_MODEL: &str = "all-MiniLM-L6-v2";
