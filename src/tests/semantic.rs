//! End-to-end tests for the semantic index flow.
//!
//! The stub-embedder tests run everywhere; tests that exercise the real
//! embedding model require a download and are marked #[ignore].
//! Run with: cargo test -- --ignored

use std::collections::HashMap;
use std::sync::Arc;

use tempfile::TempDir;

use crate::config::IndexConfig;
use crate::semantic::{
    Embedder, EmbeddingModel, IndexOutcome, IndexStorage, SemanticIndexer,
};

/// Maps every text to a fixed vector; panics on unknown text so tests stay
/// explicit about their fixtures.
struct FixtureEmbedder {
    dimensions: usize,
    vectors: HashMap<String, Vec<f32>>,
}

impl FixtureEmbedder {
    fn new(dimensions: usize, fixtures: &[(&str, Vec<f32>)]) -> Self {
        let vectors = fixtures
            .iter()
            .map(|(text, vector)| (text.to_string(), vector.clone()))
            .collect();
        Self {
            dimensions,
            vectors,
        }
    }
}

impl Embedder for FixtureEmbedder {
    fn name(&self) -> &str {
        "fixture-model"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, crate::semantic::embeddings::EmbeddingError> {
        Ok(self
            .vectors
            .get(text)
            .unwrap_or_else(|| panic!("no fixture vector for {:?}", text))
            .clone())
    }
}

fn fixtures() -> FixtureEmbedder {
    FixtureEmbedder::new(
        3,
        &[
            ("The cat sat on the mat", vec![1.0, 0.0, 0.0]),
            ("Quantum mechanics and relativity", vec![0.0, 0.0, 1.0]),
            ("A kitten slept on the rug", vec![0.9, 0.1, 0.0]),
            ("feline resting on carpet", vec![0.95, 0.05, 0.0]),
        ],
    )
}

fn open(dir: &std::path::Path, embedder: Box<dyn Embedder>) -> SemanticIndexer {
    SemanticIndexer::open(
        embedder,
        IndexStorage::new(dir.to_path_buf()),
        IndexConfig::default(),
    )
    .expect("failed to open indexer")
}

/// Index three documents, search, restart, search again: same answer.
#[test]
fn test_index_search_restart_flow() {
    let dir = TempDir::new().unwrap();

    {
        let indexer = open(dir.path(), Box::new(fixtures()));

        for (id, text) in [
            ("doc1", "The cat sat on the mat"),
            ("doc2", "Quantum mechanics and relativity"),
            ("doc3", "A kitten slept on the rug"),
        ] {
            assert_eq!(
                indexer.index_document(id, text).unwrap(),
                IndexOutcome::Indexed
            );
        }

        let results = indexer.search("feline resting on carpet", 2).unwrap();
        let identifiers: Vec<&str> = results.iter().map(|hit| hit.identifier.as_str()).collect();
        assert_eq!(identifiers, vec!["doc1", "doc3"]);
    }

    // Restart: state restored from disk
    let reopened = open(dir.path(), Box::new(fixtures()));

    let stats = reopened.stats().unwrap();
    assert_eq!(stats.document_count, 3);
    assert_eq!(stats.dimensions, 3);

    let results = reopened.search("feline resting on carpet", 2).unwrap();
    let identifiers: Vec<&str> = results.iter().map(|hit| hit.identifier.as_str()).collect();
    assert_eq!(identifiers, vec!["doc1", "doc3"]);
}

/// Concurrent indexing through a shared service keeps every identifier
/// exactly once and persists a state the next process can load.
#[test]
fn test_concurrent_index_then_restart() {
    let dir = TempDir::new().unwrap();

    const N: usize = 8;
    let texts: Vec<(String, String)> = (0..N)
        .map(|i| (format!("doc{}", i), format!("text {}", i)))
        .collect();

    let fixtures: Vec<(&str, Vec<f32>)> = texts
        .iter()
        .enumerate()
        .map(|(i, (_, text))| (text.as_str(), vec![i as f32, 0.0]))
        .collect();

    {
        let indexer = Arc::new(open(
            dir.path(),
            Box::new(FixtureEmbedder::new(2, &fixtures)),
        ));

        std::thread::scope(|scope| {
            for (id, text) in &texts {
                let indexer = indexer.clone();
                scope.spawn(move || {
                    indexer.index_document(id, text).unwrap();
                });
            }
        });

        assert_eq!(indexer.document_count().unwrap(), N);
    }

    let reopened = open(
        dir.path(),
        Box::new(FixtureEmbedder::new(2, &fixtures)),
    );
    assert_eq!(reopened.document_count().unwrap(), N);
}

/// Against the real embedding model, semantically close documents rank
/// above unrelated ones.
#[test]
#[ignore = "requires model download (~23MB)"]
fn test_semantic_ranking_with_real_model() {
    let dir = TempDir::new().unwrap();

    let model = EmbeddingModel::new("all-MiniLM-L6-v2", dir.path().to_path_buf())
        .expect("failed to load embedding model");
    assert_eq!(model.dimensions(), 384);

    let index_dir = dir.path().join("index");
    std::fs::create_dir_all(&index_dir).unwrap();
    let indexer = open(&index_dir, Box::new(model));

    indexer
        .index_document("doc1", "The cat sat on the mat")
        .unwrap();
    indexer
        .index_document("doc2", "Quantum mechanics and relativity")
        .unwrap();
    indexer
        .index_document("doc3", "A kitten slept on the rug")
        .unwrap();

    let results = indexer.search("feline resting on carpet", 2).unwrap();
    assert_eq!(results.len(), 2);

    // Order between the two cat documents may vary by model; the physics
    // document must not appear
    for hit in &results {
        assert_ne!(hit.identifier, "doc2");
    }
}
