//! Embedding model wrapper for fastembed.
//!
//! Provides the embedding generation seam for the index:
//! - `Embedder` trait so the index manager never depends on a concrete model
//! - `EmbeddingModel`, the fastembed-backed production implementation
//! - Model download on first use, cached under the data directory

use fastembed::{InitOptions, TextEmbedding};
use std::path::PathBuf;
use std::sync::Mutex;

/// Error type for embedding operations
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("embedding model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("invalid model name: {0}")]
    InvalidModel(String),
}

/// A sentence embedding model.
///
/// Implementations must be deterministic within one process lifetime:
/// identical input text yields an identical vector. `dimensions()` is fixed
/// once the model is loaded and every `embed` result has exactly that length.
pub trait Embedder: Send + Sync {
    /// The model name, as configured.
    fn name(&self) -> &str;

    /// The fixed embedding dimensionality.
    fn dimensions(&self) -> usize;

    /// Generate an embedding for a single text.
    ///
    /// Must accept any UTF-8 input, including empty or whitespace-only
    /// strings; rejecting meaningless text is the caller's concern.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// SHA256 hash of the model name, used to bind persisted vectors to the
    /// model that produced them.
    fn model_id_hash(&self) -> [u8; 32] {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(self.name().as_bytes());
        hasher.finalize().into()
    }
}

/// Wrapper around fastembed's TextEmbedding model.
/// Uses a Mutex because fastembed's embed() requires &mut self.
pub struct EmbeddingModel {
    model: Mutex<TextEmbedding>,
    model_name: String,
    dimensions: usize,
}

impl EmbeddingModel {
    /// Load an embedding model by name.
    ///
    /// The model is downloaded on first use and cached in the `models/`
    /// subdirectory of `cache_dir`. Loading is slow (seconds) and happens
    /// once, before the index accepts requests; every failure here is
    /// `ModelUnavailable` and fatal to startup.
    pub fn new(model_name: &str, cache_dir: PathBuf) -> Result<Self, EmbeddingError> {
        let model_enum = Self::parse_model_name(model_name)?;

        let models_dir = cache_dir.join("models");
        std::fs::create_dir_all(&models_dir).map_err(|e| {
            EmbeddingError::ModelUnavailable(format!("failed to create models directory: {}", e))
        })?;

        let options = InitOptions::new(model_enum)
            .with_cache_dir(models_dir)
            .with_show_download_progress(true);

        let mut model = TextEmbedding::try_new(options)
            .map_err(|e| EmbeddingError::ModelUnavailable(e.to_string()))?;

        // Get model dimensions by embedding a test string
        let dimensions = Self::probe_dimensions(&mut model)?;

        Ok(Self {
            model: Mutex::new(model),
            model_name: model_name.to_string(),
            dimensions,
        })
    }

    /// Parse model name string to fastembed enum.
    fn parse_model_name(name: &str) -> Result<fastembed::EmbeddingModel, EmbeddingError> {
        match name.to_lowercase().as_str() {
            "all-minilm-l6-v2" | "allminiml6v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
            "all-minilm-l6-v2-q" | "allminiml6v2q" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2Q),
            "bge-small-en-v1.5" | "bgesmallenv15" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
            "bge-small-en-v1.5-q" | "bgesmallenv15q" => {
                Ok(fastembed::EmbeddingModel::BGESmallENV15Q)
            }
            "bge-base-en-v1.5" | "bgebaseenv15" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
            "bge-base-en-v1.5-q" | "bgebaseenv15q" => Ok(fastembed::EmbeddingModel::BGEBaseENV15Q),
            "bge-large-en-v1.5" | "bgelargeenv15" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
            "bge-large-en-v1.5-q" | "bgelargeenv15q" => {
                Ok(fastembed::EmbeddingModel::BGELargeENV15Q)
            }
            _ => Err(EmbeddingError::InvalidModel(format!(
                "unknown model: {}. Supported models: all-MiniLM-L6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5 (add -q suffix for quantized)",
                name
            ))),
        }
    }

    /// Probe the model to determine embedding dimensions.
    fn probe_dimensions(model: &mut TextEmbedding) -> Result<usize, EmbeddingError> {
        let test_embeddings = model.embed(vec!["test"], None).map_err(|e| {
            EmbeddingError::ModelUnavailable(format!("failed to probe dimensions: {}", e))
        })?;

        test_embeddings
            .first()
            .map(|v| v.len())
            .ok_or_else(|| EmbeddingError::ModelUnavailable("model returned no embedding".into()))
    }
}

impl Embedder for EmbeddingModel {
    fn name(&self) -> &str {
        &self.model_name
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut model = self.model.lock().map_err(|e| {
            EmbeddingError::EmbeddingFailed(format!("failed to acquire model lock: {}", e))
        })?;

        let embeddings = model
            .embed(vec![text], None)
            .map_err(|e| EmbeddingError::EmbeddingFailed(e.to_string()))?;

        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::EmbeddingFailed("no embedding returned".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_model_name() {
        let temp_dir = std::env::temp_dir().join("semdex-embed-invalid");
        let result = EmbeddingModel::new("nonexistent-model", temp_dir);
        assert!(matches!(result, Err(EmbeddingError::InvalidModel(_))));
    }

    #[test]
    fn test_model_id_hash_depends_on_name() {
        struct Named(&'static str);
        impl Embedder for Named {
            fn name(&self) -> &str {
                self.0
            }
            fn dimensions(&self) -> usize {
                0
            }
            fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
                unreachable!()
            }
        }

        let a = Named("all-MiniLM-L6-v2");
        let b = Named("bge-base-en-v1.5");

        assert_eq!(a.model_id_hash(), Named("all-MiniLM-L6-v2").model_id_hash());
        assert_ne!(a.model_id_hash(), b.model_id_hash());
    }

    // Integration tests require model download - run with --ignored
    #[test]
    #[ignore = "requires model download"]
    fn test_model_creation() {
        let temp_dir = std::env::temp_dir().join("semdex-embed-test");
        let model = EmbeddingModel::new("all-MiniLM-L6-v2", temp_dir.clone());
        assert!(model.is_ok());

        let model = model.unwrap();
        assert_eq!(model.name(), "all-MiniLM-L6-v2");
        assert_eq!(model.dimensions(), 384); // MiniLM produces 384-dim embeddings

        let _ = std::fs::remove_dir_all(&temp_dir);
    }

    #[test]
    #[ignore = "requires model download"]
    fn test_embedding_deterministic() {
        let temp_dir = std::env::temp_dir().join("semdex-embed-test-det");
        let model = EmbeddingModel::new("all-MiniLM-L6-v2", temp_dir.clone()).unwrap();

        let first = model.embed("The cat sat on the mat").unwrap();
        let second = model.embed("The cat sat on the mat").unwrap();

        assert_eq!(first.len(), 384);
        assert_eq!(first, second);

        // Empty input must embed rather than error
        let empty = model.embed("").unwrap();
        assert_eq!(empty.len(), 384);

        let _ = std::fs::remove_dir_all(&temp_dir);
    }
}
