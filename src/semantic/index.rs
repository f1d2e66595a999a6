//! In-memory vector index with brute-force L2 nearest-neighbor search.
//!
//! Stores document embeddings in insertion order and answers top-k queries.

/// In-memory vector index for semantic search.
///
/// Embeddings live in one flat, row-major buffer: slot `i` occupies
/// `vectors[i * dimensions .. (i + 1) * dimensions]`. Slots are assigned in
/// insertion order and never move; the index is strictly append-only.
pub struct VectorIndex {
    /// Flat embedding storage, `len() * dimensions` floats
    vectors: Vec<f32>,
    /// Expected embedding dimensions
    dimensions: usize,
}

/// A single search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    /// Slot of the matching embedding (insertion order)
    pub slot: usize,
    /// Squared Euclidean distance to the query (lower is closer)
    pub distance: f32,
}

/// Errors that can occur during index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("search limit must be at least 1")]
    ZeroLimit,

    #[error("raw vector data length {len} is not a multiple of dimensions {dimensions}")]
    MisalignedData { len: usize, dimensions: usize },
}

impl VectorIndex {
    /// Create a new empty vector index with the given dimensions.
    pub fn new(dimensions: usize) -> Self {
        Self {
            vectors: Vec::new(),
            dimensions,
        }
    }

    /// Create an index with capacity pre-allocated for `capacity` embeddings.
    pub fn with_capacity(dimensions: usize, capacity: usize) -> Self {
        Self {
            vectors: Vec::with_capacity(dimensions * capacity),
            dimensions,
        }
    }

    /// Rebuild an index from a flat buffer in slot order.
    /// Used when loading from storage.
    pub fn from_raw(dimensions: usize, data: Vec<f32>) -> Result<Self, IndexError> {
        if dimensions == 0 || data.len() % dimensions != 0 {
            return Err(IndexError::MisalignedData {
                len: data.len(),
                dimensions,
            });
        }
        Ok(Self {
            vectors: data,
            dimensions,
        })
    }

    /// Get the expected embedding dimensions.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Get the number of stored embeddings.
    pub fn len(&self) -> usize {
        self.vectors.len() / self.dimensions
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Append an embedding, returning the slot it was assigned.
    ///
    /// Slots are dense and strictly increasing; the only failure is a
    /// dimension mismatch.
    pub fn insert(&mut self, embedding: Vec<f32>) -> Result<usize, IndexError> {
        if embedding.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                got: embedding.len(),
            });
        }

        let slot = self.len();
        self.vectors.extend_from_slice(&embedding);
        Ok(slot)
    }

    /// Get the embedding stored at `slot`.
    pub fn get(&self, slot: usize) -> Option<&[f32]> {
        if slot >= self.len() {
            return None;
        }
        let start = slot * self.dimensions;
        Some(&self.vectors[start..start + self.dimensions])
    }

    /// The flat slot-ordered embedding buffer, for persistence.
    pub fn raw(&self) -> &[f32] {
        &self.vectors
    }

    /// Search for the `k` nearest stored embeddings to `query`.
    ///
    /// Brute-force scan: computes squared L2 distance to every stored
    /// embedding, so cost is O(n * dimensions) per query. Results are sorted
    /// ascending by distance; equal distances break toward the lower slot so
    /// rankings are deterministic.
    ///
    /// Returns `min(k, len())` hits. Searching an empty index yields an
    /// empty result, not an error. `k == 0` is rejected.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Hit>, IndexError> {
        if query.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                got: query.len(),
            });
        }

        if k == 0 {
            return Err(IndexError::ZeroLimit);
        }

        let mut hits: Vec<Hit> = self
            .vectors
            .chunks_exact(self.dimensions)
            .enumerate()
            .map(|(slot, stored)| Hit {
                slot,
                distance: Self::squared_l2(query, stored),
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.slot.cmp(&b.slot))
        });
        hits.truncate(k);

        Ok(hits)
    }

    /// Squared Euclidean distance between two equal-length vectors.
    fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| {
                let d = x - y;
                d * d
            })
            .sum()
    }
}
