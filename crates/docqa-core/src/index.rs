//! Brute-force cosine vector index over one document's chunks.
//!
//! Single-document corpora hold tens to low hundreds of chunks, so a linear
//! scan beats any tree or approximate structure on both simplicity and
//! latency. The index is immutable once built; a changed document gets a
//! new index.

use serde::Serialize;

use crate::embedding::cosine_similarity;
use crate::error::{DocQaError, Result};
use crate::models::Chunk;

/// A retrieved chunk and its cosine similarity to the query.
#[derive(Debug, Clone, Serialize)]
pub struct Hit {
    pub chunk: Chunk,
    pub score: f32,
}

struct Entry {
    chunk: Chunk,
    vector: Vec<f32>,
}

/// In-memory nearest-neighbour index, O(n) space for n chunks.
pub struct VectorIndex {
    entries: Vec<Entry>,
    dims: usize,
}

impl VectorIndex {
    /// Build an index pairing each chunk with its embedding.
    ///
    /// # Errors
    ///
    /// [`DocQaError::RetrievalUnavailable`] when the chunk and vector counts
    /// differ or the vectors do not share one dimension.
    pub fn build(chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<Self> {
        if chunks.len() != vectors.len() {
            return Err(DocQaError::RetrievalUnavailable(format!(
                "cannot index {} chunks with {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }

        let dims = vectors.first().map(|v| v.len()).unwrap_or(0);
        if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
            return Err(DocQaError::RetrievalUnavailable(format!(
                "inconsistent embedding dimensions: {} and {}",
                dims,
                bad.len()
            )));
        }

        let entries = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| Entry { chunk, vector })
            .collect();

        Ok(Self { entries, dims })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Vector dimensionality, 0 for an empty index.
    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Return up to `k` chunks ordered by descending similarity.
    ///
    /// Ties keep original chunk order. Asking for more chunks than exist
    /// returns all of them.
    ///
    /// # Errors
    ///
    /// [`DocQaError::RetrievalUnavailable`] when the query dimension differs
    /// from the indexed vectors.
    pub fn query(&self, query: &[f32], k: usize) -> Result<Vec<Hit>> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dims {
            return Err(DocQaError::RetrievalUnavailable(format!(
                "query has {} dimensions, index has {}",
                query.len(),
                self.dims
            )));
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, cosine_similarity(query, &e.vector)))
            .collect();

        // Stable sort: equal scores stay in chunk order.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| Hit {
                chunk: self.entries[i].chunk.clone(),
                score,
            })
            .collect())
    }
}
