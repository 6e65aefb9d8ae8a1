//! Embedding provider trait and vector utilities.
//!
//! Defines the [`EmbeddingProvider`] trait that all embedding backends
//! implement, plus the cosine similarity used by the vector index.
//!
//! Concrete provider implementations (Gemini, OpenAI, Ollama, fastembed)
//! live in the `docqa` app crate.

use async_trait::async_trait;

use crate::error::{DocQaError, Result};

/// Trait for embedding providers.
///
/// Implementations must return one vector per input text, in input order,
/// and must be deterministic for identical input within a model version.
/// Failures are reported as [`DocQaError::RetrievalUnavailable`]; callers
/// never retry.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"models/embedding-001"`).
    fn model_name(&self) -> &str;

    /// Returns the configured vector dimensionality, or `None` when the
    /// provider reports whatever the model produces.
    fn dims(&self) -> Option<usize>;

    /// Embed a batch of texts.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text.to_string()]).await?;
        results.into_iter().next().ok_or_else(|| {
            DocQaError::RetrievalUnavailable("empty embedding response".to_string())
        })
    }
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors, vectors of different lengths, or a
/// zero-length vector.
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Check that a provider returned exactly one vector per input and that
/// every vector has the expected length.
pub fn validate_vectors(
    vectors: &[Vec<f32>],
    expected_count: usize,
    dims: Option<usize>,
) -> Result<()> {
    if vectors.len() != expected_count {
        return Err(DocQaError::RetrievalUnavailable(format!(
            "expected {} embeddings, provider returned {}",
            expected_count,
            vectors.len()
        )));
    }
    if let Some(dims) = dims {
        if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
            return Err(DocQaError::RetrievalUnavailable(format!(
                "expected {}-dimensional embeddings, got {}",
                dims,
                bad.len()
            )));
        }
    }
    Ok(())
}
