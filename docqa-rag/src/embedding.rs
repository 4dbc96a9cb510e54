//! Text embedding: the [`EmbeddingProvider`] seam and batch sanity checks.

use async_trait::async_trait;

use crate::error::{RagError, Result};

/// Maps texts (chunks or queries) to dense vectors of a fixed length.
///
/// [`embed_batch`](EmbeddingProvider::embed_batch) returns exactly one
/// vector per input, in input order; how a backend groups its requests is
/// its own business. Failures surface as
/// [`RagError::EmbeddingError`] and are never retried here.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{EmbeddingProvider, HashingEmbeddingProvider};
///
/// let provider = HashingEmbeddingProvider::default();
/// let vectors = provider.embed_batch(&["first chunk", "second chunk"]).await?;
/// assert!(vectors.iter().all(|v| v.len() == provider.dimensions()));
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed many texts, one vector per input in input order.
    ///
    /// Falls back to one [`embed`](EmbeddingProvider::embed) call per text.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    /// Length of every vector this provider returns.
    fn dimensions(&self) -> usize;

    /// Short name for logs and errors.
    fn name(&self) -> &str {
        "embedding"
    }
}

/// Check a batch result: one vector per input, each `dimensions` long when
/// given, with no NaN or infinite components.
///
/// # Errors
///
/// Returns [`RagError::EmbeddingError`] naming `provider` on the first violation.
pub fn check_batch(
    provider: &str,
    expected_count: usize,
    dimensions: Option<usize>,
    vectors: &[Vec<f32>],
) -> Result<()> {
    let fail =
        |message: String| RagError::EmbeddingError { provider: provider.to_string(), message };
    if vectors.len() != expected_count {
        return Err(fail(format!("expected {expected_count} embeddings, got {}", vectors.len())));
    }
    if let Some(expected) = dimensions {
        if let Some((position, vector)) =
            vectors.iter().enumerate().find(|(_, v)| v.len() != expected)
        {
            return Err(fail(format!(
                "embedding {position} has {} dimensions, expected {expected}",
                vector.len()
            )));
        }
    }
    if let Some(position) = vectors.iter().position(|v| v.iter().any(|x| !x.is_finite())) {
        return Err(fail(format!("embedding {position} has non-finite components")));
    }
    Ok(())
}
