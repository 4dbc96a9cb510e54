//! Vector store trait for storing and searching vector embeddings.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::{PointId, PointPayload, RetrievalResult};
use crate::error::{RagError, Result};

/// Similarity metric of a collection. Higher scores are always better.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Cosine of the angle between vectors, in [-1, 1].
    #[default]
    Cosine,
    /// Raw dot product.
    Dot,
    /// Negated Euclidean distance.
    Euclid,
}

impl DistanceMetric {
    /// Score `b` against `a` under this metric.
    ///
    /// Cosine returns 0.0 if either vector has zero magnitude.
    pub fn score(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::Cosine => {
                let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
                let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
                let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm_a == 0.0 || norm_b == 0.0 {
                    return 0.0;
                }
                dot / (norm_a * norm_b)
            }
            DistanceMetric::Dot => a.iter().zip(b).map(|(x, y)| x * y).sum(),
            DistanceMetric::Euclid => {
                -a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt()
            }
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistanceMetric::Cosine => f.write_str("cosine"),
            DistanceMetric::Dot => f.write_str("dot"),
            DistanceMetric::Euclid => f.write_str("euclid"),
        }
    }
}

impl FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cosine" => Ok(DistanceMetric::Cosine),
            "dot" => Ok(DistanceMetric::Dot),
            "euclid" | "euclidean" => Ok(DistanceMetric::Euclid),
            other => Err(format!("unknown distance metric '{other}'")),
        }
    }
}

/// Order results by score descending, then by insertion order (smaller id first).
pub(crate) fn rank_results(results: &mut [RetrievalResult]) {
    results.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
}

/// Check a vector against a collection's dimension and reject NaN or infinite components.
pub(crate) fn check_vector(backend: &str, expected: Option<usize>, vector: &[f32]) -> Result<()> {
    if let Some(expected) = expected {
        if vector.len() != expected {
            return Err(RagError::DimensionMismatch { expected, actual: vector.len() });
        }
    }
    if let Some(position) = vector.iter().position(|x| !x.is_finite()) {
        return Err(RagError::VectorStoreError {
            backend: backend.to_string(),
            message: format!("vector component {position} is not a finite number"),
        });
    }
    Ok(())
}

/// A storage backend for vector embeddings with similarity search.
///
/// Implementations manage named collections of points. Point ids are
/// generated by the store, never supplied by callers, and increase with
/// insertion order within a collection.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{DistanceMetric, InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.reset_collection("docs", 384, DistanceMetric::Cosine).await?;
/// store.upsert("docs", payload, &embedding).await?;
/// let results = store.search("docs", &query_embedding, 5).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create an empty collection, discarding any existing one with that name.
    async fn reset_collection(
        &self,
        name: &str,
        dimensions: usize,
        metric: DistanceMetric,
    ) -> Result<()>;

    /// Delete a named collection and all its data. No-op if it does not exist.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Insert one point and return its generated id.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`](crate::RagError::DimensionMismatch)
    /// if the vector length differs from the collection's dimension.
    async fn upsert(&self, collection: &str, payload: PointPayload, vector: &[f32])
    -> Result<PointId>;

    /// Insert many points, assigning ids in input order.
    ///
    /// The default implementation calls [`upsert`](VectorStore::upsert) for
    /// each point in turn.
    async fn upsert_batch(
        &self,
        collection: &str,
        points: Vec<(PointPayload, Vec<f32>)>,
    ) -> Result<Vec<PointId>> {
        let mut ids = Vec::with_capacity(points.len());
        for (payload, vector) in points {
            ids.push(self.upsert(collection, payload, &vector).await?);
        }
        Ok(ids)
    }

    /// Search for the `top_k` most similar points to the given embedding.
    ///
    /// Returns at most `top_k` results ordered by descending score, ties
    /// broken by insertion order. An empty collection yields an empty `Vec`.
    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievalResult>>;

    /// Number of points stored in a collection.
    async fn point_count(&self, collection: &str) -> Result<usize>;
}
