//! In-memory vector store with exhaustive similarity search.
//!
//! This module provides [`InMemoryVectorStore`], a dependency-free vector
//! store backed by a `HashMap` protected by a `tokio::sync::RwLock`. It is
//! suitable for single-document sessions, development and testing.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::document::{IndexedPoint, PointId, PointPayload, RetrievalResult};
use crate::error::{RagError, Result};
use crate::vectorstore::{DistanceMetric, VectorStore, check_vector, rank_results};

const BACKEND: &str = "InMemory";

#[derive(Debug)]
struct Collection {
    dimensions: usize,
    metric: DistanceMetric,
    /// Kept in insertion order; ids increase along the vector.
    points: Vec<IndexedPoint>,
    next_id: PointId,
}

impl Collection {
    fn check_vector(&self, vector: &[f32]) -> Result<()> {
        check_vector(BACKEND, Some(self.dimensions), vector)
    }

    fn insert(&mut self, payload: PointPayload, vector: Vec<f32>) -> PointId {
        let id = self.next_id;
        self.next_id += 1;
        self.points.push(IndexedPoint { id, vector, payload });
        id
    }
}

/// An in-memory vector store.
///
/// Collections are stored as collection name → ordered points. Writers take
/// the write lock, so concurrent upserts never hand out the same id, and a
/// search sees every upsert that completed before it started.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{DistanceMetric, InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.reset_collection("docs", 384, DistanceMetric::Cosine).await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn missing(collection: &str) -> RagError {
    RagError::VectorStoreError {
        backend: BACKEND.to_string(),
        message: format!("collection '{collection}' does not exist"),
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn reset_collection(
        &self,
        name: &str,
        dimensions: usize,
        metric: DistanceMetric,
    ) -> Result<()> {
        if dimensions == 0 {
            return Err(RagError::ConfigError(
                "collection dimensions must be greater than zero".to_string(),
            ));
        }
        let mut collections = self.collections.write().await;
        collections.insert(
            name.to_string(),
            Collection { dimensions, metric, points: Vec::new(), next_id: 0 },
        );
        debug!(collection = name, dimensions, %metric, "reset in-memory collection");
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.remove(name);
        Ok(())
    }

    async fn upsert(
        &self,
        collection: &str,
        payload: PointPayload,
        vector: &[f32],
    ) -> Result<PointId> {
        let mut collections = self.collections.write().await;
        let store = collections.get_mut(collection).ok_or_else(|| missing(collection))?;
        store.check_vector(vector)?;
        Ok(store.insert(payload, vector.to_vec()))
    }

    async fn upsert_batch(
        &self,
        collection: &str,
        points: Vec<(PointPayload, Vec<f32>)>,
    ) -> Result<Vec<PointId>> {
        let mut collections = self.collections.write().await;
        let store = collections.get_mut(collection).ok_or_else(|| missing(collection))?;
        // Validate everything first so a bad vector leaves the collection untouched.
        for (_, vector) in &points {
            store.check_vector(vector)?;
        }
        let ids: Vec<PointId> =
            points.into_iter().map(|(payload, vector)| store.insert(payload, vector)).collect();
        debug!(collection, count = ids.len(), "upserted points");
        Ok(ids)
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievalResult>> {
        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| missing(collection))?;
        store.check_vector(embedding)?;

        if top_k == 0 || store.points.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<RetrievalResult> = store
            .points
            .iter()
            .map(|point| RetrievalResult {
                id: point.id,
                text: point.payload.text.clone(),
                chunk_index: point.payload.chunk_index,
                score: store.metric.score(&point.vector, embedding),
            })
            .collect();

        rank_results(&mut scored);
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn point_count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| missing(collection))?;
        Ok(store.points.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(text: &str, chunk_index: usize) -> PointPayload {
        PointPayload { text: text.to_string(), chunk_index }
    }

    #[tokio::test]
    async fn empty_collection_returns_no_results() {
        let store = InMemoryVectorStore::new();
        store.reset_collection("c", 2, DistanceMetric::Cosine).await.unwrap();
        assert!(store.search("c", &[1.0, 0.0], 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ids_increase_in_insertion_order() {
        let store = InMemoryVectorStore::new();
        store.reset_collection("c", 2, DistanceMetric::Cosine).await.unwrap();
        let a = store.upsert("c", payload("a", 0), &[1.0, 0.0]).await.unwrap();
        let batch =
            vec![(payload("b", 1), vec![0.0, 1.0]), (payload("c", 2), vec![1.0, 1.0])];
        let ids = store.upsert_batch("c", batch).await.unwrap();
        assert_eq!(a, 0);
        assert_eq!(ids, [1, 2]);
        assert_eq!(store.point_count("c").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn reset_discards_previous_points() {
        let store = InMemoryVectorStore::new();
        store.reset_collection("c", 2, DistanceMetric::Cosine).await.unwrap();
        store.upsert("c", payload("a", 0), &[1.0, 0.0]).await.unwrap();
        store.reset_collection("c", 3, DistanceMetric::Cosine).await.unwrap();
        assert_eq!(store.point_count("c").await.unwrap(), 0);
        assert!(store.upsert("c", payload("a", 0), &[1.0, 0.0]).await.is_err());
    }

    #[tokio::test]
    async fn dimension_mismatch_is_an_error() {
        let store = InMemoryVectorStore::new();
        store.reset_collection("c", 3, DistanceMetric::Cosine).await.unwrap();
        let err = store.upsert("c", payload("a", 0), &[1.0, 0.0]).await.unwrap_err();
        assert!(matches!(err, RagError::DimensionMismatch { expected: 3, actual: 2 }));
        let err = store.search("c", &[1.0], 1).await.unwrap_err();
        assert!(matches!(err, RagError::DimensionMismatch { expected: 3, actual: 1 }));
    }

    #[tokio::test]
    async fn failed_batch_stores_nothing() {
        let store = InMemoryVectorStore::new();
        store.reset_collection("c", 2, DistanceMetric::Cosine).await.unwrap();
        let points = vec![(payload("ok", 0), vec![1.0, 0.0]), (payload("bad", 1), vec![1.0])];
        assert!(store.upsert_batch("c", points).await.is_err());
        assert_eq!(store.point_count("c").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unknown_collection_is_a_store_error() {
        let store = InMemoryVectorStore::new();
        let err = store.search("nope", &[1.0], 1).await.unwrap_err();
        assert!(matches!(err, RagError::VectorStoreError { .. }));
    }

    #[tokio::test]
    async fn equal_scores_come_back_earliest_first() {
        let store = InMemoryVectorStore::new();
        store.reset_collection("c", 2, DistanceMetric::Cosine).await.unwrap();
        for i in 0..4 {
            store.upsert("c", payload(&format!("dup{i}"), i), &[1.0, 1.0]).await.unwrap();
        }
        let results = store.search("c", &[1.0, 1.0], 3).await.unwrap();
        let texts: Vec<&str> = results.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, ["dup0", "dup1", "dup2"]);
    }

    #[tokio::test]
    async fn non_finite_vectors_are_rejected_and_search_survives() {
        let store = InMemoryVectorStore::new();
        store.reset_collection("c", 2, DistanceMetric::Cosine).await.unwrap();
        let points: Vec<(PointPayload, Vec<f32>)> = (0..64)
            .map(|i| {
                let vector = if i % 3 == 0 { vec![f32::NAN, 1.0] } else { vec![1.0, i as f32] };
                (payload(&format!("p{i}"), i), vector)
            })
            .collect();
        let err = store.upsert_batch("c", points).await.unwrap_err();
        assert!(matches!(err, RagError::VectorStoreError { .. }));
        assert_eq!(store.point_count("c").await.unwrap(), 0);

        let err = store.upsert("c", payload("nan", 0), &[f32::NAN, 1.0]).await.unwrap_err();
        assert!(matches!(err, RagError::VectorStoreError { .. }));
        store.upsert("c", payload("ok", 0), &[1.0, 0.5]).await.unwrap();

        assert!(store.search("c", &[f32::NAN, 0.5], 5).await.is_err());
        assert_eq!(store.search("c", &[1.0, 0.5], 64).await.unwrap().len(), 1);
    }
}
