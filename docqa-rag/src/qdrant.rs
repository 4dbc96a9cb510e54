//! Qdrant vector store backend.
//!
//! Provides [`QdrantVectorStore`] which implements [`VectorStore`] using
//! the [qdrant-client](https://docs.rs/qdrant-client) crate over gRPC.
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::qdrant::QdrantVectorStore;
//!
//! let store = QdrantVectorStore::new("http://localhost:6334")?;
//! store.reset_collection("pdf_queries", 384, DistanceMetric::Cosine).await?;
//! store.upsert("pdf_queries", payload, &embedding).await?;
//! let results = store.search("pdf_queries", &query_embedding, 5).await?;
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::vectors_config::Config as VectorsConfigKind;
use qdrant_client::qdrant::{
    CollectionInfo, CountPointsBuilder, CreateCollectionBuilder, Distance, PointStruct,
    ScoredPoint, SearchPointsBuilder, UpsertPointsBuilder, Value as QdrantValue,
    VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use tokio::sync::Mutex;
use tracing::debug;

use crate::document::{PointId, PointPayload, RetrievalResult};
use crate::error::{RagError, Result};
use crate::vectorstore::{DistanceMetric, VectorStore, check_vector, rank_results};

const BACKEND: &str = "qdrant";

/// What this process knows about a collection.
#[derive(Debug, Clone, Copy, PartialEq)]
struct CollectionState {
    dimensions: usize,
    metric: DistanceMetric,
    next_id: PointId,
}

/// A [`VectorStore`] backed by [Qdrant](https://qdrant.tech/).
///
/// Wraps a [`qdrant_client::Qdrant`] client. Point ids are numeric and drawn
/// from a per-collection counter held by this store, so ids increase with
/// insertion order. Payloads carry the chunk `text` and `chunk_index`.
///
/// Qdrant reports Euclidean *distances*; they are negated so that a higher
/// score is always better, as with the other metrics.
pub struct QdrantVectorStore {
    client: Qdrant,
    collections: Mutex<HashMap<String, CollectionState>>,
}

impl QdrantVectorStore {
    /// Create a new Qdrant vector store connecting to the given URL.
    pub fn new(url: &str) -> Result<Self> {
        let client = Qdrant::from_url(url).build().map_err(Self::map_err)?;
        Ok(Self::from_client(client))
    }

    /// Create a new Qdrant vector store with default URL (`http://localhost:6334`).
    pub fn default_url() -> Result<Self> {
        Self::new("http://localhost:6334")
    }

    /// Create a new Qdrant vector store from an existing client.
    pub fn from_client(client: Qdrant) -> Self {
        Self { client, collections: Mutex::new(HashMap::new()) }
    }

    fn map_err(e: qdrant_client::QdrantError) -> RagError {
        Self::store_error(e.to_string())
    }

    fn store_error(message: String) -> RagError {
        RagError::VectorStoreError { backend: BACKEND.to_string(), message }
    }

    fn distance(metric: DistanceMetric) -> Distance {
        match metric {
            DistanceMetric::Cosine => Distance::Cosine,
            DistanceMetric::Dot => Distance::Dot,
            DistanceMetric::Euclid => Distance::Euclid,
        }
    }

    /// Extract a string from a Qdrant payload value.
    fn extract_string(value: &QdrantValue) -> Option<String> {
        match &value.kind {
            Some(Kind::StringValue(s)) => Some(s.clone()),
            _ => None,
        }
    }

    fn extract_index(value: &QdrantValue) -> Option<usize> {
        match &value.kind {
            Some(Kind::IntegerValue(i)) => usize::try_from(*i).ok(),
            Some(Kind::DoubleValue(d)) if *d >= 0.0 => Some(*d as usize),
            _ => None,
        }
    }

    fn to_payload(payload: &PointPayload) -> Result<Payload> {
        let value = serde_json::to_value(payload)
            .map_err(|e| Self::store_error(format!("failed to encode payload: {e}")))?;
        Payload::try_from(value).map_err(Self::map_err)
    }

    async fn count(&self, collection: &str) -> Result<u64> {
        let response = self
            .client
            .count(CountPointsBuilder::new(collection).exact(true))
            .await
            .map_err(Self::map_err)?;
        Ok(response.result.map(|r| r.count).unwrap_or(0))
    }

    /// State for a collection, adopting one created outside this process.
    async fn state(
        &self,
        known: &mut HashMap<String, CollectionState>,
        collection: &str,
    ) -> Result<CollectionState> {
        if let Some(state) = known.get(collection) {
            return Ok(*state);
        }
        if !self.client.collection_exists(collection).await.map_err(Self::map_err)? {
            return Err(Self::store_error(format!("collection '{collection}' does not exist")));
        }
        let response = self.client.collection_info(collection).await.map_err(Self::map_err)?;
        let info = response.result.ok_or_else(|| {
            Self::store_error(format!("no info returned for collection '{collection}'"))
        })?;
        let state = Self::adopted_state(collection, &info, self.count(collection).await?)?;
        debug!(
            collection,
            dimensions = state.dimensions,
            metric = %state.metric,
            "adopted qdrant collection"
        );
        known.insert(collection.to_string(), state);
        Ok(state)
    }

    /// Read vector size and distance from a collection's server-side config.
    fn adopted_state(
        collection: &str,
        info: &CollectionInfo,
        next_id: PointId,
    ) -> Result<CollectionState> {
        let vectors = info
            .config
            .as_ref()
            .and_then(|config| config.params.as_ref())
            .and_then(|params| params.vectors_config.as_ref())
            .and_then(|vectors| vectors.config.as_ref());
        let Some(VectorsConfigKind::Params(params)) = vectors else {
            return Err(Self::store_error(format!(
                "collection '{collection}' does not hold a single unnamed vector"
            )));
        };
        let metric = match params.distance() {
            Distance::Cosine => DistanceMetric::Cosine,
            Distance::Dot => DistanceMetric::Dot,
            Distance::Euclid => DistanceMetric::Euclid,
            other => {
                return Err(Self::store_error(format!(
                    "collection '{collection}' uses unsupported distance {}",
                    other.as_str_name()
                )));
            }
        };
        Ok(CollectionState { dimensions: params.size as usize, metric, next_id })
    }

    /// Map server hits to results, best first, ties by id.
    ///
    /// Points without a numeric id are skipped. Euclid distances are negated.
    fn to_results(points: Vec<ScoredPoint>, metric: DistanceMetric) -> Vec<RetrievalResult> {
        let mut results: Vec<RetrievalResult> = points
            .into_iter()
            .filter_map(|scored| {
                let id = match scored.id.as_ref()?.point_id_options.as_ref()? {
                    PointIdOptions::Num(n) => *n,
                    PointIdOptions::Uuid(_) => return None,
                };
                let text =
                    scored.payload.get("text").and_then(Self::extract_string).unwrap_or_default();
                let chunk_index =
                    scored.payload.get("chunk_index").and_then(Self::extract_index).unwrap_or(0);
                let score = match metric {
                    DistanceMetric::Euclid => -scored.score,
                    DistanceMetric::Cosine | DistanceMetric::Dot => scored.score,
                };
                Some(RetrievalResult { id, text, chunk_index, score })
            })
            .collect();
        rank_results(&mut results);
        results
    }

    async fn query(
        &self,
        collection: &str,
        embedding: &[f32],
        limit: u64,
        threshold: Option<f32>,
    ) -> Result<Vec<ScoredPoint>> {
        let mut request =
            SearchPointsBuilder::new(collection, embedding.to_vec(), limit).with_payload(true);
        if let Some(threshold) = threshold {
            request = request.score_threshold(threshold);
        }
        let response = self.client.search_points(request).await.map_err(Self::map_err)?;
        Ok(response.result)
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
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
        let mut known = self.collections.lock().await;
        if self.client.collection_exists(name).await.map_err(Self::map_err)? {
            self.client.delete_collection(name).await.map_err(Self::map_err)?;
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(name).vectors_config(VectorParamsBuilder::new(
                    dimensions as u64,
                    Self::distance(metric),
                )),
            )
            .await
            .map_err(Self::map_err)?;

        known.insert(name.to_string(), CollectionState { dimensions, metric, next_id: 0 });
        debug!(collection = name, dimensions, %metric, "reset qdrant collection");
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut known = self.collections.lock().await;
        if self.client.collection_exists(name).await.map_err(Self::map_err)? {
            self.client.delete_collection(name).await.map_err(Self::map_err)?;
        }
        known.remove(name);
        debug!(collection = name, "deleted qdrant collection");
        Ok(())
    }

    async fn upsert(
        &self,
        collection: &str,
        payload: PointPayload,
        vector: &[f32],
    ) -> Result<PointId> {
        let ids = self.upsert_batch(collection, vec![(payload, vector.to_vec())]).await?;
        ids.into_iter().next().ok_or_else(|| Self::store_error("upsert returned no id".to_string()))
    }

    async fn upsert_batch(
        &self,
        collection: &str,
        points: Vec<(PointPayload, Vec<f32>)>,
    ) -> Result<Vec<PointId>> {
        if points.is_empty() {
            return Ok(Vec::new());
        }
        // Held across the request so concurrent writers cannot share ids.
        let mut known = self.collections.lock().await;
        let state = self.state(&mut known, collection).await?;
        for (_, vector) in &points {
            check_vector(BACKEND, Some(state.dimensions), vector)?;
        }

        let mut ids = Vec::with_capacity(points.len());
        let mut structs = Vec::with_capacity(points.len());
        for (offset, (payload, vector)) in points.into_iter().enumerate() {
            let id = state.next_id + offset as PointId;
            structs.push(PointStruct::new(id, vector, Self::to_payload(&payload)?));
            ids.push(id);
        }

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, structs).wait(true))
            .await
            .map_err(Self::map_err)?;

        let next_id = state.next_id + ids.len() as PointId;
        known.insert(collection.to_string(), CollectionState { next_id, ..state });
        debug!(collection, count = ids.len(), "upserted points to qdrant");
        Ok(ids)
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievalResult>> {
        let state = {
            let mut known = self.collections.lock().await;
            self.state(&mut known, collection).await?
        };
        check_vector(BACKEND, Some(state.dimensions), embedding)?;
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let limit = top_k as u64;
        let mut points = self.query(collection, embedding, limit, None).await?;
        // The server cuts at `limit` in its own order; refetch everything tied
        // with the last hit so ties resolve by id.
        if points.len() == top_k {
            if let Some(boundary) = points.last().map(|p| p.score) {
                let total = self.count(collection).await?;
                if total > limit {
                    points = self.query(collection, embedding, total, Some(boundary)).await?;
                }
            }
        }

        let mut results = Self::to_results(points, state.metric);
        results.truncate(top_k);
        Ok(results)
    }

    async fn point_count(&self, collection: &str) -> Result<usize> {
        Ok(self.count(collection).await? as usize)
    }
}

#[cfg(test)]
mod tests {
    use qdrant_client::qdrant::{
        CollectionConfig, CollectionParams, PointId as QdrantPointId, VectorParamsMap,
        VectorsConfig,
    };

    use super::*;

    #[test]
    fn metrics_map_to_qdrant_distances() {
        assert_eq!(QdrantVectorStore::distance(DistanceMetric::Cosine), Distance::Cosine);
        assert_eq!(QdrantVectorStore::distance(DistanceMetric::Dot), Distance::Dot);
        assert_eq!(QdrantVectorStore::distance(DistanceMetric::Euclid), Distance::Euclid);
    }

    #[test]
    fn payload_round_trips_through_qdrant_values() {
        let payload = QdrantVectorStore::to_payload(&PointPayload {
            text: "The sky is blue.".into(),
            chunk_index: 3,
        })
        .unwrap();
        let map: HashMap<String, QdrantValue> = payload.into();
        assert_eq!(
            map.get("text").and_then(QdrantVectorStore::extract_string).as_deref(),
            Some("The sky is blue.")
        );
        assert_eq!(map.get("chunk_index").and_then(QdrantVectorStore::extract_index), Some(3));
    }

    fn info(vectors: Option<VectorsConfigKind>) -> CollectionInfo {
        CollectionInfo {
            config: Some(CollectionConfig {
                params: Some(CollectionParams {
                    vectors_config: Some(VectorsConfig { config: vectors }),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn hit(id: u64, score: f32) -> ScoredPoint {
        let payload = QdrantVectorStore::to_payload(&PointPayload {
            text: format!("chunk {id}"),
            chunk_index: id as usize,
        })
        .unwrap();
        ScoredPoint {
            id: Some(QdrantPointId::from(id)),
            payload: payload.into(),
            score,
            ..Default::default()
        }
    }

    fn ids(results: &[RetrievalResult]) -> Vec<PointId> {
        results.iter().map(|r| r.id).collect()
    }

    #[test]
    fn adopted_collection_keeps_server_metric_and_size() {
        let euclid =
            VectorsConfigKind::Params(VectorParamsBuilder::new(4, Distance::Euclid).build());
        let state = QdrantVectorStore::adopted_state("c", &info(Some(euclid)), 7).unwrap();
        assert_eq!(
            state,
            CollectionState { dimensions: 4, metric: DistanceMetric::Euclid, next_id: 7 }
        );
        assert!(matches!(
            check_vector(BACKEND, Some(state.dimensions), &[1.0]),
            Err(RagError::DimensionMismatch { expected: 4, actual: 1 })
        ));
    }

    #[test]
    fn adopting_unsupported_layouts_fails() {
        let named = VectorsConfigKind::ParamsMap(VectorParamsMap::default());
        assert!(QdrantVectorStore::adopted_state("c", &info(Some(named)), 0).is_err());
        assert!(QdrantVectorStore::adopted_state("c", &info(None), 0).is_err());

        let manhattan =
            VectorsConfigKind::Params(VectorParamsBuilder::new(4, Distance::Manhattan).build());
        let err = QdrantVectorStore::adopted_state("c", &info(Some(manhattan)), 0).unwrap_err();
        assert!(err.to_string().contains("unsupported distance"));
    }

    #[test]
    fn hits_are_reordered_with_ties_by_id() {
        let hits = vec![hit(2, 0.7), hit(1, 0.7), hit(0, 0.9), hit(3, 0.2)];
        let results = QdrantVectorStore::to_results(hits, DistanceMetric::Cosine);
        assert_eq!(ids(&results), [0, 1, 2, 3]);
        assert_eq!(results[0].text, "chunk 0");
        assert_eq!(results[0].score, 0.9);
    }

    #[test]
    fn euclid_distances_become_negated_scores() {
        let results =
            QdrantVectorStore::to_results(vec![hit(5, 0.5), hit(3, 0.1)], DistanceMetric::Euclid);
        assert_eq!(ids(&results), [3, 5]);
        assert_eq!(results[0].score, -0.1);
        assert_eq!(results[1].score, -0.5);
    }

    #[test]
    fn uuid_points_are_skipped() {
        let mut foreign = hit(9, 0.99);
        foreign.id = Some(QdrantPointId::from("5c56c793-69f3-4fbf-87e6-c4bf54c28c26".to_string()));
        let results =
            QdrantVectorStore::to_results(vec![foreign, hit(1, 0.5)], DistanceMetric::Dot);
        assert_eq!(ids(&results), [1]);
    }
}
