//! Configuration for the retrieval pipeline.

use serde::{Deserialize, Serialize};

use crate::chunking::ChunkStrategy;
use crate::error::{RagError, Result};
use crate::pipeline::{MergeMode, RankMode};
use crate::vectorstore::DistanceMetric;

/// Configuration parameters for the retrieval pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Name of the vector store collection holding the document.
    pub collection: String,
    /// Target chunk size in characters.
    pub chunk_size: usize,
    /// Number of characters shared between consecutive chunks.
    pub chunk_overlap: usize,
    /// How the document text is split into chunks.
    pub chunk_strategy: ChunkStrategy,
    /// Default number of candidates retrieved per query.
    pub top_k: usize,
    /// Similarity metric of the collection.
    pub distance: DistanceMetric,
    /// Default ranking applied to retrieved candidates.
    pub rank_mode: RankMode,
    /// Default way of turning ranked candidates into an answer.
    pub merge_mode: MergeMode,
    /// Drop retrieved candidates scoring below this value. Unset keeps all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_threshold: Option<f32>,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            collection: "pdf_queries".to_string(),
            chunk_size: 300,
            chunk_overlap: 50,
            chunk_strategy: ChunkStrategy::SentenceAware,
            top_k: 5,
            distance: DistanceMetric::Cosine,
            rank_mode: RankMode::Similarity,
            merge_mode: MergeMode::None,
            similarity_threshold: None,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Check that the parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `collection` is empty
    /// - `chunk_size == 0`
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    pub fn validate(&self) -> Result<()> {
        if self.collection.trim().is_empty() {
            return Err(RagError::ConfigError("collection name must not be empty".to_string()));
        }
        if self.chunk_size == 0 {
            return Err(RagError::ConfigError("chunk_size must be greater than zero".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Start from an existing configuration, e.g. one loaded from a file.
    pub fn from_config(config: RagConfig) -> Self {
        Self { config }
    }

    /// Set the collection name.
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.config.collection = name.into();
        self
    }

    /// Set the target chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the chunking strategy.
    pub fn chunk_strategy(mut self, strategy: ChunkStrategy) -> Self {
        self.config.chunk_strategy = strategy;
        self
    }

    /// Set the default number of candidates retrieved per query.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the similarity metric.
    pub fn distance(mut self, distance: DistanceMetric) -> Self {
        self.config.distance = distance;
        self
    }

    /// Set the default rank mode.
    pub fn rank_mode(mut self, mode: RankMode) -> Self {
        self.config.rank_mode = mode;
        self
    }

    /// Set the default merge mode.
    pub fn merge_mode(mut self, mode: MergeMode) -> Self {
        self.config.merge_mode = mode;
        self
    }

    /// Set the minimum similarity score for retrieved candidates.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = Some(threshold);
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RagConfig::builder().build().unwrap();
        assert_eq!(config.collection, "pdf_queries");
        assert_eq!(config.chunk_size, 300);
        assert_eq!(config.chunk_overlap, 50);
        assert_eq!(config.similarity_threshold, None);
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        let err = RagConfig::builder().chunk_size(10).chunk_overlap(10).build().unwrap_err();
        assert!(matches!(err, RagError::ConfigError(msg) if msg.contains("chunk_overlap")));
    }

    #[test]
    fn rejects_zero_top_k_and_empty_collection() {
        assert!(RagConfig::builder().top_k(0).build().is_err());
        assert!(RagConfig::builder().collection("  ").build().is_err());
        assert!(RagConfig::builder().chunk_size(0).chunk_overlap(0).build().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: RagConfig =
            serde_json::from_str(r#"{"top_k": 2, "rank_mode": "lexical"}"#).unwrap();
        assert_eq!(config.top_k, 2);
        assert_eq!(config.rank_mode, RankMode::Lexical);
        assert_eq!(config.chunk_size, 300);
    }
}
