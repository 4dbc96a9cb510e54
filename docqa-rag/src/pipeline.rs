//! Retrieval pipeline orchestrator.
//!
//! The [`RetrievalPipeline`] coordinates the ingest and query workflows by
//! composing an [`EmbeddingProvider`], a [`VectorStore`], a [`Chunker`], a
//! [`Reranker`] and an optional [`AnswerSynthesizer`].
//!
//! A query moves through the stages of [`QueryStage`] in order, each stage
//! attempted once:
//!
//! ```text
//! Embedding -> Searching -> [Reranking] -> [Synthesizing] -> Done
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::{RetrievalPipeline, RagConfig, InMemoryVectorStore, HashingEmbeddingProvider};
//!
//! let pipeline = RetrievalPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(HashingEmbeddingProvider::default()))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .build()?;
//!
//! pipeline.reset().await?;
//! pipeline.ingest(&document).await?;
//! let answer = pipeline.process_query("What color is the sky?").await?;
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::chunking::{Chunker, chunker_for};
use crate::config::RagConfig;
use crate::document::{Answer, PointId, PointPayload, RetrievalResult, StructuredDocument};
use crate::embedding::{EmbeddingProvider, check_batch};
use crate::error::{RagError, Result};
use crate::reranker::{Reranker, TfIdfReranker};
use crate::synthesis::{AnswerSynthesizer, extractive_merge};
use crate::vectorstore::VectorStore;

/// How retrieved candidates are ordered before merging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankMode {
    /// Keep the vector store's similarity order.
    #[default]
    #[serde(alias = "cosine_similarity")]
    Similarity,
    /// Rerank by lexical TF-IDF similarity to the query.
    #[serde(alias = "tfidf")]
    Lexical,
    /// No ranking step; the store's order is used as is.
    None,
}

impl fmt::Display for RankMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RankMode::Similarity => f.write_str("similarity"),
            RankMode::Lexical => f.write_str("lexical"),
            RankMode::None => f.write_str("none"),
        }
    }
}

impl FromStr for RankMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "similarity" | "cosine_similarity" | "cosine" => Ok(RankMode::Similarity),
            "lexical" | "tfidf" | "tf-idf" => Ok(RankMode::Lexical),
            "none" => Ok(RankMode::None),
            other => Err(format!(
                "unknown ranker '{other}' (expected 'cosine_similarity', 'tfidf' or 'none')"
            )),
        }
    }
}

/// How ranked candidates become an answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMode {
    /// Return the ranked texts themselves.
    #[default]
    None,
    /// Join the ranked texts with newlines.
    #[serde(alias = "concatenation")]
    Extractive,
    /// Summarize the ranked texts with the generative model.
    #[serde(alias = "t5")]
    Abstractive,
}

impl fmt::Display for MergeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeMode::None => f.write_str("none"),
            MergeMode::Extractive => f.write_str("extractive"),
            MergeMode::Abstractive => f.write_str("abstractive"),
        }
    }
}

impl FromStr for MergeMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(MergeMode::None),
            "extractive" | "concatenation" | "concat" => Ok(MergeMode::Extractive),
            "abstractive" | "t5" | "summarize" => Ok(MergeMode::Abstractive),
            other => Err(format!(
                "unknown merger '{other}' (expected 'concatenation', 't5' or 'none')"
            )),
        }
    }
}

/// Stages of a single query, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStage {
    /// Embedding the query text.
    Embedding,
    /// Searching the vector store.
    Searching,
    /// Lexical reranking of candidates.
    Reranking,
    /// Merging candidates into one answer.
    Synthesizing,
    /// Answer produced.
    Done,
}

impl fmt::Display for QueryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueryStage::Embedding => "embedding",
            QueryStage::Searching => "searching",
            QueryStage::Reranking => "reranking",
            QueryStage::Synthesizing => "synthesizing",
            QueryStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Per-query settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Maximum number of candidates retrieved from the store.
    pub top_k: usize,
    /// Ranking of the candidates.
    pub rank_mode: RankMode,
    /// Merging of the ranked candidates.
    pub merge_mode: MergeMode,
}

impl From<&RagConfig> for QueryOptions {
    fn from(config: &RagConfig) -> Self {
        Self { top_k: config.top_k, rank_mode: config.rank_mode, merge_mode: config.merge_mode }
    }
}

/// Summary of one ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestReport {
    /// Name of the ingested source.
    pub source: String,
    /// Number of chunks stored.
    pub chunk_count: usize,
    /// Ids of the stored points, in chunk order.
    pub point_ids: Vec<PointId>,
}

/// The retrieval pipeline orchestrator.
///
/// Coordinates document ingestion (chunk → embed → store) and query
/// execution (embed → search → rerank → merge). Construct one via
/// [`RetrievalPipeline::builder()`]. A pipeline holds no per-query state;
/// it can serve concurrent queries, and its components can be shared with
/// other pipelines.
pub struct RetrievalPipeline {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    chunker: Arc<dyn Chunker>,
    reranker: Arc<dyn Reranker>,
    synthesizer: Option<Arc<AnswerSynthesizer>>,
}

impl RetrievalPipeline {
    /// Create a new [`RetrievalPipelineBuilder`].
    pub fn builder() -> RetrievalPipelineBuilder {
        RetrievalPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Return a reference to the vector store.
    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.vector_store
    }

    /// Whether an abstractive synthesizer is configured.
    pub fn has_synthesizer(&self) -> bool {
        self.synthesizer.is_some()
    }

    /// Recreate the pipeline's collection, empty.
    ///
    /// The collection is created with the dimensionality reported by the
    /// configured [`EmbeddingProvider`]. Must not race with queries against
    /// the same collection.
    ///
    /// # Errors
    ///
    /// Propagates vector store failures.
    pub async fn reset(&self) -> Result<()> {
        let collection = &self.config.collection;
        let dimensions = self.embedding_provider.dimensions();
        self.vector_store
            .reset_collection(collection, dimensions, self.config.distance)
            .await
            .map_err(|e| {
                error!(collection, error = %e, "failed to reset collection");
                e
            })?;
        info!(collection, dimensions, "collection reset");
        Ok(())
    }

    /// Ingest a parsed document: build its text, chunk, embed, store.
    ///
    /// # Errors
    ///
    /// Propagates embedding and vector store failures.
    pub async fn ingest(&self, document: &StructuredDocument) -> Result<IngestReport> {
        self.ingest_text(&document.name, &document.to_text()).await
    }

    /// Ingest plain text under a source name.
    ///
    /// Points are stored in chunk order, so their ids follow the document.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingError`] if the provider fails or returns
    /// the wrong number of vectors, and
    /// [`RagError::DimensionMismatch`] if the vectors do not fit the collection.
    pub async fn ingest_text(&self, source: &str, text: &str) -> Result<IngestReport> {
        let collection = &self.config.collection;
        let chunks = self.chunker.chunk(text);
        if chunks.is_empty() {
            info!(source, chunk_count = 0, "ingested document (empty)");
            return Ok(IngestReport {
                source: source.to_string(),
                chunk_count: 0,
                point_ids: vec![],
            });
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = self.embedding_provider.embed_batch(&texts).await.map_err(|e| {
            error!(source, error = %e, "embedding failed during ingestion");
            e
        })?;
        check_batch(self.embedding_provider.name(), chunks.len(), None, &embeddings)?;

        let points: Vec<(PointPayload, Vec<f32>)> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, vector)| {
                (PointPayload { text: chunk.text, chunk_index: chunk.index }, vector)
            })
            .collect();

        let point_ids = self.vector_store.upsert_batch(collection, points).await.map_err(|e| {
            error!(source, collection, error = %e, "upsert failed during ingestion");
            e
        })?;

        let chunk_count = point_ids.len();
        info!(source, collection, chunk_count, "ingested document");
        Ok(IngestReport { source: source.to_string(), chunk_count, point_ids })
    }

    /// Embed a query and search for up to `top_k` candidates.
    ///
    /// Candidates below the configured similarity threshold are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidQuery`] for a blank query, before any
    /// other work. Propagates embedding and search failures.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievalResult>> {
        if query.trim().is_empty() {
            return Err(RagError::InvalidQuery("query must not be empty".to_string()));
        }
        let collection = &self.config.collection;

        debug!(stage = %QueryStage::Embedding, "query stage");
        let query_embedding = self.embedding_provider.embed(query).await.map_err(|e| {
            error!(error = %e, "embedding failed during query");
            e
        })?;

        debug!(stage = %QueryStage::Searching, top_k, "query stage");
        let results =
            self.vector_store.search(collection, &query_embedding, top_k).await.map_err(|e| {
                error!(collection, error = %e, "vector store search failed");
                e
            })?;

        Ok(match self.config.similarity_threshold {
            Some(threshold) => results.into_iter().filter(|r| r.score >= threshold).collect(),
            None => results,
        })
    }

    /// Answer a query with the configured default options.
    ///
    /// # Errors
    ///
    /// See [`process_query_with`](Self::process_query_with).
    pub async fn process_query(&self, query: &str) -> Result<Answer> {
        self.process_query_with(query, &QueryOptions::from(&self.config)).await
    }

    /// Answer a query.
    ///
    /// An empty candidate set yields [`Answer::NoRelevantInformation`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidQuery`] for a blank query and
    /// [`RagError::SynthesisError`] when an abstractive merge is requested
    /// without a configured synthesizer or the model fails. Other stage
    /// failures propagate unchanged; nothing is retried.
    pub async fn process_query_with(&self, query: &str, options: &QueryOptions) -> Result<Answer> {
        let results = self.retrieve(query, options.top_k).await?;
        if results.is_empty() {
            info!(result_count = 0, "query completed with no candidates");
            return Ok(Answer::NoRelevantInformation);
        }
        let result_count = results.len();

        let ranked = match options.rank_mode {
            RankMode::Lexical => {
                debug!(stage = %QueryStage::Reranking, candidates = result_count, "query stage");
                self.reranker.rerank(query, results).await.map_err(|e| {
                    error!(error = %e, "reranking failed");
                    e
                })?
            }
            RankMode::Similarity | RankMode::None => results,
        };
        let texts: Vec<String> = ranked.into_iter().map(|r| r.text).collect();

        let answer = match options.merge_mode {
            MergeMode::None => Answer::Ranked(texts),
            MergeMode::Extractive => {
                debug!(stage = %QueryStage::Synthesizing, mode = "extractive", "query stage");
                Answer::Text(extractive_merge(&texts))
            }
            MergeMode::Abstractive => {
                debug!(stage = %QueryStage::Synthesizing, mode = "abstractive", "query stage");
                let synthesizer = self.synthesizer.as_ref().ok_or_else(|| {
                    RagError::SynthesisError {
                        model: "none".to_string(),
                        message: "no synthesis model configured".to_string(),
                    }
                })?;
                Answer::Text(synthesizer.summarize(&texts).await?)
            }
        };

        debug!(stage = %QueryStage::Done, "query stage");
        info!(
            result_count,
            rank_mode = %options.rank_mode,
            merge_mode = %options.merge_mode,
            "query completed"
        );
        Ok(answer)
    }
}

/// Builder for constructing a [`RetrievalPipeline`].
///
/// `config`, `embedding_provider` and `vector_store` are required. The
/// chunker defaults to the one named by the config, the reranker to
/// [`TfIdfReranker`], and abstractive synthesis is unavailable unless a
/// synthesizer is set.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = RetrievalPipeline::builder()
///     .config(RagConfig::default())
///     .embedding_provider(Arc::new(embedder))
///     .vector_store(Arc::new(store))
///     .synthesizer(Arc::new(synthesizer))  // optional
///     .build()?;
/// ```
#[derive(Default)]
pub struct RetrievalPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    chunker: Option<Arc<dyn Chunker>>,
    reranker: Option<Arc<dyn Reranker>>,
    synthesizer: Option<Arc<AnswerSynthesizer>>,
}

impl RetrievalPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Override the chunker derived from the config.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Override the lexical reranker.
    pub fn reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Set the synthesizer used for abstractive merges.
    pub fn synthesizer(mut self, synthesizer: Arc<AnswerSynthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    /// Build the [`RetrievalPipeline`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required field is missing or
    /// the config is invalid.
    pub fn build(self) -> Result<RetrievalPipeline> {
        let config =
            self.config.ok_or_else(|| RagError::ConfigError("config is required".to_string()))?;
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::ConfigError("vector_store is required".to_string()))?;
        let chunker = match self.chunker {
            Some(chunker) => chunker,
            None => chunker_for(config.chunk_strategy, config.chunk_size, config.chunk_overlap)?,
        };
        let reranker = self.reranker.unwrap_or_else(|| Arc::new(TfIdfReranker));

        Ok(RetrievalPipeline {
            config,
            embedding_provider,
            vector_store,
            chunker,
            reranker,
            synthesizer: self.synthesizer,
        })
    }
}
