//! # docqa-rag
//!
//! Question answering over a single document by retrieving relevant passages.
//!
//! ## Overview
//!
//! A parsed document is turned into overlapping chunks, each chunk is
//! embedded and stored in a vector collection, and queries are answered by
//! nearest-neighbour search, optional lexical reranking and optional merging
//! of the retrieved passages into one answer.
//!
//! - [`RetrievalPipeline`] - orchestrates ingest and query
//! - [`Chunker`] - [`FixedSizeChunker`] and [`SentenceChunker`]
//! - [`EmbeddingProvider`] - [`HashingEmbeddingProvider`] offline, or
//!   `OpenAIEmbeddingProvider` with the `openai` feature
//! - [`VectorStore`] - [`InMemoryVectorStore`], or `QdrantVectorStore` with the `qdrant` feature
//! - [`Reranker`] - [`TfIdfReranker`] and [`NoOpReranker`]
//! - [`AnswerSynthesizer`] - abstractive merging over any [`SummarizationModel`]
//! - [`DocumentParser`] - loads structured JSON, text and image files
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docqa_rag::{
//!     HashingEmbeddingProvider, InMemoryVectorStore, RagConfig, RetrievalPipeline,
//!     StructuredDocument, DocumentElement,
//! };
//!
//! let pipeline = RetrievalPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(HashingEmbeddingProvider::default()))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .build()?;
//!
//! pipeline.reset().await?;
//! let document = StructuredDocument::new("sky", vec![DocumentElement::text("The sky is blue.")]);
//! pipeline.ingest(&document).await?;
//! println!("{}", pipeline.process_query("What color is the sky?").await?);
//! ```
//!
//! ## Features
//!
//! | Feature | Enables |
//! |---------|---------|
//! | `openai` | OpenAI-compatible embeddings and chat summaries |
//! | `qdrant` | Qdrant vector store |
//! | `vlm` | HTTP image captioning client |
//! | `full` | all of the above |

pub mod captioning;
pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod hashing;
pub mod inmemory;
pub mod parser;
pub mod pipeline;
pub mod reranker;
pub mod synthesis;
pub mod vectorstore;

#[cfg(feature = "openai")]
pub mod openai;
#[cfg(feature = "qdrant")]
pub mod qdrant;

pub use captioning::{Captioner, DEFAULT_CAPTION_PROMPT, DEFAULT_VLM_URL};
pub use chunking::{
    ChunkStrategy, Chunker, FixedSizeChunker, RecursiveChunker, SentenceChunker, chunk_text,
    chunker_for,
};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{
    Answer, Chunk, DocumentElement, IndexedPoint, NO_RELEVANT_INFORMATION, PointId, PointPayload,
    RetrievalResult, StructuredDocument,
};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use hashing::HashingEmbeddingProvider;
pub use inmemory::InMemoryVectorStore;
pub use parser::{
    DocumentParser, ImageFileParser, JsonDocumentParser, PlainTextParser, parser_for_path,
};
pub use pipeline::{
    IngestReport, MergeMode, QueryOptions, QueryStage, RankMode, RetrievalPipeline,
    RetrievalPipelineBuilder,
};
pub use reranker::{NoOpReranker, Reranker, TfIdfReranker};
pub use synthesis::{AnswerSynthesizer, SummarizationModel, SynthesisConfig, extractive_merge};
pub use vectorstore::{DistanceMetric, VectorStore};

#[cfg(feature = "openai")]
pub use openai::{OpenAIChatSummarizer, OpenAIEmbeddingProvider};
#[cfg(feature = "qdrant")]
pub use qdrant::QdrantVectorStore;
#[cfg(feature = "vlm")]
pub use captioning::VlmCaptioner;
