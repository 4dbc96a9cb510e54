//! Error types for the `docqa-rag` crate.

use thiserror::Error;

/// Errors that can occur while ingesting documents or answering queries.
#[derive(Debug, Error)]
pub enum RagError {
    /// The query was empty or blank. Raised before any work is performed.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A vector did not have the dimension the collection was configured with.
    ///
    /// This is a configuration inconsistency between the embedder and the
    /// index and is not recoverable at runtime.
    #[error("Dimension mismatch: collection expects {expected} dimensions, got {actual}")]
    DimensionMismatch {
        /// The dimension the collection was created with.
        expected: usize,
        /// The dimension of the offending vector.
        actual: usize,
    },

    /// The answer synthesis model failed or is unavailable.
    #[error("Synthesis error ({model}): {message}")]
    SynthesisError {
        /// The synthesis model that produced the error.
        model: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector store backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// Chunking parameters were invalid.
    #[error("Chunking error: {0}")]
    ChunkingError(String),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A source document could not be read or parsed.
    #[error("Document error ({path}): {message}")]
    DocumentError {
        /// Path of the document being parsed.
        path: String,
        /// A description of the failure.
        message: String,
    },
}

/// A convenience result type for retrieval operations.
pub type Result<T> = std::result::Result<T, RagError>;
