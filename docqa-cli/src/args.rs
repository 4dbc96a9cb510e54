//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use docqa_rag::{ChunkStrategy, DEFAULT_VLM_URL, MergeMode, RankMode};

/// Embedding backends selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum EmbedderKind {
    /// Offline feature-hashing embedder.
    #[default]
    Hashing,
    /// OpenAI-compatible `/embeddings` endpoint.
    Openai,
}

/// Ask questions about a document.
///
/// The document is chunked, embedded and indexed once; questions are then
/// answered interactively (type `exit` to quit) or once with `--query`.
#[derive(Parser, Debug, Clone)]
#[command(name = "docqa", author, version, about, long_about = None)]
pub struct Cli {
    /// Document to load: structured JSON from the layout extractor, .txt/.md, or an image
    pub path: PathBuf,

    /// Ranking method: cosine_similarity, tfidf or none
    #[arg(long, env = "DOCQA_RANKER")]
    pub ranker: Option<RankMode>,

    /// Merging method: concatenation, t5 or none
    #[arg(long, env = "DOCQA_MERGER")]
    pub merger: Option<MergeMode>,

    /// Number of retrieved passages [default: 2]
    #[arg(long = "top-k", visible_alias = "top_k", env = "DOCQA_TOP_K")]
    pub top_k: Option<usize>,

    /// Target chunk size in characters
    #[arg(long, env = "DOCQA_CHUNK_SIZE")]
    pub chunk_size: Option<usize>,

    /// Characters shared between consecutive chunks
    #[arg(long, env = "DOCQA_CHUNK_OVERLAP")]
    pub chunk_overlap: Option<usize>,

    /// Chunking strategy: fixed, sentence-aware or recursive
    #[arg(long, env = "DOCQA_CHUNK_STRATEGY")]
    pub chunk_strategy: Option<ChunkStrategy>,

    /// Vector collection name
    #[arg(long, env = "DOCQA_COLLECTION")]
    pub collection: Option<String>,

    /// JSON file with pipeline settings; flags take precedence
    #[arg(long, env = "DOCQA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Answer a single question and exit
    #[arg(long, short = 'q')]
    pub query: Option<String>,

    /// Embedding backend
    #[arg(long, value_enum, default_value_t = EmbedderKind::Hashing, env = "DOCQA_EMBEDDER")]
    pub embedder: EmbedderKind,

    /// Embedding vector length (hashing default 384)
    #[arg(long, env = "DOCQA_EMBEDDING_DIMENSIONS")]
    pub embedding_dimensions: Option<usize>,

    /// Base URL of the OpenAI-compatible embeddings API
    #[arg(long, env = "DOCQA_EMBEDDING_URL")]
    pub embedding_url: Option<String>,

    /// Embedding model name
    #[arg(long, env = "DOCQA_EMBEDDING_MODEL")]
    pub embedding_model: Option<String>,

    /// Base URL of the OpenAI-compatible chat API used for summaries
    #[arg(long, env = "DOCQA_SYNTHESIS_URL")]
    pub synthesis_url: Option<String>,

    /// Chat model used for summaries
    #[arg(long, env = "DOCQA_SYNTHESIS_MODEL")]
    pub synthesis_model: Option<String>,

    /// API key for the embedding and synthesis endpoints
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Image captioning endpoint
    #[arg(long, env = "DOCQA_VLM_URL", default_value = DEFAULT_VLM_URL)]
    pub vlm_url: String,

    /// Do not caption images
    #[arg(long)]
    pub no_captions: bool,

    /// Store vectors in Qdrant at this URL instead of in memory
    #[arg(long, env = "DOCQA_QDRANT_URL")]
    pub qdrant_url: Option<String>,

    /// Log pipeline stages to stderr
    #[arg(long, short = 'v')]
    pub verbose: bool,
}
