//! Wiring the pipeline from command-line arguments and running the session.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use docqa_rag::{
    AnswerSynthesizer, Captioner, EmbeddingProvider, HashingEmbeddingProvider,
    InMemoryVectorStore, IngestReport, MergeMode, QueryOptions, RagConfig, RagError,
    RetrievalPipeline, StructuredDocument, VectorStore, parser_for_path,
};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::{info, warn};

use crate::args::{Cli, EmbedderKind};

/// Passages retrieved per query when neither a flag nor a config file says otherwise.
pub const DEFAULT_TOP_K: usize = 2;

/// Resolve the pipeline settings: built-in defaults, then the JSON config
/// file, then flags and environment variables.
///
/// Keys missing from the config file keep the built-in values.
pub fn resolve_config(cli: &Cli) -> anyhow::Result<RagConfig> {
    let base = RagConfig { top_k: DEFAULT_TOP_K, ..RagConfig::default() };
    let mut config = match &cli.config {
        Some(path) => merge_config_file(base, path)?,
        None => base,
    };

    if let Some(ranker) = cli.ranker {
        config.rank_mode = ranker;
    }
    if let Some(merger) = cli.merger {
        config.merge_mode = merger;
    }
    if let Some(top_k) = cli.top_k {
        config.top_k = top_k;
    }
    if let Some(size) = cli.chunk_size {
        config.chunk_size = size;
    }
    if let Some(overlap) = cli.chunk_overlap {
        config.chunk_overlap = overlap;
    }
    if let Some(strategy) = cli.chunk_strategy {
        config.chunk_strategy = strategy;
    }
    if let Some(collection) = &cli.collection {
        config.collection = collection.clone();
    }

    config.validate()?;
    Ok(config)
}

fn merge_config_file(base: RagConfig, path: &Path) -> anyhow::Result<RagConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let overrides: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("invalid JSON in config file {}", path.display()))?;
    let serde_json::Value::Object(overrides) = overrides else {
        bail!("config file {} must contain a JSON object", path.display());
    };

    let mut merged = serde_json::to_value(base)?;
    if let serde_json::Value::Object(fields) = &mut merged {
        fields.extend(overrides);
    }
    serde_json::from_value(merged)
        .with_context(|| format!("invalid settings in config file {}", path.display()))
}

fn embedding_provider(cli: &Cli) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    match cli.embedder {
        EmbedderKind::Hashing => {
            let provider = match cli.embedding_dimensions {
                Some(dimensions) => HashingEmbeddingProvider::new(dimensions)?,
                None => HashingEmbeddingProvider::default(),
            };
            Ok(Arc::new(provider))
        }
        EmbedderKind::Openai => openai_embedding_provider(cli),
    }
}

#[cfg(feature = "openai")]
fn openai_embedding_provider(cli: &Cli) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    use docqa_rag::OpenAIEmbeddingProvider;

    let api_key =
        cli.api_key.clone().context("--embedder openai needs --api-key or OPENAI_API_KEY")?;
    let mut provider = OpenAIEmbeddingProvider::new(api_key)?;
    if let Some(url) = &cli.embedding_url {
        provider = provider.with_base_url(url.clone());
    }
    if let Some(model) = &cli.embedding_model {
        provider = provider.with_model(model.clone());
    }
    if let Some(dimensions) = cli.embedding_dimensions {
        provider = provider.with_dimensions(dimensions);
    }
    Ok(Arc::new(provider))
}

#[cfg(not(feature = "openai"))]
fn openai_embedding_provider(_cli: &Cli) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    bail!("this build of docqa has no OpenAI support (enable the `openai` feature)")
}

#[cfg(feature = "qdrant")]
fn vector_store(cli: &Cli) -> anyhow::Result<Arc<dyn VectorStore>> {
    match &cli.qdrant_url {
        Some(url) => Ok(Arc::new(docqa_rag::QdrantVectorStore::new(url)?)),
        None => Ok(Arc::new(InMemoryVectorStore::new())),
    }
}

#[cfg(not(feature = "qdrant"))]
fn vector_store(cli: &Cli) -> anyhow::Result<Arc<dyn VectorStore>> {
    if cli.qdrant_url.is_some() {
        bail!("this build of docqa has no Qdrant support (enable the `qdrant` feature)");
    }
    Ok(Arc::new(InMemoryVectorStore::new()))
}

/// The summarizer, when abstractive merging is requested and possible.
///
/// A missing key only disables summaries; queries then fall back to
/// concatenation.
#[cfg(feature = "openai")]
fn synthesizer(cli: &Cli, config: &RagConfig) -> anyhow::Result<Option<Arc<AnswerSynthesizer>>> {
    use docqa_rag::{OpenAIChatSummarizer, SynthesisConfig};

    if config.merge_mode != MergeMode::Abstractive {
        return Ok(None);
    }
    let Some(api_key) = cli.api_key.clone() else {
        warn!("no API key for the summarization model; summaries are disabled");
        return Ok(None);
    };
    let mut model = OpenAIChatSummarizer::new(api_key)?;
    if let Some(url) = &cli.synthesis_url {
        model = model.with_base_url(url.clone());
    }
    if let Some(name) = &cli.synthesis_model {
        model = model.with_model(name.clone());
    }
    Ok(Some(Arc::new(AnswerSynthesizer::new(Arc::new(model), SynthesisConfig::default())?)))
}

#[cfg(not(feature = "openai"))]
fn synthesizer(_cli: &Cli, config: &RagConfig) -> anyhow::Result<Option<Arc<AnswerSynthesizer>>> {
    if config.merge_mode == MergeMode::Abstractive {
        warn!("this build has no summarization model; summaries are disabled");
    }
    Ok(None)
}

#[cfg(feature = "vlm")]
fn captioner(cli: &Cli) -> anyhow::Result<Option<Arc<dyn Captioner>>> {
    if cli.no_captions {
        return Ok(None);
    }
    Ok(Some(Arc::new(docqa_rag::VlmCaptioner::new(cli.vlm_url.clone())?)))
}

#[cfg(not(feature = "vlm"))]
fn captioner(_cli: &Cli) -> anyhow::Result<Option<Arc<dyn Captioner>>> {
    Ok(None)
}

/// Build the pipeline described by `cli` and `config`.
pub fn build_pipeline(cli: &Cli, config: RagConfig) -> anyhow::Result<RetrievalPipeline> {
    let mut builder = RetrievalPipeline::builder()
        .embedding_provider(embedding_provider(cli)?)
        .vector_store(vector_store(cli)?);
    if let Some(synthesizer) = synthesizer(cli, &config)? {
        builder = builder.synthesizer(synthesizer);
    }
    Ok(builder.config(config).build()?)
}

/// Parse the document named on the command line.
pub async fn load_document(cli: &Cli) -> anyhow::Result<StructuredDocument> {
    if !cli.path.exists() {
        bail!("document not found: {}", cli.path.display());
    }
    let parser = parser_for_path(&cli.path, captioner(cli)?)?;
    Ok(parser.parse(&cli.path).await?)
}

/// A loaded document ready for questions.
pub struct Session {
    pipeline: RetrievalPipeline,
    options: QueryOptions,
    report: IngestReport,
}

impl Session {
    /// Parse, chunk, embed and index the document named by `cli`.
    pub async fn start(cli: &Cli) -> anyhow::Result<Self> {
        let config = resolve_config(cli)?;
        let options = QueryOptions::from(&config);
        let pipeline = build_pipeline(cli, config)?;
        let document = load_document(cli).await?;
        Self::from_document(pipeline, options, &document).await
    }

    /// Index an already parsed document into a fresh collection.
    pub async fn from_document(
        pipeline: RetrievalPipeline,
        options: QueryOptions,
        document: &StructuredDocument,
    ) -> anyhow::Result<Self> {
        pipeline.reset().await?;
        let report = pipeline.ingest(document).await.context("failed to index document")?;
        info!(document = %report.source, chunks = report.chunk_count, "document indexed");
        Ok(Self { pipeline, options, report })
    }

    /// What was indexed.
    pub fn report(&self) -> &IngestReport {
        &self.report
    }

    /// Answer one question as display text.
    ///
    /// Failures are reported in the text. A failed summary falls back to the
    /// concatenated passages, with a note saying so.
    pub async fn respond(&self, query: &str) -> String {
        match self.pipeline.process_query_with(query, &self.options).await {
            Ok(answer) => answer.to_string(),
            Err(RagError::SynthesisError { message, .. })
                if self.options.merge_mode == MergeMode::Abstractive =>
            {
                warn!(%message, "summary failed; falling back to concatenation");
                let fallback = QueryOptions { merge_mode: MergeMode::Extractive, ..self.options };
                match self.pipeline.process_query_with(query, &fallback).await {
                    Ok(answer) => format!("(summary unavailable: {message})\n{answer}"),
                    Err(e) => format!("Error: {e}"),
                }
            }
            Err(e) => format!("Error: {e}"),
        }
    }
}

/// Run the command: one-shot with `--query`, otherwise an interactive loop.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    eprintln!("Parsing {}", cli.path.display());
    let session = Session::start(&cli).await?;
    eprintln!(
        "Indexed {} chunks from '{}'",
        session.report().chunk_count,
        session.report().source
    );

    if let Some(query) = &cli.query {
        println!("{}", session.respond(query).await);
        return Ok(());
    }

    let mut editor = DefaultEditor::new().context("failed to start line editor")?;
    eprintln!("Enter questions below (type 'exit' to quit).");
    loop {
        match editor.readline("Your question: ") {
            Ok(line) => {
                let query = line.trim();
                if query.eq_ignore_ascii_case("exit") {
                    break;
                }
                if query.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(query);
                println!("Answer: {}\n", session.respond(query).await);
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("failed to read input"),
        }
    }
    eprintln!("Goodbye.");
    Ok(())
}
