//! Tests for settings resolution and answering through a CLI session.

use std::io::Write;
use std::sync::Arc;

use clap::Parser;
use docqa_cli::app::DEFAULT_TOP_K;
use docqa_cli::{Cli, Session, resolve_config};
use docqa_rag::{
    ChunkStrategy, DocumentElement, HashingEmbeddingProvider, InMemoryVectorStore, MergeMode,
    NO_RELEVANT_INFORMATION, QueryOptions, RagConfig, RankMode, RetrievalPipeline,
    StructuredDocument,
};

fn temp_file(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn cli(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("docqa").chain(args.iter().copied())).unwrap()
}

fn hashing_pipeline(config: RagConfig) -> RetrievalPipeline {
    RetrievalPipeline::builder()
        .config(config)
        .embedding_provider(Arc::new(HashingEmbeddingProvider::default()))
        .vector_store(Arc::new(InMemoryVectorStore::new()))
        .build()
        .unwrap()
}

#[test]
fn defaults_retrieve_two_passages() {
    let config = resolve_config(&cli(&["doc.json"])).unwrap();
    assert_eq!(config.top_k, DEFAULT_TOP_K);
    assert_eq!(config.rank_mode, RankMode::Similarity);
    assert_eq!(config.merge_mode, MergeMode::None);
    assert_eq!(config.chunk_size, 300);
}

#[test]
fn config_file_then_flags() {
    let file = temp_file(
        ".json",
        r#"{"top_k": 4, "chunk_size": 100, "merge_mode": "concatenation"}"#,
    );
    let path = file.path().to_str().unwrap();

    let args = ["doc.json", "--config", path, "--chunk-overlap", "10"];
    let config = resolve_config(&cli(&args)).unwrap();
    assert_eq!(config.top_k, 4);
    assert_eq!(config.chunk_size, 100);
    assert_eq!(config.chunk_overlap, 10);
    assert_eq!(config.merge_mode, MergeMode::Extractive);

    let config = resolve_config(&cli(&[
        "doc.json", "--config", path, "--top-k", "7", "--chunk-strategy", "fixed",
    ]))
    .unwrap();
    assert_eq!(config.top_k, 7);
    assert_eq!(config.chunk_strategy, ChunkStrategy::Fixed);
}

#[test]
fn inconsistent_chunking_is_rejected() {
    let err = resolve_config(&cli(&["doc.json", "--chunk-size", "10", "--chunk-overlap", "10"]));
    assert!(err.is_err());
}

#[test]
fn malformed_config_file_is_reported() {
    let file = temp_file(".json", "[1, 2, 3]");
    let path = file.path().to_str().unwrap();
    let err = resolve_config(&cli(&["doc.json", "--config", path])).unwrap_err();
    assert!(err.to_string().contains("JSON object"));
}

#[tokio::test]
async fn one_text_file_session_answers_questions() {
    let file = temp_file(".txt", "The sky is blue. Grass is green. Tea is hot.");
    let path = file.path().to_str().unwrap();
    let session = Session::start(&cli(&[path, "--no-captions", "--merger", "concatenation"]))
        .await
        .unwrap();
    assert_eq!(session.report().chunk_count, 1);

    let answer = session.respond("What color is the sky?").await;
    assert_eq!(answer, "The sky is blue. Grass is green. Tea is hot.");
    assert!(session.respond("   ").await.starts_with("Error: Invalid query"));
}

#[tokio::test]
async fn missing_document_fails_to_start() {
    let result = Session::start(&cli(&["/definitely/not/here.json", "--no-captions"])).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn empty_document_prints_the_sentinel() {
    let options = QueryOptions::from(&RagConfig::default());
    let session = Session::from_document(
        hashing_pipeline(RagConfig::default()),
        options,
        &StructuredDocument::new("empty", vec![]),
    )
    .await
    .unwrap();
    assert_eq!(session.respond("anything?").await, NO_RELEVANT_INFORMATION);
}

#[tokio::test]
async fn failed_summary_falls_back_to_concatenation() {
    let config = RagConfig::builder().top_k(1).merge_mode(MergeMode::Abstractive).build().unwrap();
    let options = QueryOptions::from(&config);
    let document = StructuredDocument::new(
        "sky",
        vec![DocumentElement::text("The sky is blue."), DocumentElement::image(1, "A cloud.")],
    );
    let session =
        Session::from_document(hashing_pipeline(config), options, &document).await.unwrap();

    let answer = session.respond("sky").await;
    assert!(answer.starts_with("(summary unavailable"), "got {answer}");
    assert!(answer.ends_with("The sky is blue.\n\nImage Caption: A cloud."), "got {answer}");
}
