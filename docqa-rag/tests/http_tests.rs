//! HTTP clients against local stub servers.

#![cfg(any(feature = "openai", feature = "vlm"))]

use axum::Router;

async fn spawn_server(app: Router) -> (String, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server run");
    });

    (format!("http://{}", addr), handle)
}

#[cfg(feature = "openai")]
mod openai {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use docqa_rag::{
        AnswerSynthesizer, EmbeddingProvider, OpenAIChatSummarizer, OpenAIEmbeddingProvider,
        RagError, SynthesisConfig,
    };
    use serde_json::{Value, json};

    use super::spawn_server;

    /// Answers with `[chars, 1, 0]` per input, in reverse order.
    async fn embeddings(
        State(requests): State<Arc<AtomicUsize>>,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        requests.fetch_add(1, Ordering::SeqCst);
        let inputs = body["input"].as_array().cloned().unwrap_or_default();
        let mut data: Vec<Value> = inputs
            .iter()
            .enumerate()
            .map(|(index, text)| {
                let len = text.as_str().unwrap_or_default().chars().count() as f32;
                json!({"object": "embedding", "index": index, "embedding": [len, 1.0, 0.0]})
            })
            .collect();
        data.reverse();
        Json(json!({"object": "list", "data": data, "model": body["model"]}))
    }

    async fn chat(Json(body): Json<Value>) -> Json<Value> {
        let prompt = body["messages"][0]["content"].as_str().unwrap_or_default();
        let max_tokens = body["max_tokens"].as_u64().unwrap_or_default();
        Json(json!({
            "choices": [{"index": 0, "message": {"role": "assistant",
                "content": format!("  {max_tokens}: {prompt}  ")}}]
        }))
    }

    async fn failing() -> (StatusCode, Json<Value>) {
        (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({"error": {"message": "rate limited"}})),
        )
    }

    async fn stub() -> (String, Arc<AtomicUsize>) {
        let requests = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route("/v1/embeddings", post(embeddings))
            .route("/v1/chat/completions", post(chat))
            .route("/broken/embeddings", post(failing))
            .route("/broken/chat/completions", post(failing))
            .with_state(requests.clone());
        let (base, _handle) = spawn_server(app).await;
        (base, requests)
    }

    #[tokio::test]
    async fn batches_requests_and_restores_input_order() {
        let (base, requests) = stub().await;
        let provider = OpenAIEmbeddingProvider::new("test-key")
            .unwrap()
            .with_base_url(format!("{base}/v1"))
            .with_dimensions(3)
            .with_batch_size(2);

        let texts = ["a", "bb", "ccc", "dddd", "eeeee"];
        let vectors = provider.embed_batch(&texts).await.unwrap();

        let lengths: Vec<f32> = vectors.iter().map(|v| v[0]).collect();
        assert_eq!(lengths, [1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(requests.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn wrong_vector_length_is_an_embedding_error() {
        let (base, _) = stub().await;
        let provider =
            OpenAIEmbeddingProvider::new("test-key").unwrap().with_base_url(format!("{base}/v1"));
        let err = provider.embed("hello").await.unwrap_err();
        assert!(matches!(
            err,
            RagError::EmbeddingError { message, .. } if message.contains("1536")
        ));
    }

    #[tokio::test]
    async fn api_errors_carry_the_server_message() {
        let (base, _) = stub().await;
        let provider = OpenAIEmbeddingProvider::new("test-key")
            .unwrap()
            .with_base_url(format!("{base}/broken"))
            .with_dimensions(3);
        let err = provider.embed("hello").await.unwrap_err();
        assert!(matches!(
            err,
            RagError::EmbeddingError { message, .. } if message.contains("rate limited")
        ));
    }

    #[tokio::test]
    async fn chat_summarizer_sends_prompt_and_token_limit() {
        let (base, _) = stub().await;
        let model =
            OpenAIChatSummarizer::new("test-key").unwrap().with_base_url(format!("{base}/v1"));
        let synthesizer =
            AnswerSynthesizer::new(Arc::new(model), SynthesisConfig::default()).unwrap();
        let summary = synthesizer.summarize(&["A.", "B."]).await.unwrap();
        assert_eq!(summary, "500: Summarize this text: A. B.");
    }

    #[tokio::test]
    async fn chat_failures_are_synthesis_errors() {
        let (base, _) = stub().await;
        let model =
            OpenAIChatSummarizer::new("test-key").unwrap().with_base_url(format!("{base}/broken"));
        let synthesizer =
            AnswerSynthesizer::new(Arc::new(model), SynthesisConfig::default()).unwrap();
        let err = synthesizer.summarize(&["A."]).await.unwrap_err();
        assert!(matches!(err, RagError::SynthesisError { .. }));
    }
}

#[cfg(feature = "vlm")]
mod vlm {
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use docqa_rag::{Captioner, DEFAULT_CAPTION_PROMPT, VlmCaptioner};
    use serde_json::{Value, json};

    use super::spawn_server;

    async fn describe(Json(body): Json<Value>) -> Json<Value> {
        let prompt = body["prompt"].as_str().unwrap_or_default();
        let image = body["image_base64"].as_str().unwrap_or_default();
        Json(json!({"description": format!("{prompt} {image}")}))
    }

    async fn bare() -> Json<Value> {
        Json(json!("a bare caption"))
    }

    async fn overloaded() -> (StatusCode, &'static str) {
        (StatusCode::SERVICE_UNAVAILABLE, "overloaded")
    }

    async fn stub() -> String {
        let app = Router::new()
            .route("/caption_image", post(describe))
            .route("/bare", post(bare))
            .route("/overloaded", post(overloaded));
        spawn_server(app).await.0
    }

    #[tokio::test]
    async fn posts_image_and_prompt() {
        let base = stub().await;
        let captioner = VlmCaptioner::new(format!("{base}/caption_image")).unwrap();
        let caption = captioner.caption("aGVsbG8=", DEFAULT_CAPTION_PROMPT).await;
        assert_eq!(caption, "Describe this image. aGVsbG8=");
    }

    #[tokio::test]
    async fn accepts_a_bare_string_response() {
        let base = stub().await;
        let captioner = VlmCaptioner::new(format!("{base}/bare")).unwrap();
        assert_eq!(captioner.caption("x", DEFAULT_CAPTION_PROMPT).await, "a bare caption");
    }

    #[tokio::test]
    async fn error_status_becomes_caption_text() {
        let base = stub().await;
        let captioner = VlmCaptioner::new(format!("{base}/overloaded")).unwrap();
        assert_eq!(captioner.caption("x", DEFAULT_CAPTION_PROMPT).await, "Error: 503, overloaded");
    }

    #[tokio::test]
    async fn unreachable_service_becomes_caption_text() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let captioner = VlmCaptioner::new(format!("http://{addr}/caption_image")).unwrap();
        let caption = captioner.caption("x", DEFAULT_CAPTION_PROMPT).await;
        assert!(caption.starts_with("API request failed:"), "got {caption}");
    }
}
