//! Property tests for chunking, vector search and reranking.

use docqa_rag::document::{PointPayload, RetrievalResult};
use docqa_rag::{
    ChunkStrategy, DistanceMetric, InMemoryVectorStore, Reranker, TfIdfReranker, VectorStore,
    chunk_text,
};
use proptest::prelude::*;

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map(
        "non-zero embedding",
        |mut v| {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm < 1e-8 {
                return None;
            }
            for val in &mut v {
                *val /= norm;
            }
            Some(v)
        },
    )
}

/// Text with sentence punctuation, newlines and multi-byte chars.
fn arb_document_text() -> impl Strategy<Value = String> {
    "[a-zA-Zéü0-9 ,.!?\n]{0,400}"
}

/// Chunk size with a smaller overlap.
fn arb_chunk_params() -> impl Strategy<Value = (usize, usize)> {
    (1usize..80).prop_flat_map(|size| (Just(size), 0..size))
}

/// **Chunk reconstruction**
/// *For any* text and valid parameters, concatenating every chunk with its
/// overlap removed yields the original text, and each chunk is the slice of
/// the source its `start` points at.
mod prop_chunk_reconstruction {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn every_strategy_reconstructs_the_source(
            text in arb_document_text(),
            (size, overlap) in arb_chunk_params(),
        ) {
            let strategies =
                [ChunkStrategy::Fixed, ChunkStrategy::SentenceAware, ChunkStrategy::Recursive];
            for strategy in strategies {
                let chunks = chunk_text(&text, size, overlap, strategy).unwrap();
                let rebuilt: String = chunks.iter().map(|c| c.fresh_text()).collect();
                prop_assert_eq!(&rebuilt, &text, "strategy {}", strategy);

                let chars: Vec<char> = text.chars().collect();
                for (i, chunk) in chunks.iter().enumerate() {
                    prop_assert_eq!(chunk.index, i);
                    let len = chunk.text.chars().count();
                    let slice: String = chars[chunk.start..chunk.start + len].iter().collect();
                    prop_assert_eq!(&slice, &chunk.text);
                }
            }
        }

        #[test]
        fn bounded_strategies_never_exceed_chunk_size(
            text in arb_document_text(),
            (size, overlap) in arb_chunk_params(),
        ) {
            for strategy in [ChunkStrategy::Fixed, ChunkStrategy::Recursive] {
                let chunks = chunk_text(&text, size, overlap, strategy).unwrap();
                for chunk in &chunks {
                    prop_assert!(chunk.text.chars().count() <= size, "strategy {}", strategy);
                }
            }
        }
    }
}

fn store_points(vectors: &[Vec<f32>]) -> Vec<(PointPayload, Vec<f32>)> {
    vectors
        .iter()
        .enumerate()
        .map(|(i, v)| (PointPayload { text: format!("chunk {i}"), chunk_index: i }, v.clone()))
        .collect()
}

/// **Search ordering and bounds**
/// *For any* stored vectors, a search returns `min(top_k, n)` results in
/// descending score order, ties by ascending id, and repeating the search
/// returns the same results.
mod prop_search {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_ordered_bounded_and_repeatable(
            vectors in proptest::collection::vec(arb_normalized_embedding(DIM), 0..20),
            query in arb_normalized_embedding(DIM),
            top_k in 0usize..25,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let (first, second) = rt.block_on(async {
                let store = InMemoryVectorStore::new();
                store.reset_collection("test", DIM, DistanceMetric::Cosine).await.unwrap();
                store.upsert_batch("test", store_points(&vectors)).await.unwrap();
                let first = store.search("test", &query, top_k).await.unwrap();
                let second = store.search("test", &query, top_k).await.unwrap();
                (first, second)
            });

            prop_assert_eq!(first.len(), top_k.min(vectors.len()));
            for window in first.windows(2) {
                prop_assert!(
                    window[0].score > window[1].score
                        || (window[0].score == window[1].score && window[0].id < window[1].id),
                    "results out of order: {:?} before {:?}",
                    window[0],
                    window[1],
                );
            }
            prop_assert_eq!(first, second);
        }
    }
}

/// **Reranking is a permutation**
/// *For any* candidates, the reranker returns exactly the same texts, none
/// added, dropped or duplicated.
mod prop_rerank_permutation {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn reranked_texts_are_a_permutation(
            texts in proptest::collection::vec("[a-z]{1,8}( [a-z]{1,8}){0,6}", 0..12),
            query in "[a-z]{1,8}( [a-z]{1,8}){0,3}",
        ) {
            let results: Vec<RetrievalResult> = texts
                .iter()
                .enumerate()
                .map(|(i, t)| RetrievalResult {
                    id: i as u64,
                    text: t.clone(),
                    chunk_index: i,
                    score: 0.0,
                })
                .collect();

            let rt = tokio::runtime::Runtime::new().unwrap();
            let reranked = rt.block_on(TfIdfReranker.rerank(&query, results)).unwrap();

            let mut before = texts.clone();
            let mut after: Vec<String> = reranked.iter().map(|r| r.text.clone()).collect();
            before.sort();
            after.sort();
            prop_assert_eq!(before, after);
            for window in reranked.windows(2) {
                prop_assert!(window[0].score >= window[1].score);
            }
        }
    }
}
