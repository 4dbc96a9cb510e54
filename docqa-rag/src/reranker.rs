//! Rerankers that reorder retrieved candidates by a second relevance signal.

use std::collections::HashMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use crate::document::RetrievalResult;
use crate::error::Result;

/// A reranker that re-scores and reorders retrieved candidates.
///
/// Implementations return the same candidates, none added, removed or
/// duplicated, in a new order. The returned `score` is the reranker's own
/// score, not the vector store's.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Rerank candidates given the original query.
    async fn rerank(
        &self,
        query: &str,
        results: Vec<RetrievalResult>,
    ) -> Result<Vec<RetrievalResult>>;
}

/// A no-op reranker that returns results unchanged.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::NoOpReranker;
///
/// let reranker = NoOpReranker;
/// let reranked = reranker.rerank("query", results).await?;
/// // reranked == results (same order, same scores)
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpReranker;

#[async_trait]
impl Reranker for NoOpReranker {
    async fn rerank(
        &self,
        _query: &str,
        results: Vec<RetrievalResult>,
    ) -> Result<Vec<RetrievalResult>> {
        Ok(results)
    }
}

/// Words of two or more word characters.
static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w\w+\b").expect("token pattern is valid"));

fn term_counts(text: &str) -> HashMap<String, f32> {
    let lowered = text.to_lowercase();
    let mut counts = HashMap::new();
    for token in TOKEN.find_iter(&lowered) {
        *counts.entry(token.as_str().to_string()).or_insert(0.0) += 1.0;
    }
    counts
}

/// Lexical reranking by TF-IDF similarity to the query.
///
/// The vocabulary is built from the query and the candidates only. Term
/// weights are raw counts times the smoothed inverse document frequency
/// `ln((1 + n) / (1 + df)) + 1`; each weighted row is L2-normalised, so the
/// dot product of the query row with a candidate row is their cosine
/// similarity. Candidates are sorted by that score, descending; equal scores
/// keep their incoming order.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::TfIdfReranker;
///
/// let reranked = TfIdfReranker.rerank("blue sky", results).await?;
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TfIdfReranker;

impl TfIdfReranker {
    /// TF-IDF cosine score of each text against the query, in input order.
    pub fn scores(query: &str, texts: &[&str]) -> Vec<f32> {
        let rows: Vec<HashMap<String, f32>> =
            std::iter::once(query).chain(texts.iter().copied()).map(term_counts).collect();
        let n = rows.len() as f32;

        let mut document_frequency: HashMap<&str, f32> = HashMap::new();
        for row in &rows {
            for term in row.keys() {
                *document_frequency.entry(term.as_str()).or_insert(0.0) += 1.0;
            }
        }

        let weighted: Vec<HashMap<&str, f32>> = rows
            .iter()
            .map(|row| {
                let mut weights: HashMap<&str, f32> = row
                    .iter()
                    .map(|(term, tf)| {
                        let df = document_frequency[term.as_str()];
                        let idf = ((1.0 + n) / (1.0 + df)).ln() + 1.0;
                        (term.as_str(), tf * idf)
                    })
                    .collect();
                let norm = weights.values().map(|w| w * w).sum::<f32>().sqrt();
                if norm > 0.0 {
                    weights.values_mut().for_each(|w| *w /= norm);
                }
                weights
            })
            .collect();

        let (query_row, candidate_rows) = weighted.split_at(1);
        candidate_rows
            .iter()
            .map(|row| {
                query_row[0]
                    .iter()
                    .map(|(term, weight)| weight * row.get(term).copied().unwrap_or(0.0))
                    .sum::<f32>()
            })
            .collect()
    }
}

#[async_trait]
impl Reranker for TfIdfReranker {
    async fn rerank(
        &self,
        query: &str,
        results: Vec<RetrievalResult>,
    ) -> Result<Vec<RetrievalResult>> {
        if results.is_empty() {
            return Ok(results);
        }

        let texts: Vec<&str> = results.iter().map(|r| r.text.as_str()).collect();
        let scores = Self::scores(query, &texts);

        let mut reranked: Vec<RetrievalResult> = results
            .into_iter()
            .zip(scores)
            .map(|(result, score)| RetrievalResult { score, ..result })
            .collect();
        // `sort_by` is stable, so ties keep the vector store's order.
        reranked.sort_by(|a, b| b.score.total_cmp(&a.score));

        debug!(candidates = reranked.len(), "tf-idf rerank complete");
        Ok(reranked)
    }
}
