//! Cross-encoder reranking with a per-document diversity cap.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use crate::document::{Query, RankedSection, SectionInfo};
use crate::embedding::tokenize;
use crate::error::{DocsiftError, Result};

/// A joint relevance scorer for (query, text) pairs.
///
/// Higher scores mean more relevant; the scale is defined by the
/// implementation and is not normalized.
#[async_trait]
pub trait CrossEncoder: Send + Sync {
    /// Score one (query, text) pair.
    async fn score(&self, query: &str, text: &str) -> Result<f32>;

    /// Score `query` against every text, returning one score per text in order.
    ///
    /// The default implementation calls [`score`](CrossEncoder::score)
    /// sequentially.
    async fn score_batch(&self, query: &str, texts: &[&str]) -> Result<Vec<f32>> {
        let mut scores = Vec::with_capacity(texts.len());
        for text in texts {
            scores.push(self.score(query, text).await?);
        }
        Ok(scores)
    }

    /// A short scorer name used in logs and errors.
    fn name(&self) -> &str;
}

/// An offline joint scorer using BM25 term weighting over the query tokens,
/// plus a bonus for query bigrams that appear verbatim in the text.
///
/// Deterministic; suitable when no model server is available.
#[derive(Debug, Clone)]
pub struct LexicalCrossEncoder {
    k1: f32,
    b: f32,
    avg_len: f32,
    bigram_bonus: f32,
}

impl Default for LexicalCrossEncoder {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75, avg_len: 250.0, bigram_bonus: 0.5 }
    }
}

impl LexicalCrossEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn score_sync(&self, query: &str, text: &str) -> f32 {
        let query_tokens = tokenize(query);
        let text_tokens = tokenize(text);
        if query_tokens.is_empty() || text_tokens.is_empty() {
            return 0.0;
        }

        let mut tf: HashMap<&str, f32> = HashMap::new();
        for token in &text_tokens {
            *tf.entry(token.as_str()).or_default() += 1.0;
        }
        let len_norm = 1.0 - self.b + self.b * text_tokens.len() as f32 / self.avg_len;

        let mut seen = HashSet::new();
        let mut score = 0.0;
        for token in &query_tokens {
            if !seen.insert(token.as_str()) {
                continue;
            }
            if let Some(freq) = tf.get(token.as_str()) {
                score += freq * (self.k1 + 1.0) / (freq + self.k1 * len_norm);
            }
        }

        let text_bigrams: HashSet<(&str, &str)> =
            text_tokens.windows(2).map(|w| (w[0].as_str(), w[1].as_str())).collect();
        let bigram_hits = query_tokens
            .windows(2)
            .map(|w| (w[0].as_str(), w[1].as_str()))
            .collect::<HashSet<_>>()
            .intersection(&text_bigrams)
            .count();

        score + bigram_hits as f32 * self.bigram_bonus
    }
}

#[async_trait]
impl CrossEncoder for LexicalCrossEncoder {
    async fn score(&self, query: &str, text: &str) -> Result<f32> {
        Ok(self.score_sync(query, text))
    }

    fn name(&self) -> &str {
        "Lexical"
    }
}

/// A reranker that turns retrieval candidates into the final ranked sections.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Rerank `candidates` for `query`, returning the final ranking.
    async fn rerank(&self, query: &Query, candidates: Vec<SectionInfo>) -> Result<Vec<RankedSection>>;
}

/// Reranks candidates with a [`CrossEncoder`] and enforces a per-document cap.
///
/// All candidates are scored and stably sorted by descending score, so ties
/// keep retrieval order. The sorted list is then walked greedily: a candidate
/// is admitted only while its document has fewer than `max_per_doc` admitted
/// sections, until `top_k` are admitted. A lower-scoring section from a less
/// represented document can therefore outrank a higher-scoring section from a
/// document that already hit its cap. When `max_per_doc` times the number of
/// distinct documents is below `top_k`, fewer than `top_k` sections come back.
///
/// # Example
///
/// ```rust,ignore
/// use docsift::{CrossEncoderReranker, LexicalCrossEncoder, Reranker};
///
/// let reranker = CrossEncoderReranker::new(Arc::new(LexicalCrossEncoder::new()), 5, 2);
/// let ranked = reranker.rerank(&query, candidates).await?;
/// ```
pub struct CrossEncoderReranker {
    encoder: Arc<dyn CrossEncoder>,
    top_k: usize,
    max_per_doc: usize,
}

impl CrossEncoderReranker {
    pub fn new(encoder: Arc<dyn CrossEncoder>, top_k: usize, max_per_doc: usize) -> Self {
        Self { encoder, top_k, max_per_doc }
    }
}

#[async_trait]
impl Reranker for CrossEncoderReranker {
    async fn rerank(&self, query: &Query, candidates: Vec<SectionInfo>) -> Result<Vec<RankedSection>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<&str> = candidates.iter().map(|c| c.text.as_str()).collect();
        let scores = self.encoder.score_batch(query.text(), &texts).await.map_err(|e| {
            error!(reranker = self.encoder.name(), error = %e, "cross-encoder scoring failed");
            e
        })?;
        if scores.len() != candidates.len() {
            return Err(DocsiftError::RerankerError {
                reranker: self.encoder.name().to_string(),
                message: format!(
                    "returned {} scores for {} candidates",
                    scores.len(),
                    candidates.len()
                ),
            });
        }

        let mut scored: Vec<(f32, SectionInfo)> = scores.into_iter().zip(candidates).collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        Ok(apply_diversity_cap(scored, self.top_k, self.max_per_doc))
    }
}

/// Greedily admit pre-sorted `(score, section)` pairs under the per-document cap.
pub fn apply_diversity_cap(
    sorted: Vec<(f32, SectionInfo)>,
    top_k: usize,
    max_per_doc: usize,
) -> Vec<RankedSection> {
    let mut admitted = Vec::with_capacity(top_k);
    let mut per_doc: HashMap<String, usize> = HashMap::new();

    for (score, section) in sorted {
        if admitted.len() >= top_k {
            break;
        }
        let count = per_doc.entry(section.document.clone()).or_default();
        if *count >= max_per_doc {
            debug!(document = %section.document, score, "skipping section over per-document cap");
            continue;
        }
        *count += 1;
        debug!(document = %section.document, page = section.page_number, score, "admitted section");
        let rank = admitted.len() + 1;
        admitted.push(RankedSection::from_section(section, score, rank));
    }

    admitted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(document: &str, id: &str, text: &str) -> SectionInfo {
        SectionInfo {
            document: document.into(),
            page_number: 1,
            chunk_id: id.into(),
            text: text.into(),
            score: None,
            rank: None,
        }
    }

    /// Scores a text by the number parsed from its first token.
    struct FixedScores;

    #[async_trait]
    impl CrossEncoder for FixedScores {
        async fn score(&self, _query: &str, text: &str) -> Result<f32> {
            Ok(text.split_whitespace().next().and_then(|t| t.parse().ok()).unwrap_or(0.0))
        }

        fn name(&self) -> &str {
            "Fixed"
        }
    }

    struct ShortBatch;

    #[async_trait]
    impl CrossEncoder for ShortBatch {
        async fn score(&self, _query: &str, _text: &str) -> Result<f32> {
            Ok(0.0)
        }

        async fn score_batch(&self, _query: &str, _texts: &[&str]) -> Result<Vec<f32>> {
            Ok(vec![1.0])
        }

        fn name(&self) -> &str {
            "Short"
        }
    }

    #[tokio::test]
    async fn caps_sections_per_document() {
        let reranker = CrossEncoderReranker::new(Arc::new(FixedScores), 3, 2);
        let candidates = vec![
            candidate("a.pdf", "a1", "9"),
            candidate("a.pdf", "a2", "8"),
            candidate("a.pdf", "a3", "7"),
            candidate("b.pdf", "b1", "1"),
        ];
        let ranked = reranker.rerank(&Query::new("p", "t"), candidates).await.unwrap();
        let ids: Vec<&str> = ranked.iter().map(|s| s.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "a2", "b1"]);
        assert_eq!(ranked.iter().map(|s| s.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn returns_fewer_when_cap_is_infeasible() {
        let reranker = CrossEncoderReranker::new(Arc::new(FixedScores), 5, 1);
        let candidates = vec![
            candidate("a.pdf", "a1", "3"),
            candidate("a.pdf", "a2", "2"),
            candidate("b.pdf", "b1", "1"),
        ];
        let ranked = reranker.rerank(&Query::new("p", "t"), candidates).await.unwrap();
        assert_eq!(ranked.len(), 2);
    }

    #[tokio::test]
    async fn ties_keep_retrieval_order() {
        let reranker = CrossEncoderReranker::new(Arc::new(FixedScores), 2, 5);
        let candidates = vec![candidate("a.pdf", "first", "1"), candidate("b.pdf", "second", "1")];
        let ranked = reranker.rerank(&Query::new("p", "t"), candidates).await.unwrap();
        assert_eq!(ranked[0].chunk_id, "first");
    }

    #[tokio::test]
    async fn wrong_score_count_is_an_error() {
        let reranker = CrossEncoderReranker::new(Arc::new(ShortBatch), 2, 2);
        let candidates = vec![candidate("a.pdf", "a1", "x"), candidate("a.pdf", "a2", "y")];
        let err = reranker.rerank(&Query::new("p", "t"), candidates).await.unwrap_err();
        assert!(matches!(err, DocsiftError::RerankerError { .. }));
    }

    #[tokio::test]
    async fn lexical_scorer_prefers_overlapping_text() {
        let scorer = LexicalCrossEncoder::new();
        let query = "Travel planner: plan a trip with friends to the coast";
        let relevant = scorer
            .score(query, "The coast offers beaches where friends can plan a relaxing trip.")
            .await
            .unwrap();
        let unrelated = scorer
            .score(query, "Hydraulic pumps need regular maintenance of their seals.")
            .await
            .unwrap();
        assert!(relevant > unrelated);
        assert_eq!(scorer.score(query, "").await.unwrap(), 0.0);
    }
}
