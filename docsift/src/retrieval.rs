//! Bi-encoder candidate retrieval.

use std::cmp::Ordering;

use tracing::debug;

use crate::document::SectionInfo;
use crate::error::{DocsiftError, Result};

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Dot product of two equal-length vectors.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Whether `vector` can be compared against a query of `dimensions` components.
pub fn is_usable(vector: &[f32], dimensions: usize) -> bool {
    vector.len() == dimensions
        && vector.iter().all(|x| x.is_finite())
        && vector.iter().any(|x| *x != 0.0)
}

/// Rank `sections` by cosine similarity of their vectors to `query` and keep
/// the best `top_k`.
///
/// `vectors[i]` belongs to `sections[i]`. Entries whose vector is absent or
/// unusable (wrong dimension, zero, non-finite) are dropped before ranking.
/// The sort is stable, so equal scores keep input order. Each returned
/// section carries its similarity as `score`. If no usable vector remains the
/// result is empty.
///
/// # Errors
///
/// Returns [`DocsiftError::PipelineError`] if `vectors` and `sections` differ
/// in length.
pub fn retrieve_candidates(
    query: &[f32],
    vectors: &[Option<Vec<f32>>],
    sections: &[SectionInfo],
    top_k: usize,
) -> Result<Vec<SectionInfo>> {
    if vectors.len() != sections.len() {
        return Err(DocsiftError::PipelineError(format!(
            "{} vectors supplied for {} sections",
            vectors.len(),
            sections.len()
        )));
    }

    let mut scored: Vec<(f32, &SectionInfo)> = vectors
        .iter()
        .zip(sections)
        .filter_map(|(vector, section)| {
            let vector = vector.as_deref()?;
            if !is_usable(vector, query.len()) {
                debug!(chunk_id = %section.chunk_id, "skipping unusable embedding");
                return None;
            }
            Some((cosine_similarity(query, vector), section))
        })
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
    scored.truncate(top_k);

    Ok(scored.into_iter().map(|(score, section)| section.with_score(score)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(id: &str) -> SectionInfo {
        SectionInfo {
            document: "doc.pdf".into(),
            page_number: 1,
            chunk_id: id.into(),
            text: format!("text of {id}"),
            score: None,
            rank: None,
        }
    }

    #[test]
    fn ranks_by_similarity_descending() {
        let query = vec![1.0, 0.0];
        let sections = vec![section("a"), section("b"), section("c")];
        let vectors = vec![Some(vec![0.0, 1.0]), Some(vec![1.0, 0.0]), Some(vec![0.6, 0.8])];
        let ranked = retrieve_candidates(&query, &vectors, &sections, 10).unwrap();
        let ids: Vec<&str> = ranked.iter().map(|s| s.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
        assert!((ranked[0].score.unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn missing_vectors_are_excluded_not_zero_scored() {
        let query = vec![1.0, 0.0];
        let sections = vec![section("a"), section("b"), section("c")];
        let vectors = vec![None, Some(vec![-1.0, 0.0]), Some(vec![0.0, 0.0])];
        let ranked = retrieve_candidates(&query, &vectors, &sections, 10).unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].chunk_id, "b");
    }

    #[test]
    fn ties_keep_input_order_and_top_k_truncates() {
        let query = vec![1.0, 0.0];
        let sections = vec![section("a"), section("b"), section("c")];
        let same = Some(vec![0.5, 0.5]);
        let vectors = vec![same.clone(), same.clone(), same];
        let ranked = retrieve_candidates(&query, &vectors, &sections, 2).unwrap();
        let ids: Vec<&str> = ranked.iter().map(|s| s.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn no_usable_vectors_is_empty() {
        let ranked = retrieve_candidates(&[1.0], &[None], &[section("a")], 5).unwrap();
        assert!(ranked.is_empty());
    }

    #[test]
    fn length_mismatch_is_an_error() {
        let err = retrieve_candidates(&[1.0], &[], &[section("a")], 5).unwrap_err();
        assert!(matches!(err, DocsiftError::PipelineError(_)));
    }
}
