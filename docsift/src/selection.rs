//! Query-aligned sentence selection for section titles and excerpts.

use std::cmp::Ordering;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::retrieval::{dot, is_usable};

/// Sentences with this many words or fewer are ignored.
const MIN_SENTENCE_WORDS: usize = 3;

/// Length of the fallback excerpt in characters.
const FALLBACK_CHARS: usize = 100;

static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]\s+").expect("static regex is valid"));

/// Split `text` after sentence-ending punctuation that is followed by whitespace.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for boundary in SENTENCE_END.find_iter(text) {
        // Punctuation is one ASCII byte; keep it with the sentence.
        let end = boundary.start() + 1;
        sentences.push(text[start..end].trim());
        start = boundary.end();
    }
    if start < text.len() {
        sentences.push(text[start..].trim());
    }
    sentences.retain(|s| !s.is_empty());
    sentences
}

/// The first 100 characters of `text`, cut back to the last word boundary
/// when the cut would otherwise split a word.
pub fn fallback_excerpt(text: &str) -> String {
    let text = text.trim();
    let Some((cut, _)) = text.char_indices().nth(FALLBACK_CHARS) else {
        return text.to_string();
    };
    let head = &text[..cut];
    let splits_word = !head.ends_with(char::is_whitespace)
        && !text[cut..].starts_with(char::is_whitespace);
    if splits_word {
        if let Some(space) = head.rfind(char::is_whitespace) {
            return head[..space].trim_end().to_string();
        }
    }
    head.trim_end().to_string()
}

/// Picks the sentences of a section that best match the query embedding.
pub struct SentenceSelector {
    embedder: Arc<dyn EmbeddingProvider>,
}

impl SentenceSelector {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { embedder }
    }

    /// Return up to `top_n` sentences of `text` in descending similarity to
    /// `query_embedding` (ties keep document order).
    ///
    /// Sentences of three words or fewer are discarded. If none remain, or
    /// none embeds to a usable vector, the single [`fallback_excerpt`] is
    /// returned instead.
    ///
    /// # Errors
    ///
    /// Propagates embedding provider errors.
    pub async fn select(
        &self,
        text: &str,
        query_embedding: &[f32],
        top_n: usize,
    ) -> Result<Vec<String>> {
        let sentences: Vec<&str> = split_sentences(text)
            .into_iter()
            .filter(|s| s.split_whitespace().count() > MIN_SENTENCE_WORDS)
            .collect();
        if sentences.is_empty() {
            return Ok(vec![fallback_excerpt(text)]);
        }

        let embeddings = self.embedder.embed_batch(&sentences).await?;
        let mut scored: Vec<(f32, &str)> = sentences
            .iter()
            .zip(&embeddings)
            .filter(|(_, embedding)| is_usable(embedding, query_embedding.len()))
            .map(|(sentence, embedding)| (dot(embedding, query_embedding), *sentence))
            .collect();
        if scored.is_empty() {
            return Ok(vec![fallback_excerpt(text)]);
        }

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
        Ok(scored.into_iter().take(top_n).map(|(_, s)| s.to_string()).collect())
    }
}
