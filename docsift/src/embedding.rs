//! Embedding provider trait and the built-in offline bi-encoder.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;

/// A provider that generates L2-normalized vector embeddings from text.
///
/// Implementations must be deterministic for identical input and truncate
/// input beyond their token budget instead of failing. Providers are built
/// once and shared across extraction tasks, so they must be safe for
/// concurrent use.
///
/// The default [`embed_batch`](EmbeddingProvider::embed_batch)
/// implementation calls [`embed`](EmbeddingProvider::embed) sequentially;
/// backends that support native batching should override it.
///
/// # Example
///
/// ```rust,ignore
/// use docsift::{EmbeddingProvider, HashingEmbeddingProvider};
///
/// let provider = HashingEmbeddingProvider::default();
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// A short provider name used in logs and errors.
    fn name(&self) -> &str;
}

/// Scale `vector` to unit length in place. Zero vectors are left unchanged.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

/// Lower-cased alphanumeric word tokens of `text`.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// An offline bi-encoder based on signed feature hashing.
///
/// Word unigrams and bigrams are hashed (FNV-1a) into `dimensions` buckets
/// with a sign bit, weighted by `1 + ln(count)`, and L2-normalized. Input is
/// truncated to `max_tokens` tokens. Text without any tokens embeds to the
/// zero vector, which retrieval treats as unusable.
#[derive(Debug, Clone)]
pub struct HashingEmbeddingProvider {
    dimensions: usize,
    max_tokens: usize,
}

impl Default for HashingEmbeddingProvider {
    fn default() -> Self {
        Self { dimensions: 384, max_tokens: 512 }
    }
}

impl HashingEmbeddingProvider {
    /// Create a provider with the given output dimensionality.
    ///
    /// A dimensionality of zero is raised to one.
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions: dimensions.max(1), ..Self::default() }
    }

    /// Set the token budget; tokens past it are ignored.
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut tokens = tokenize(text);
        tokens.truncate(self.max_tokens);

        let mut counts: HashMap<u64, u32> = HashMap::new();
        for token in &tokens {
            *counts.entry(fnv1a(token.as_bytes())).or_default() += 1;
        }
        for pair in tokens.windows(2) {
            let bigram = format!("{} {}", pair[0], pair[1]);
            *counts.entry(fnv1a(bigram.as_bytes())).or_default() += 1;
        }

        let mut vector = vec![0.0f32; self.dimensions];
        for (hash, count) in counts {
            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign * (1.0 + (count as f32).ln());
        }
        l2_normalize(&mut vector);
        vector
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;
    bytes.iter().fold(OFFSET, |hash, byte| (hash ^ u64::from(*byte)).wrapping_mul(PRIME))
}

#[async_trait]
impl EmbeddingProvider for HashingEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_sync(text)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "Hashing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    #[tokio::test]
    async fn embeddings_are_normalized_and_deterministic() {
        let provider = HashingEmbeddingProvider::new(64);
        let a = provider.embed("Plan a trip to the coast of France").await.unwrap();
        let b = provider.embed("Plan a trip to the coast of France").await.unwrap();
        assert_eq!(a.len(), 64);
        assert_eq!(a, b);
        assert!((norm(&a) - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn empty_text_is_zero_vector() {
        let provider = HashingEmbeddingProvider::new(16);
        let v = provider.embed("  ... ").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn input_beyond_budget_is_truncated() {
        let provider = HashingEmbeddingProvider::new(32).with_max_tokens(3);
        let short = provider.embed("alpha beta gamma").await.unwrap();
        let long = provider.embed("alpha beta gamma delta epsilon").await.unwrap();
        assert_eq!(short, long);
    }

    #[tokio::test]
    async fn batch_matches_single() {
        let provider = HashingEmbeddingProvider::default();
        let batch = provider.embed_batch(&["one two", "three four"]).await.unwrap();
        assert_eq!(batch[1], provider.embed("three four").await.unwrap());
    }
}
