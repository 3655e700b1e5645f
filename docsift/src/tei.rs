//! Model-backed oracles served by a Text Embeddings Inference (TEI) server.
//!
//! This module is only available when the `tei` feature is enabled. One TEI
//! instance serves one model, so the bi-encoder and the cross-encoder are
//! usually two servers:
//!
//! ```rust,ignore
//! use docsift::tei::{TeiCrossEncoder, TeiEmbeddingProvider};
//!
//! let embedder = TeiEmbeddingProvider::connect("http://localhost:8080").await?;
//! let scorer = TeiCrossEncoder::connect("http://localhost:8081").await?;
//! ```

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::embedding::{EmbeddingProvider, l2_normalize};
use crate::error::{DocsiftError, Result};
use crate::reranker::CrossEncoder;

/// Maximum number of inputs sent in one request.
const MAX_BATCH: usize = 32;

#[derive(Deserialize)]
struct InfoResponse {
    model_id: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    inputs: &'a [&'a str],
    truncate: bool,
    normalize: bool,
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    texts: &'a [&'a str],
    truncate: bool,
    raw_scores: bool,
}

#[derive(Deserialize)]
struct RerankHit {
    index: usize,
    score: f32,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

/// State shared by both TEI oracles.
struct TeiEndpoint {
    client: reqwest::Client,
    base_url: String,
    model_id: String,
}

impl TeiEndpoint {
    /// Probe `/info` so an unreachable server fails at startup.
    async fn connect(base_url: &str, kind: &str) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let client = reqwest::Client::new();
        let info: InfoResponse = client
            .get(format!("{base_url}/info"))
            .send()
            .await
            .map_err(|e| unavailable(kind, &base_url, e))?
            .error_for_status()
            .map_err(|e| unavailable(kind, &base_url, e))?
            .json()
            .await
            .map_err(|e| unavailable(kind, &base_url, e))?;

        info!(backend = kind, url = %base_url, model = %info.model_id, "connected to TEI server");
        Ok(Self { client, base_url, model_id: info.model_id })
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        route: &str,
        body: &B,
    ) -> std::result::Result<T, String> {
        let response = self
            .client
            .post(format!("{}/{route}", self.base_url))
            .json(body)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail =
                serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error).unwrap_or(body);
            return Err(format!("API returned {status}: {detail}"));
        }

        response.json().await.map_err(|e| format!("failed to parse response: {e}"))
    }
}

fn unavailable(kind: &str, url: &str, e: reqwest::Error) -> DocsiftError {
    error!(backend = kind, url, error = %e, "TEI server unavailable");
    let message = format!("server at {url} unavailable: {e}");
    if kind == "TEI-rerank" {
        DocsiftError::RerankerError { reranker: kind.into(), message }
    } else {
        DocsiftError::EmbeddingError { provider: kind.into(), message }
    }
}

/// An [`EmbeddingProvider`] backed by a TEI `/embed` endpoint.
///
/// The server truncates over-long input. Vectors are re-normalized locally.
pub struct TeiEmbeddingProvider {
    endpoint: TeiEndpoint,
    dimensions: usize,
}

impl TeiEmbeddingProvider {
    /// Connect to the server and probe the embedding dimensionality.
    ///
    /// # Errors
    ///
    /// Returns [`DocsiftError::EmbeddingError`] if the server is unreachable
    /// or the probe fails.
    pub async fn connect(base_url: &str) -> Result<Self> {
        let endpoint = TeiEndpoint::connect(base_url, "TEI").await?;
        let mut provider = Self { endpoint, dimensions: 0 };
        let probe = provider.embed("dimension probe").await?;
        provider.dimensions = probe.len();
        Ok(provider)
    }

    /// The model served by this endpoint.
    pub fn model_id(&self) -> &str {
        &self.endpoint.model_id
    }
}

#[async_trait]
impl EmbeddingProvider for TeiEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text]).await?;
        results.into_iter().next().ok_or_else(|| DocsiftError::EmbeddingError {
            provider: "TEI".into(),
            message: "API returned empty response".into(),
        })
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_BATCH) {
            debug!(provider = "TEI", batch_size = batch.len(), "embedding batch");
            let request = EmbedRequest { inputs: batch, truncate: true, normalize: true };
            let mut response: Vec<Vec<f32>> =
                self.endpoint.post("embed", &request).await.map_err(|message| {
                    error!(provider = "TEI", error = %message, "embedding request failed");
                    DocsiftError::EmbeddingError { provider: "TEI".into(), message }
                })?;
            for vector in &mut response {
                l2_normalize(vector);
            }
            vectors.extend(response);
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "TEI"
    }
}

/// A [`CrossEncoder`] backed by a TEI `/rerank` endpoint, returning raw logits.
pub struct TeiCrossEncoder {
    endpoint: TeiEndpoint,
}

impl TeiCrossEncoder {
    /// Connect to a server hosting a sequence-classification (reranker) model.
    ///
    /// # Errors
    ///
    /// Returns [`DocsiftError::RerankerError`] if the server is unreachable.
    pub async fn connect(base_url: &str) -> Result<Self> {
        Ok(Self { endpoint: TeiEndpoint::connect(base_url, "TEI-rerank").await? })
    }

    /// The model served by this endpoint.
    pub fn model_id(&self) -> &str {
        &self.endpoint.model_id
    }
}

#[async_trait]
impl CrossEncoder for TeiCrossEncoder {
    async fn score(&self, query: &str, text: &str) -> Result<f32> {
        let scores = self.score_batch(query, &[text]).await?;
        scores.into_iter().next().ok_or_else(|| DocsiftError::RerankerError {
            reranker: "TEI-rerank".into(),
            message: "API returned empty response".into(),
        })
    }

    async fn score_batch(&self, query: &str, texts: &[&str]) -> Result<Vec<f32>> {
        let mut scores = vec![f32::NAN; texts.len()];
        for (batch_index, batch) in texts.chunks(MAX_BATCH).enumerate() {
            let offset = batch_index * MAX_BATCH;
            let request = RerankRequest { query, texts: batch, truncate: true, raw_scores: true };
            let hits: Vec<RerankHit> =
                self.endpoint.post("rerank", &request).await.map_err(|message| {
                    error!(reranker = "TEI-rerank", error = %message, "rerank request failed");
                    DocsiftError::RerankerError { reranker: "TEI-rerank".into(), message }
                })?;
            for hit in hits.into_iter().filter(|hit| hit.index < batch.len()) {
                scores[offset + hit.index] = hit.score;
            }
        }

        if scores.iter().any(|s| s.is_nan()) {
            return Err(DocsiftError::RerankerError {
                reranker: "TEI-rerank".into(),
                message: "response did not score every text".into(),
            });
        }
        Ok(scores)
    }

    fn name(&self) -> &str {
        "TEI-rerank"
    }
}
